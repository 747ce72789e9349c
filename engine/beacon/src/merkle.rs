// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use rs_merkle::{Hasher, MerkleProof, MerkleTree};

use poies_shared::error::BeaconError;
use poies_shared::hash::{domain_hash, Hash32, TAG_RAND_MERKLE_NODE};

/// Interior-node hasher for the commit tree. Leaves enter the tree as
/// ready-made commit hashes (already tagged `rand/commit`), so only the
/// concatenation step carries the node tag.
#[derive(Clone)]
pub struct TaggedSha3;

impl Hasher for TaggedSha3 {
    type Hash = [u8; 32];

    fn hash(data: &[u8]) -> [u8; 32] {
        domain_hash(TAG_RAND_MERKLE_NODE, &[data]).0
    }
}

/// Root of a commit tree over the given leaves, in their given order.
pub fn commit_root(leaves: &[Hash32]) -> Result<Hash32, BeaconError> {
    let raw: Vec<[u8; 32]> = leaves.iter().map(|leaf| leaf.0).collect();
    let tree = MerkleTree::<TaggedSha3>::from_leaves(&raw);
    tree.root()
        .map(Hash32)
        .ok_or_else(|| BeaconError::Encoding("empty commit tree".into()))
}

/// Serialized membership proof for one leaf. Prover-side helper for
/// participants and fixtures.
pub fn commit_proof(leaves: &[Hash32], index: usize) -> Result<Vec<u8>, BeaconError> {
    if index >= leaves.len() {
        return Err(BeaconError::Encoding(format!(
            "leaf index {index} out of range ({} leaves)",
            leaves.len()
        )));
    }
    let raw: Vec<[u8; 32]> = leaves.iter().map(|leaf| leaf.0).collect();
    let tree = MerkleTree::<TaggedSha3>::from_leaves(&raw);
    Ok(tree.proof(&[index]).to_bytes())
}

/// Checks a single-leaf membership proof against a commit root.
pub fn verify_commit_proof(
    root: &Hash32,
    proof_bytes: &[u8],
    index: u64,
    leaf: &Hash32,
    total_leaves: u64,
) -> Result<(), BeaconError> {
    if index >= total_leaves {
        return Err(BeaconError::MerkleProof);
    }
    let proof =
        MerkleProof::<TaggedSha3>::from_bytes(proof_bytes).map_err(|_| BeaconError::MerkleProof)?;
    let ok = proof.verify(
        root.0,
        &[index as usize],
        &[leaf.0],
        total_leaves as usize,
    );
    if ok {
        Ok(())
    } else {
        Err(BeaconError::MerkleProof)
    }
}
