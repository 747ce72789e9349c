// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use fvm_ipld_encoding::tuple::*;
use fvm_ipld_encoding::RawBytes;

use poies_shared::hash::{domain_hash, Hash32, TAG_NULLIFIER_REVEAL, TAG_RAND_COMMIT};

/// A participant's opened commitment. Only `payload_hash` is consensus;
/// payload availability is handled off-chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize_tuple, Deserialize_tuple)]
pub struct Reveal {
    /// Participant address bytes, bounded by policy.
    pub addr: RawBytes,
    pub salt: Hash32,
    pub payload_hash: Hash32,
}

impl Reveal {
    /// `H("rand/commit" || addr || salt || payload_hash)`: both the
    /// commitment published during the commit window and the leaf of the
    /// commit tree.
    pub fn commitment(&self) -> Hash32 {
        domain_hash(
            TAG_RAND_COMMIT,
            &[
                self.addr.bytes(),
                self.salt.as_bytes(),
                self.payload_hash.as_bytes(),
            ],
        )
    }

    /// Replay guard for this reveal across rounds within the ttl
    /// window.
    pub fn nullifier(&self) -> Hash32 {
        reveal_nullifier(self)
    }
}

pub fn reveal_nullifier(reveal: &Reveal) -> Hash32 {
    domain_hash(
        TAG_NULLIFIER_REVEAL,
        &[
            reveal.addr.bytes(),
            reveal.salt.as_bytes(),
            reveal.payload_hash.as_bytes(),
        ],
    )
}

/// A reveal plus its membership proof against the round's commit root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize_tuple, Deserialize_tuple)]
pub struct RevealWithProof {
    pub reveal: Reveal,
    pub leaf_index: u64,
    /// Serialized merkle proof (see [`crate::merkle`]).
    pub proof: RawBytes,
}
