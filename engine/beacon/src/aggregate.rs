// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use poies_shared::error::BeaconError;
use poies_shared::hash::{domain_hash, Hash32, TAG_RAND_AGGREGATE, TAG_RAND_VDF_INPUT};

use crate::merkle::commit_root;
use crate::reveal::Reveal;

/// Root over the revealed subset: leaves (the commit hashes) sorted
/// ascending by bytes, so the root is independent of arrival order.
pub fn reveal_root(reveals: &[Reveal]) -> Result<Hash32, BeaconError> {
    let mut leaves: Vec<Hash32> = reveals.iter().map(Reveal::commitment).collect();
    leaves.sort_unstable();
    commit_root(&leaves)
}

/// `H("rand/aggregate" || fold_xor(commits))`. The XOR fold is over the
/// tagged commit hashes, which bind `(addr, salt, payload_hash)`; XOR
/// makes the aggregate independent of reveal order.
pub fn aggregate_hash(reveals: &[Reveal]) -> Result<Hash32, BeaconError> {
    if reveals.is_empty() {
        return Err(BeaconError::Encoding("no reveals to aggregate".into()));
    }
    let mut folded = [0u8; 32];
    for reveal in reveals {
        let commit = reveal.commitment();
        for (acc, byte) in folded.iter_mut().zip(commit.0.iter()) {
            *acc ^= byte;
        }
    }
    Ok(domain_hash(TAG_RAND_AGGREGATE, &[&folded]))
}

/// `X = H("rand/vdf-input" || aggregate_hash || prev_beacon)`.
pub fn vdf_input(aggregate: &Hash32, prev_beacon: &Hash32) -> Hash32 {
    domain_hash(
        TAG_RAND_VDF_INPUT,
        &[aggregate.as_bytes(), prev_beacon.as_bytes()],
    )
}
