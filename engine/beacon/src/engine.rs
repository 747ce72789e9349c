// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::collections::BTreeMap;

use fvm_ipld_encoding::tuple::*;
use fvm_ipld_encoding::RawBytes;

use poies_policy::{BeaconConfig, Policy};
use poies_shared::error::BeaconError;
use poies_shared::hash::{domain_hash, Hash32, TAG_BEACON_RECORD, TAG_RAND_BEACON_OUT};

use crate::aggregate::{aggregate_hash, reveal_root, vdf_input};
use crate::merkle::verify_commit_proof;
use crate::reveal::{Reveal, RevealWithProof};
use crate::vdf::VdfVerifier;

/// Height windows of one beacon round. Rounds tile the chain back to
/// back from the genesis height: commit window, then reveal window,
/// then the finalize height (the first height of the next round).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundSchedule {
    pub round_id: u64,
    pub commit_start: u64,
    pub reveal_start: u64,
    pub finalize_height: u64,
}

impl RoundSchedule {
    pub fn for_round(config: &BeaconConfig, round_id: u64) -> RoundSchedule {
        let start = config.genesis_height + round_id * config.round_period();
        RoundSchedule {
            round_id,
            commit_start: start,
            reveal_start: start + config.commit_window,
            finalize_height: start + config.round_period(),
        }
    }

    /// The round a block at `height` finalizes, if any.
    pub fn round_finalizing_at(config: &BeaconConfig, height: u64) -> Option<u64> {
        let period = config.round_period();
        let offset = height.checked_sub(config.genesis_height)?;
        if offset == 0 || offset % period != 0 {
            return None;
        }
        Some(offset / period - 1)
    }

    pub fn in_commit_window(&self, height: u64) -> bool {
        height >= self.commit_start && height < self.reveal_start
    }

    pub fn in_reveal_window(&self, height: u64) -> bool {
        height >= self.reveal_start && height < self.finalize_height
    }
}

/// The finalization transcript a block attaches when it closes a round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize_tuple, Deserialize_tuple)]
pub struct BeaconRecord {
    pub round_id: u64,
    /// Root over every commitment accepted during the commit window.
    pub commit_root: Hash32,
    pub commit_leaf_count: u64,
    /// Root over the revealed subset, leaves sorted by bytes.
    pub reveal_root: Hash32,
    pub reveals: Vec<RevealWithProof>,
    pub aggregate_hash: Hash32,
    /// `X = H("rand/vdf-input" || aggregate_hash || prev_beacon)`.
    pub vdf_input: Hash32,
    pub t: u64,
    pub vdf_y: RawBytes,
    pub vdf_pi: RawBytes,
    pub prev_beacon_hash: Hash32,
}

impl BeaconRecord {
    /// Hash referenced from the block header.
    pub fn record_hash(&self) -> Result<Hash32, BeaconError> {
        let bytes = fvm_ipld_encoding::to_vec(self)
            .map_err(|e| BeaconError::Encoding(e.to_string()))?;
        Ok(domain_hash(TAG_BEACON_RECORD, &[&bytes]))
    }
}

/// A finalized round's output, consumed lagged by downstream draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_tuple, Deserialize_tuple)]
pub struct BeaconOut {
    pub round_id: u64,
    pub output: Hash32,
}

fn beacon_output(round_id: u64, y_bytes: &[u8]) -> Hash32 {
    domain_hash(TAG_RAND_BEACON_OUT, &[&round_id.to_be_bytes(), y_bytes])
}

/// Verifies a finalization transcript at `height` against the previous
/// finalized output. Returns the new beacon output on success.
pub fn verify_finalization(
    policy: &Policy,
    record: &BeaconRecord,
    prev_beacon: &Hash32,
    height: u64,
) -> Result<BeaconOut, BeaconError> {
    let schedule = RoundSchedule::for_round(&policy.beacon, record.round_id);
    if height != schedule.finalize_height {
        return Err(BeaconError::OutsideWindow {
            round: record.round_id,
            height,
        });
    }

    if record.reveals.is_empty() {
        return Err(BeaconError::Encoding("round finalized without reveals".into()));
    }
    if record.reveals.len() > policy.beacon.max_reveals as usize {
        return Err(BeaconError::Encoding(format!(
            "{} reveals exceed the policy bound {}",
            record.reveals.len(),
            policy.beacon.max_reveals
        )));
    }

    let mut reveals: Vec<Reveal> = Vec::with_capacity(record.reveals.len());
    for entry in &record.reveals {
        if entry.reveal.addr.len() > policy.beacon.max_addr_bytes as usize {
            return Err(BeaconError::Encoding("reveal address too long".into()));
        }
        let commit = entry.reveal.commitment();
        verify_commit_proof(
            &record.commit_root,
            entry.proof.bytes(),
            entry.leaf_index,
            &commit,
            record.commit_leaf_count,
        )?;
        reveals.push(entry.reveal.clone());
    }

    if reveal_root(&reveals)? != record.reveal_root {
        return Err(BeaconError::AggregateMismatch("reveal"));
    }
    let aggregate = aggregate_hash(&reveals)?;
    if aggregate != record.aggregate_hash {
        return Err(BeaconError::AggregateMismatch("aggregate"));
    }

    if record.prev_beacon_hash != *prev_beacon {
        return Err(BeaconError::ChainMismatch);
    }
    if vdf_input(&aggregate, prev_beacon) != record.vdf_input {
        return Err(BeaconError::InputMismatch);
    }

    let vdf = VdfVerifier::from_config(&policy.vdf)?;
    vdf.verify(
        &record.vdf_input,
        record.t,
        record.vdf_y.bytes(),
        record.vdf_pi.bytes(),
    )?;

    Ok(BeaconOut {
        round_id: record.round_id,
        output: beacon_output(record.round_id, record.vdf_y.bytes()),
    })
}

/// Finalized outputs along the canonical branch. The single chain-head
/// advancer appends; fork validators hold clones and prune on reorg,
/// discarding orphaned rounds with their branch.
#[derive(Debug, Clone)]
pub struct BeaconHistory {
    genesis_seed: Hash32,
    finalized: BTreeMap<u64, BeaconOut>,
}

impl BeaconHistory {
    pub fn new(genesis_seed: Hash32) -> Self {
        BeaconHistory {
            genesis_seed,
            finalized: BTreeMap::new(),
        }
    }

    /// The chain value a record for `round` must carry in
    /// `prev_beacon_hash`. Round zero chains from the genesis seed.
    pub fn prev_hash_for(&self, round: u64) -> Result<Hash32, BeaconError> {
        if round == 0 {
            return Ok(self.genesis_seed);
        }
        self.finalized
            .get(&(round - 1))
            .map(|out| out.output)
            .ok_or(BeaconError::ChainMismatch)
    }

    pub fn append(&mut self, out: BeaconOut) -> Result<(), BeaconError> {
        let expected = self.finalized.keys().next_back().map_or(0, |r| r + 1);
        if out.round_id != expected {
            return Err(BeaconError::ChainMismatch);
        }
        log::debug!("beacon round {} finalized: {}", out.round_id, out.output);
        self.finalized.insert(out.round_id, out);
        Ok(())
    }

    pub fn latest(&self) -> Option<&BeaconOut> {
        self.finalized.values().next_back()
    }

    /// Lagged consumer view: the output of round `current - lag`, the
    /// only round downstream draws may seed from.
    pub fn lagged(&self, current_round: u64, lag: u64) -> Option<&BeaconOut> {
        debug_assert!(lag >= 1);
        self.finalized.get(&current_round.checked_sub(lag)?)
    }

    /// Drops rounds above `round`, for reorgs onto a branch that never
    /// finalized them.
    pub fn prune_above(&mut self, round: u64) {
        self.finalized.retain(|r, _| *r <= round);
    }
}
