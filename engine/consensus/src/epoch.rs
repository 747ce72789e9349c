// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::collections::BTreeMap;

use poies_policy::Policy;
use poies_shared::error::RetargetError;
use poies_shared::kind::KindTable;
use poies_shared::math::MuNat;

use crate::alpha::{retarget_alpha, AlphaState};
use crate::retarget::{retarget_theta, ThetaState};

/// Per-block observations the retarget step reads from the completed
/// epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockStats {
    pub interval_ms: i64,
    pub per_type_effective: KindTable<MuNat>,
}

/// The epoch a height belongs to.
pub fn epoch_of_height(policy: &Policy, height: u64) -> u64 {
    height / policy.epoch_blocks
}

/// The epoch-boundary step: absorbs the completed epoch's statistics
/// into the α window, advances Θ from the interval EMA, and runs one
/// α-tuner adjustment.
pub fn retarget_epoch(
    policy: &Policy,
    theta: &ThetaState,
    alpha: &AlphaState,
    stats: &[BlockStats],
) -> Result<(ThetaState, AlphaState), RetargetError> {
    let mut observed = alpha.clone();
    for stat in stats {
        observed.observe_block(&policy.alpha, stat.per_type_effective);
    }
    let intervals: Vec<i64> = stats.iter().map(|s| s.interval_ms).collect();
    let theta_next = retarget_theta(&policy.theta, theta, &intervals)?;
    let alpha_next = retarget_alpha(&policy.alpha, &observed);
    Ok((theta_next, alpha_next))
}

/// Θ/α states by epoch index. Derived state only: rebuilding it from
/// the canonical chain yields identical contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpochState {
    pub theta: ThetaState,
    pub alpha: AlphaState,
}

#[derive(Debug, Clone, Default)]
pub struct EpochStore {
    by_epoch: BTreeMap<u64, EpochState>,
}

impl EpochStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn genesis(policy: &Policy) -> Self {
        let mut store = Self::new();
        store.insert(
            0,
            EpochState {
                theta: ThetaState::genesis(policy),
                alpha: AlphaState::genesis(policy),
            },
        );
        store
    }

    pub fn insert(&mut self, epoch_index: u64, state: EpochState) {
        self.by_epoch.insert(epoch_index, state);
    }

    pub fn get(&self, epoch_index: u64) -> Option<&EpochState> {
        self.by_epoch.get(&epoch_index)
    }

    pub fn latest(&self) -> Option<(u64, &EpochState)> {
        self.by_epoch.iter().next_back().map(|(k, v)| (*k, v))
    }

    /// Drops cached epochs above `epoch_index` after a reorg.
    pub fn prune_above(&mut self, epoch_index: u64) {
        self.by_epoch.retain(|epoch, _| *epoch <= epoch_index);
    }
}
