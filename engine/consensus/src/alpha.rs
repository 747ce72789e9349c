// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::collections::VecDeque;

use fvm_ipld_encoding::tuple::*;

use poies_policy::{AlphaConfig, Policy};
use poies_shared::kind::{KindTable, ALL_KINDS};
use poies_shared::math::{ratio_ppm, MuNat, PPM_SCALE};

/// Per-type fairness multipliers plus the trailing share window they are
/// tuned against. Like Θ, derivable from the canonical chain and cached
/// per epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize_tuple, Deserialize_tuple)]
pub struct AlphaState {
    pub alpha_ppm: KindTable<u64>,
    /// Ring buffer of per-block per-type effective μ-nats, newest last,
    /// bounded by the policy window.
    window: VecDeque<KindTable<MuNat>>,
}

impl AlphaState {
    pub fn genesis(policy: &Policy) -> AlphaState {
        AlphaState {
            alpha_ppm: KindTable([policy.alpha.initial_ppm; 5]),
            window: VecDeque::new(),
        }
    }

    /// Records one accepted block's per-type effective scores.
    pub fn observe_block(&mut self, config: &AlphaConfig, per_type_effective: KindTable<MuNat>) {
        self.window.push_back(per_type_effective);
        while self.window.len() as u64 > config.window_blocks {
            self.window.pop_front();
        }
    }

    /// Trailing per-type shares over the window, in ppm. An empty (or
    /// all-zero) window reports zero shares.
    pub fn shares_ppm(&self) -> KindTable<u64> {
        let mut sums: KindTable<u128> = KindTable([0; 5]);
        let mut total: u128 = 0;
        for block in &self.window {
            for kind in ALL_KINDS {
                sums[kind] += block[kind] as u128;
                total += block[kind] as u128;
            }
        }
        let mut shares = KindTable([0u64; 5]);
        for kind in ALL_KINDS {
            shares[kind] = ratio_ppm(sums[kind], total);
        }
        shares
    }

    pub fn window_len(&self) -> usize {
        self.window.len()
    }
}

/// One α-tuner step:
/// `α_t' = clamp(α_t + η_α·(τ_t − share_t), α_min, α_max)`.
pub fn retarget_alpha(config: &AlphaConfig, state: &AlphaState) -> AlphaState {
    if !config.enabled {
        return state.clone();
    }
    let shares = state.shares_ppm();
    let mut next = state.clone();
    for kind in ALL_KINDS {
        let gap = config.targets_ppm[kind] as i128 - shares[kind] as i128;
        let step = gap * config.step_ppm as i128 / PPM_SCALE as i128;
        let alpha = (state.alpha_ppm[kind] as i128 + step)
            .clamp(config.min_ppm as i128, config.max_ppm as i128) as u64;
        next.alpha_ppm[kind] = alpha;
    }
    next
}
