// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use fvm_ipld_encoding::tuple::*;

use poies_policy::{Policy, ThetaConfig};
use poies_shared::error::RetargetError;
use poies_shared::math::{exp_neg_ppm, ln_ratio_munats, MuNat, PPM_SCALE};

/// Threshold state at an epoch boundary. Derived deterministically from
/// the canonical chain, so it is cached per epoch rather than carried in
/// headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_tuple, Deserialize_tuple)]
pub struct ThetaState {
    pub theta: MuNat,
    /// EMA of observed inter-block intervals.
    pub ema_interval_ms: u64,
    pub epoch_index: u64,
}

impl ThetaState {
    pub fn genesis(policy: &Policy) -> ThetaState {
        ThetaState {
            theta: policy.theta.initial,
            ema_interval_ms: policy.theta.target_interval_ms,
            epoch_index: 0,
        }
    }
}

/// Advances Θ across one epoch boundary:
/// `Θ' = clamp(Θ + η·ln(ema/Δ*), Θ_min, Θ_max)`, with the per-epoch
/// change additionally bounded by `step_max`. The interval EMA absorbs
/// the epoch's observations first.
pub fn retarget_theta(
    config: &ThetaConfig,
    state: &ThetaState,
    observed_intervals_ms: &[i64],
) -> Result<ThetaState, RetargetError> {
    let mut ema = state.ema_interval_ms;
    for &interval in observed_intervals_ms {
        if interval <= 0 {
            return Err(RetargetError::NonPositiveInterval(interval));
        }
        let delta = interval as i128 - ema as i128;
        let adjust = delta * config.ema_lambda_ppm as i128 / PPM_SCALE as i128;
        ema = (ema as i128 + adjust).max(1) as u64;
    }

    let ratio = ln_ratio_munats(ema, config.target_interval_ms)?;
    let step = (ratio as i128 * config.gain_ppm as i128 / PPM_SCALE as i128)
        .clamp(-(config.step_max as i128), config.step_max as i128);
    let theta = (state.theta as i128 + step)
        .clamp(config.min as i128, config.max as i128) as u64;

    log::debug!(
        "theta retarget epoch {} -> {}: theta {} -> {theta}, ema {} ms, empty-portfolio acceptance ~{} ppm",
        state.epoch_index,
        state.epoch_index + 1,
        state.theta,
        ema,
        exp_neg_ppm(theta)
    );

    Ok(ThetaState {
        theta,
        ema_interval_ms: ema,
        epoch_index: state.epoch_index + 1,
    })
}
