// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use poies_policy::Policy;
use poies_shared::error::ScoringError;
use poies_shared::kind::KindTable;
use poies_shared::math::{mul_ppm, neg_ln_frac_q64, MuNat, PPM_SCALE};

use crate::metrics::ProofMetrics;

/// Maps verified metrics to the raw μ-nat score
/// `ψ_raw = α[k] · w[k] · g(modifiers) · f_k(x)`.
///
/// The α multiplier and the static weight apply here, before any cap,
/// which pins their ordering relative to both escort modes. Callers pass
/// the α state in force for the block's epoch; a policy with the tuner
/// disabled ignores it.
pub fn psi_raw(
    policy: &Policy,
    alpha_ppm: &KindTable<u64>,
    metrics: &ProofMetrics,
) -> Result<MuNat, ScoringError> {
    let kind = metrics.kind();

    let x = match *metrics {
        // Hash shares score on the μ-nat value of their own draw.
        ProofMetrics::Hash { u_draw } => neg_ln_frac_q64(u_draw),
        ProofMetrics::Ai { units, .. } => units,
        ProofMetrics::Quantum { units, .. } => units,
        ProofMetrics::Storage { redundancy, .. } => redundancy,
        ProofMetrics::Vdf { seconds } => seconds,
    };

    let base = policy.curves[kind].evaluate(x)?;
    let modified = mul_ppm(base, modifier_ppm(policy, metrics));
    let weighted = mul_ppm(modified, policy.weights_ppm[kind]);
    if policy.alpha.enabled {
        Ok(mul_ppm(weighted, alpha_ppm[kind]))
    } else {
        Ok(weighted)
    }
}

/// The combined modifier `g ∈ [0, 1]` in ppm. Trap failures penalize
/// linearly with the policy slope; QoS scales directly. Ratios arrive
/// range-checked from the verifier set.
fn modifier_ppm(policy: &Policy, metrics: &ProofMetrics) -> u64 {
    let traps_modifier = |traps_ppm: u64| {
        let penalty = mul_ppm(traps_ppm, policy.traps_penalty_ppm[metrics.kind()]);
        PPM_SCALE.saturating_sub(penalty)
    };
    match *metrics {
        ProofMetrics::Hash { .. } | ProofMetrics::Vdf { .. } => PPM_SCALE,
        ProofMetrics::Ai {
            traps_ppm, qos_ppm, ..
        } => mul_ppm(traps_modifier(traps_ppm), qos_ppm.min(PPM_SCALE)),
        ProofMetrics::Quantum { traps_ppm, .. } => traps_modifier(traps_ppm),
        ProofMetrics::Storage { qos_ppm, .. } => qos_ppm.min(PPM_SCALE),
    }
}

#[cfg(test)]
mod tests {
    use poies_shared::kind::ProofKind;
    use pretty_assertions::assert_eq;

    use super::*;

    fn neutral_alpha() -> KindTable<u64> {
        KindTable([PPM_SCALE; 5])
    }

    /// A policy whose curves pass the metric magnitude through
    /// unchanged, so cap behaviour is visible in isolation.
    fn identity_policy() -> Policy {
        let mut policy = Policy::default();
        for kind in poies_shared::kind::ALL_KINDS {
            policy.curves[kind] = poies_policy::CurveSpec {
                shape: poies_policy::CurveShape::AffineClamp,
                scale: PPM_SCALE,
                shift: 0,
                clamp: u64::MAX,
            };
        }
        policy
    }

    #[test]
    fn hash_share_scores_its_draw() {
        let policy = identity_policy();
        // u = 0.1 share draw scores H(0.1) = 2.302585 nats.
        let metrics = ProofMetrics::Hash {
            u_draw: 1_844_674_407_370_955_161,
        };
        assert_eq!(psi_raw(&policy, &neutral_alpha(), &metrics).unwrap(), 2_302_585);
    }

    #[test]
    fn traps_penalty_scales_down() {
        let policy = identity_policy();
        let clean = ProofMetrics::Quantum {
            units: 1_000_000,
            traps_ppm: 0,
        };
        // 10% trap failures at 2x penalty: 80% remains.
        let trapped = ProofMetrics::Quantum {
            units: 1_000_000,
            traps_ppm: 100_000,
        };
        let alpha = neutral_alpha();
        assert_eq!(psi_raw(&policy, &alpha, &clean).unwrap(), 1_000_000);
        assert_eq!(psi_raw(&policy, &alpha, &trapped).unwrap(), 800_000);
    }

    #[test]
    fn full_traps_zero_the_proof() {
        let policy = identity_policy();
        let metrics = ProofMetrics::Ai {
            units: 1_000_000,
            traps_ppm: PPM_SCALE,
            qos_ppm: PPM_SCALE,
        };
        assert_eq!(psi_raw(&policy, &neutral_alpha(), &metrics).unwrap(), 0);
    }

    #[test]
    fn qos_scales_storage() {
        let policy = identity_policy();
        let metrics = ProofMetrics::Storage {
            qos_ppm: 250_000,
            redundancy: 400_000,
        };
        assert_eq!(psi_raw(&policy, &neutral_alpha(), &metrics).unwrap(), 100_000);
    }

    #[test]
    fn alpha_multiplier_applies_when_enabled() {
        let mut policy = identity_policy();
        let metrics = ProofMetrics::Vdf { seconds: 1_000_000 };
        let mut alpha = neutral_alpha();
        alpha[ProofKind::Vdf] = 500_000;

        assert_eq!(psi_raw(&policy, &alpha, &metrics).unwrap(), 500_000);

        policy.alpha.enabled = false;
        assert_eq!(psi_raw(&policy, &alpha, &metrics).unwrap(), 1_000_000);
    }

    #[test]
    fn weight_applies_before_caps() {
        let mut policy = identity_policy();
        policy.weights_ppm[ProofKind::Ai] = 250_000;
        let metrics = ProofMetrics::Ai {
            units: 1_000_000,
            traps_ppm: 0,
            qos_ppm: PPM_SCALE,
        };
        assert_eq!(psi_raw(&policy, &neutral_alpha(), &metrics).unwrap(), 250_000);
    }
}
