// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use fvm_ipld_encoding::strict_bytes;
use fvm_ipld_encoding::tuple::*;

use poies_shared::error::PolicyError;
use poies_shared::hash::{domain_hash, Hash32, TAG_POLICY_ROOT};
use poies_shared::kind::{KindTable, ProofKind, ALL_KINDS};
use poies_shared::math::{MuNat, LN_TABLE_DIGEST, PPM_SCALE};

use crate::constants;
use crate::curve::{CurveShape, CurveSpec};

/// Escort/diversity configuration. Smooth multipliers and tiered cap
/// unlocks may be enabled together; multipliers apply first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize_tuple, Deserialize_tuple)]
pub struct EscortConfig {
    pub smooth_enabled: bool,
    /// Per-type boost slopes b[t], each bounded by `boost_max_ppm`.
    pub boost_ppm: KindTable<u64>,
    pub boost_max_ppm: u64,
    /// Reference escort levels; the diversity index is the min ratio of
    /// provisional sums to these. Zero marks a non-reference kind.
    pub reference_munats: KindTable<MuNat>,
    pub tiered_enabled: bool,
    /// Ascending unlock tiers per kind; the base tier is the plain
    /// per-type cap.
    pub tiers: KindTable<Vec<EscortTier>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize_tuple, Deserialize_tuple)]
pub struct EscortTier {
    /// Effective per-type cap when this tier's requirements hold.
    pub cap: MuNat,
    pub requires: Vec<TierRequirement>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_tuple, Deserialize_tuple)]
pub struct TierRequirement {
    pub kind: ProofKind,
    pub min_munats: MuNat,
}

/// α-tuner parameters: slow per-type multiplier adjustment toward the
/// target shares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize_tuple, Deserialize_tuple)]
pub struct AlphaConfig {
    pub enabled: bool,
    pub initial_ppm: u64,
    pub targets_ppm: KindTable<u64>,
    pub window_blocks: u64,
    pub step_ppm: u64,
    pub min_ppm: u64,
    pub max_ppm: u64,
}

/// Θ retarget parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize_tuple, Deserialize_tuple)]
pub struct ThetaConfig {
    pub initial: MuNat,
    pub min: MuNat,
    pub max: MuNat,
    /// Required gap between Γ and the floor, keeping acceptance
    /// probability bounded away from one.
    pub margin: MuNat,
    pub target_interval_ms: u64,
    pub ema_lambda_ppm: u64,
    pub gain_ppm: u64,
    pub step_max: MuNat,
}

/// Beacon round geometry, block-height driven.
#[derive(Debug, Clone, PartialEq, Eq, Serialize_tuple, Deserialize_tuple)]
pub struct BeaconConfig {
    pub genesis_height: u64,
    pub commit_window: u64,
    pub reveal_window: u64,
    /// Consumers read round `r - lag`.
    pub lag: u64,
    pub max_reveals: u32,
    pub max_addr_bytes: u32,
}

impl BeaconConfig {
    pub fn round_period(&self) -> u64 {
        self.commit_window + self.reveal_window
    }
}

/// Wesolowski VDF group parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize_tuple, Deserialize_tuple)]
pub struct VdfConfig {
    /// RSA modulus N, big-endian. `y` and `π` are left-padded to this
    /// width on the wire.
    #[serde(with = "strict_bytes")]
    pub modulus: Vec<u8>,
    pub challenge_bits: u32,
    pub t_min: u64,
    pub t_max: u64,
}

/// Nullifier TTL windows in blocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize_tuple, Deserialize_tuple)]
pub struct TtlConfig {
    pub per_kind: KindTable<u64>,
    pub reveal_ttl: u64,
}

/// Per-kind verification budgets, enforced before scoring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize_tuple, Deserialize_tuple)]
pub struct ProofBudget {
    pub max_body_bytes: u32,
    pub max_verify_ms: u32,
}

/// The complete consensus policy. Immutable for the lifetime of its
/// root; every read during validation goes through a view pinned by the
/// header's `policy_root`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize_tuple, Deserialize_tuple)]
pub struct Policy {
    pub version: u32,
    pub weights_ppm: KindTable<u64>,
    pub curves: KindTable<CurveSpec>,
    pub per_proof_cap: KindTable<MuNat>,
    pub per_type_cap: KindTable<MuNat>,
    /// Global cap Γ.
    pub global_cap: MuNat,
    pub traps_penalty_ppm: KindTable<u64>,
    pub budgets: KindTable<ProofBudget>,
    pub escort: EscortConfig,
    pub alpha: AlphaConfig,
    pub theta: ThetaConfig,
    pub beacon: BeaconConfig,
    pub vdf: VdfConfig,
    pub ttl: TtlConfig,
    pub epoch_blocks: u64,
    /// Digest of the fixed-point ln table this policy was tuned
    /// against; checked against the linked table at load.
    pub ln_table_digest: Hash32,
}

impl Default for Policy {
    fn default() -> Policy {
        Policy {
            version: constants::POLICY_VERSION,
            weights_ppm: KindTable([constants::WEIGHT_PPM; 5]),
            curves: KindTable([
                // hash share: identity on the secondary draw's μ-nats
                CurveSpec {
                    shape: CurveShape::AffineClamp,
                    scale: PPM_SCALE,
                    shift: 0,
                    clamp: constants::PER_TYPE_CAP[0],
                },
                // ai: log in accepted work units
                CurveSpec {
                    shape: CurveShape::Log,
                    scale: PPM_SCALE,
                    shift: 1_000,
                    clamp: constants::PER_TYPE_CAP[1],
                },
                // quantum: log in accepted shot units
                CurveSpec {
                    shape: CurveShape::Log,
                    scale: PPM_SCALE,
                    shift: 1_000,
                    clamp: constants::PER_TYPE_CAP[2],
                },
                // storage: saturating in redundancy
                CurveSpec {
                    shape: CurveShape::SaturatingRational,
                    scale: 2_000_000,
                    shift: 4,
                    clamp: constants::PER_TYPE_CAP[3],
                },
                // vdf: affine in proven delay seconds
                CurveSpec {
                    shape: CurveShape::AffineClamp,
                    scale: 10_000,
                    shift: 0,
                    clamp: constants::PER_TYPE_CAP[4],
                },
            ]),
            per_proof_cap: KindTable(constants::PER_PROOF_CAP),
            per_type_cap: KindTable(constants::PER_TYPE_CAP),
            global_cap: constants::GLOBAL_CAP,
            traps_penalty_ppm: KindTable([
                0,
                constants::TRAPS_PENALTY_PPM,
                constants::TRAPS_PENALTY_PPM,
                0,
                0,
            ]),
            budgets: KindTable(constants::PROOF_BUDGETS.map(|(bytes, ms)| ProofBudget {
                max_body_bytes: bytes,
                max_verify_ms: ms,
            })),
            escort: EscortConfig {
                smooth_enabled: true,
                boost_ppm: KindTable(constants::ESCORT_BOOST_PPM),
                boost_max_ppm: constants::ESCORT_BOOST_MAX_PPM,
                reference_munats: KindTable(constants::ESCORT_REFERENCE),
                tiered_enabled: false,
                tiers: KindTable([vec![], vec![], vec![], vec![], vec![]]),
            },
            alpha: AlphaConfig {
                enabled: true,
                initial_ppm: constants::ALPHA_INITIAL_PPM,
                targets_ppm: KindTable(constants::ALPHA_TARGET_PPM),
                window_blocks: constants::ALPHA_WINDOW_BLOCKS,
                step_ppm: constants::ALPHA_STEP_PPM,
                min_ppm: constants::ALPHA_MIN_PPM,
                max_ppm: constants::ALPHA_MAX_PPM,
            },
            theta: ThetaConfig {
                initial: constants::THETA_INITIAL,
                min: constants::THETA_MIN,
                max: constants::THETA_MAX,
                margin: constants::THETA_MARGIN,
                target_interval_ms: constants::TARGET_INTERVAL_MS,
                ema_lambda_ppm: constants::EMA_LAMBDA_PPM,
                gain_ppm: constants::THETA_GAIN_PPM,
                step_max: constants::THETA_STEP_MAX,
            },
            beacon: BeaconConfig {
                genesis_height: constants::BEACON_GENESIS_HEIGHT,
                commit_window: constants::BEACON_COMMIT_WINDOW,
                reveal_window: constants::BEACON_REVEAL_WINDOW,
                lag: constants::BEACON_LAG,
                max_reveals: constants::BEACON_MAX_REVEALS,
                max_addr_bytes: constants::BEACON_MAX_ADDR_BYTES,
            },
            vdf: VdfConfig {
                modulus: constants::DEVNET_MODULUS.clone(),
                challenge_bits: constants::VDF_CHALLENGE_BITS,
                t_min: constants::VDF_T_MIN,
                t_max: constants::VDF_T_MAX,
            },
            ttl: TtlConfig {
                per_kind: KindTable(constants::NULLIFIER_TTL_BLOCKS),
                reveal_ttl: constants::REVEAL_TTL_BLOCKS,
            },
            epoch_blocks: constants::EPOCH_BLOCKS,
            ln_table_digest: *LN_TABLE_DIGEST,
        }
    }
}

impl Policy {
    /// Canonical CBOR encoding; the preimage of the policy root.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, PolicyError> {
        fvm_ipld_encoding::to_vec(self).map_err(|e| PolicyError::Malformed(e.to_string()))
    }

    /// Content hash pinned into block headers.
    pub fn policy_root(&self) -> Result<Hash32, PolicyError> {
        Ok(domain_hash(TAG_POLICY_ROOT, &[&self.canonical_bytes()?]))
    }

    pub fn ttl_for(&self, kind: ProofKind) -> u64 {
        self.ttl.per_kind[kind]
    }

    /// Checks every structural invariant a valid policy must satisfy.
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.ln_table_digest != *LN_TABLE_DIGEST {
            return Err(PolicyError::LnTableMismatch);
        }
        // Θ geometry: keeps Σψ_eff alone from ever reaching Θ.
        if self.theta.min <= self.global_cap.saturating_add(self.theta.margin) {
            return Err(PolicyError::GammaAboveThetaMin {
                gamma: self.global_cap,
                theta_min: self.theta.min,
                margin: self.theta.margin,
            });
        }
        if self.theta.min > self.theta.max
            || self.theta.initial < self.theta.min
            || self.theta.initial > self.theta.max
        {
            return Err(PolicyError::Malformed(
                "theta clamps must satisfy min <= initial <= max".into(),
            ));
        }
        if self.theta.target_interval_ms == 0 {
            return Err(PolicyError::Malformed("target interval must be positive".into()));
        }
        if self.theta.ema_lambda_ppm > PPM_SCALE {
            return Err(PolicyError::Malformed("ema lambda exceeds unity".into()));
        }
        if self.epoch_blocks == 0 {
            return Err(PolicyError::Malformed("epoch length must be positive".into()));
        }

        for kind in ALL_KINDS {
            self.curves[kind].validate()?;
            // A tier can raise the type cap, so the per-proof bound is
            // against the highest reachable cap.
            let highest_type_cap = self.escort.tiers[kind]
                .iter()
                .map(|tier| tier.cap)
                .fold(self.per_type_cap[kind], MuNat::max);
            if self.per_proof_cap[kind] > highest_type_cap {
                return Err(PolicyError::Malformed(format!(
                    "per-proof cap exceeds the highest per-type cap for {kind}"
                )));
            }
            if self.ttl.per_kind[kind] == 0 {
                return Err(PolicyError::Malformed(format!("zero nullifier ttl for {kind}")));
            }
            if self.escort.boost_ppm[kind] > self.escort.boost_max_ppm {
                return Err(PolicyError::Malformed(format!(
                    "escort boost for {kind} exceeds boost_max"
                )));
            }
            for tier in self.escort.tiers[kind].iter() {
                if tier.requires.is_empty() {
                    return Err(PolicyError::Malformed(format!(
                        "escort tier for {kind} has no requirements"
                    )));
                }
            }
        }

        if self.escort.smooth_enabled
            && ALL_KINDS
                .iter()
                .all(|k| self.escort.reference_munats[*k] == 0)
        {
            return Err(PolicyError::Malformed(
                "smooth escort mode requires at least one reference kind".into(),
            ));
        }

        if self.alpha.min_ppm > self.alpha.max_ppm
            || self.alpha.initial_ppm < self.alpha.min_ppm
            || self.alpha.initial_ppm > self.alpha.max_ppm
        {
            return Err(PolicyError::Malformed(
                "alpha clamps must satisfy min <= initial <= max".into(),
            ));
        }
        if self.alpha.window_blocks == 0 {
            return Err(PolicyError::Malformed("alpha window must be positive".into()));
        }
        for kind in ALL_KINDS {
            if self.alpha.targets_ppm[kind] > PPM_SCALE {
                return Err(PolicyError::Malformed(format!(
                    "alpha target share for {kind} exceeds unity"
                )));
            }
        }

        if self.beacon.commit_window == 0 || self.beacon.reveal_window == 0 {
            return Err(PolicyError::Malformed("beacon windows must be positive".into()));
        }
        if self.beacon.lag == 0 {
            return Err(PolicyError::Malformed(
                "beacon lag must be at least one round".into(),
            ));
        }
        if self.beacon.max_reveals == 0 {
            return Err(PolicyError::Malformed("beacon reveal bound must be positive".into()));
        }
        if self.ttl.reveal_ttl == 0 {
            return Err(PolicyError::Malformed("zero reveal ttl".into()));
        }

        let modulus = &self.vdf.modulus;
        if modulus.len() < 16 || modulus.first() == Some(&0) {
            return Err(PolicyError::Malformed(
                "vdf modulus must be at least 128 bits with no leading zero".into(),
            ));
        }
        if modulus.last().map(|b| b & 1) != Some(1) {
            return Err(PolicyError::Malformed("vdf modulus must be odd".into()));
        }
        if self.vdf.challenge_bits != constants::VDF_CHALLENGE_BITS {
            return Err(PolicyError::Malformed(
                "unsupported vdf challenge width".into(),
            ));
        }
        if self.vdf.t_min == 0 || self.vdf.t_min > self.vdf.t_max {
            return Err(PolicyError::Malformed(
                "vdf delay bounds must satisfy 0 < t_min <= t_max".into(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn default_policy_validates() {
        Policy::default().validate().unwrap();
    }

    #[test]
    fn policy_root_survives_cbor_roundtrip() {
        let policy = Policy::default();
        let bytes = policy.canonical_bytes().unwrap();
        let decoded: Policy = fvm_ipld_encoding::from_slice(&bytes).unwrap();
        assert_eq!(policy, decoded);
        assert_eq!(decoded.canonical_bytes().unwrap(), bytes);
        assert_eq!(policy.policy_root().unwrap(), decoded.policy_root().unwrap());
    }

    #[test]
    fn root_changes_with_content() {
        let policy = Policy::default();
        let mut tweaked = policy.clone();
        tweaked.global_cap -= 1;
        assert_ne!(
            policy.policy_root().unwrap(),
            tweaked.policy_root().unwrap()
        );
    }

    #[test]
    fn gamma_must_stay_below_theta_floor() {
        let mut policy = Policy::default();
        policy.global_cap = policy.theta.min;
        let err = policy.validate().unwrap_err();
        assert!(matches!(err, PolicyError::GammaAboveThetaMin { .. }));

        // The margin participates in the bound.
        let mut policy = Policy::default();
        policy.global_cap = policy.theta.min - policy.theta.margin;
        assert!(matches!(
            policy.validate(),
            Err(PolicyError::GammaAboveThetaMin { .. })
        ));
    }

    #[test]
    fn ln_table_digest_is_checked() {
        let mut policy = Policy::default();
        policy.ln_table_digest = Hash32::zero();
        assert_eq!(policy.validate().unwrap_err(), PolicyError::LnTableMismatch);
    }

    #[test]
    fn tier_without_requirements_is_rejected() {
        let mut policy = Policy::default();
        policy.escort.tiers[ProofKind::Ai] = vec![EscortTier {
            cap: 10_000_000,
            requires: vec![],
        }];
        assert!(matches!(
            policy.validate(),
            Err(PolicyError::Malformed(_))
        ));
    }

    #[test]
    fn smooth_mode_needs_references() {
        let mut policy = Policy::default();
        policy.escort.reference_munats = KindTable([0; 5]);
        assert!(matches!(policy.validate(), Err(PolicyError::Malformed(_))));
    }

    #[test]
    fn even_modulus_is_rejected() {
        let mut policy = Policy::default();
        let last = policy.vdf.modulus.last_mut().unwrap();
        *last &= 0xfe;
        assert!(matches!(policy.validate(), Err(PolicyError::Malformed(_))));
    }
}
