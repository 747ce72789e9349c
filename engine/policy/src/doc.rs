// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Operator-facing policy document. The TOML form exists for humans;
//! the canonical CBOR encoding of the resulting [`Policy`] is what the
//! content root commits to.

use serde::Deserialize;

use poies_shared::error::PolicyError;
use poies_shared::kind::{KindTable, ProofKind};
use poies_shared::math::LN_TABLE_DIGEST;

use crate::curve::{CurveShape, CurveSpec};
use crate::policy::{
    AlphaConfig, BeaconConfig, EscortConfig, EscortTier, Policy, ProofBudget, ThetaConfig,
    TierRequirement, TtlConfig, VdfConfig,
};

/// One value per proof kind, addressed by name in the document.
#[derive(Debug, Clone, Deserialize)]
struct KindValues<T> {
    hash: T,
    ai: T,
    quantum: T,
    storage: T,
    vdf: T,
}

impl<T> From<KindValues<T>> for KindTable<T> {
    fn from(v: KindValues<T>) -> Self {
        KindTable([v.hash, v.ai, v.quantum, v.storage, v.vdf])
    }
}

fn kind_from_name(name: &str) -> Result<ProofKind, PolicyError> {
    match name {
        "hash" => Ok(ProofKind::Hash),
        "ai" => Ok(ProofKind::Ai),
        "quantum" => Ok(ProofKind::Quantum),
        "storage" => Ok(ProofKind::Storage),
        "vdf" => Ok(ProofKind::Vdf),
        other => Err(PolicyError::Malformed(format!(
            "unknown proof kind name {other:?}"
        ))),
    }
}

#[derive(Debug, Clone, Deserialize)]
struct CurveDoc {
    shape: String,
    scale: u64,
    shift: u64,
    clamp: u64,
}

impl CurveDoc {
    fn build(&self) -> Result<CurveSpec, PolicyError> {
        let shape = match self.shape.as_str() {
            "affine-clamp" => CurveShape::AffineClamp,
            "log" => CurveShape::Log,
            "saturating-rational" => CurveShape::SaturatingRational,
            other => {
                return Err(PolicyError::Malformed(format!(
                    "unknown curve shape {other:?}"
                )))
            }
        };
        Ok(CurveSpec {
            shape,
            scale: self.scale,
            shift: self.shift,
            clamp: self.clamp,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
struct BudgetDoc {
    max_body_bytes: u32,
    max_verify_ms: u32,
}

#[derive(Debug, Clone, Deserialize)]
struct TierRequirementDoc {
    kind: String,
    min_munats: u64,
}

#[derive(Debug, Clone, Deserialize)]
struct TierDoc {
    cap: u64,
    requires: Vec<TierRequirementDoc>,
}

#[derive(Debug, Clone, Deserialize)]
struct EscortDoc {
    smooth_enabled: bool,
    boost_ppm: KindValues<u64>,
    boost_max_ppm: u64,
    reference_munats: KindValues<u64>,
    tiered_enabled: bool,
    #[serde(default)]
    tiers: KindValues<Vec<TierDoc>>,
}

impl Default for KindValues<Vec<TierDoc>> {
    fn default() -> Self {
        KindValues {
            hash: vec![],
            ai: vec![],
            quantum: vec![],
            storage: vec![],
            vdf: vec![],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct AlphaDoc {
    enabled: bool,
    initial_ppm: u64,
    targets_ppm: KindValues<u64>,
    window_blocks: u64,
    step_ppm: u64,
    min_ppm: u64,
    max_ppm: u64,
}

#[derive(Debug, Clone, Deserialize)]
struct ThetaDoc {
    initial: u64,
    min: u64,
    max: u64,
    margin: u64,
    target_interval_ms: u64,
    ema_lambda_ppm: u64,
    gain_ppm: u64,
    step_max: u64,
}

#[derive(Debug, Clone, Deserialize)]
struct BeaconDoc {
    genesis_height: u64,
    commit_window: u64,
    reveal_window: u64,
    lag: u64,
    max_reveals: u32,
    max_addr_bytes: u32,
}

#[derive(Debug, Clone, Deserialize)]
struct VdfDoc {
    modulus_hex: String,
    challenge_bits: u32,
    t_min: u64,
    t_max: u64,
}

#[derive(Debug, Clone, Deserialize)]
struct TtlDoc {
    per_kind: KindValues<u64>,
    reveal_ttl: u64,
}

#[derive(Debug, Clone, Deserialize)]
struct PolicyDoc {
    version: u32,
    global_cap: u64,
    epoch_blocks: u64,
    weights_ppm: KindValues<u64>,
    curves: KindValues<CurveDoc>,
    per_proof_cap: KindValues<u64>,
    per_type_cap: KindValues<u64>,
    traps_penalty_ppm: KindValues<u64>,
    budgets: KindValues<BudgetDoc>,
    escort: EscortDoc,
    alpha: AlphaDoc,
    theta: ThetaDoc,
    beacon: BeaconDoc,
    vdf: VdfDoc,
    ttl: TtlDoc,
    /// Optional cross-check of the ln table the document was tuned for.
    ln_table_digest_hex: Option<String>,
}

fn build_tiers(docs: Vec<TierDoc>) -> Result<Vec<EscortTier>, PolicyError> {
    docs.into_iter()
        .map(|tier| {
            let requires = tier
                .requires
                .into_iter()
                .map(|req| {
                    Ok(TierRequirement {
                        kind: kind_from_name(&req.kind)?,
                        min_munats: req.min_munats,
                    })
                })
                .collect::<Result<Vec<_>, PolicyError>>()?;
            Ok(EscortTier {
                cap: tier.cap,
                requires,
            })
        })
        .collect()
}

impl PolicyDoc {
    fn build(self) -> Result<Policy, PolicyError> {
        if let Some(expected) = &self.ln_table_digest_hex {
            let pinned = hex::encode(LN_TABLE_DIGEST.as_bytes());
            if *expected != pinned {
                return Err(PolicyError::LnTableMismatch);
            }
        }
        let curves = KindTable([
            self.curves.hash.build()?,
            self.curves.ai.build()?,
            self.curves.quantum.build()?,
            self.curves.storage.build()?,
            self.curves.vdf.build()?,
        ]);
        let tiers = KindTable([
            build_tiers(self.escort.tiers.hash)?,
            build_tiers(self.escort.tiers.ai)?,
            build_tiers(self.escort.tiers.quantum)?,
            build_tiers(self.escort.tiers.storage)?,
            build_tiers(self.escort.tiers.vdf)?,
        ]);
        let modulus = hex::decode(&self.vdf.modulus_hex)
            .map_err(|e| PolicyError::Malformed(format!("vdf modulus hex: {e}")))?;
        let budget = |doc: BudgetDoc| ProofBudget {
            max_body_bytes: doc.max_body_bytes,
            max_verify_ms: doc.max_verify_ms,
        };

        let policy = Policy {
            version: self.version,
            weights_ppm: self.weights_ppm.into(),
            curves,
            per_proof_cap: self.per_proof_cap.into(),
            per_type_cap: self.per_type_cap.into(),
            global_cap: self.global_cap,
            traps_penalty_ppm: self.traps_penalty_ppm.into(),
            budgets: KindTable([
                budget(self.budgets.hash),
                budget(self.budgets.ai),
                budget(self.budgets.quantum),
                budget(self.budgets.storage),
                budget(self.budgets.vdf),
            ]),
            escort: EscortConfig {
                smooth_enabled: self.escort.smooth_enabled,
                boost_ppm: self.escort.boost_ppm.into(),
                boost_max_ppm: self.escort.boost_max_ppm,
                reference_munats: self.escort.reference_munats.into(),
                tiered_enabled: self.escort.tiered_enabled,
                tiers,
            },
            alpha: AlphaConfig {
                enabled: self.alpha.enabled,
                initial_ppm: self.alpha.initial_ppm,
                targets_ppm: self.alpha.targets_ppm.into(),
                window_blocks: self.alpha.window_blocks,
                step_ppm: self.alpha.step_ppm,
                min_ppm: self.alpha.min_ppm,
                max_ppm: self.alpha.max_ppm,
            },
            theta: ThetaConfig {
                initial: self.theta.initial,
                min: self.theta.min,
                max: self.theta.max,
                margin: self.theta.margin,
                target_interval_ms: self.theta.target_interval_ms,
                ema_lambda_ppm: self.theta.ema_lambda_ppm,
                gain_ppm: self.theta.gain_ppm,
                step_max: self.theta.step_max,
            },
            beacon: BeaconConfig {
                genesis_height: self.beacon.genesis_height,
                commit_window: self.beacon.commit_window,
                reveal_window: self.beacon.reveal_window,
                lag: self.beacon.lag,
                max_reveals: self.beacon.max_reveals,
                max_addr_bytes: self.beacon.max_addr_bytes,
            },
            vdf: VdfConfig {
                modulus,
                challenge_bits: self.vdf.challenge_bits,
                t_min: self.vdf.t_min,
                t_max: self.vdf.t_max,
            },
            ttl: TtlConfig {
                per_kind: self.ttl.per_kind.into(),
                reveal_ttl: self.ttl.reveal_ttl,
            },
            epoch_blocks: self.epoch_blocks,
            ln_table_digest: *LN_TABLE_DIGEST,
        };
        policy.validate()?;
        Ok(policy)
    }
}

impl Policy {
    /// Parses and validates an operator TOML document.
    pub fn from_toml_str(doc: &str) -> Result<Policy, PolicyError> {
        let parsed: PolicyDoc =
            toml::from_str(doc).map_err(|e| PolicyError::Malformed(e.to_string()))?;
        parsed.build()
    }
}
