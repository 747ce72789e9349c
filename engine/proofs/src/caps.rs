// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! The caps & escort engine: per-proof cap, diversity/escort
//! adjustment, per-type cap, global cap, in that fixed order. Excess is
//! discarded, never reallocated.

use poies_policy::{EscortConfig, Policy};
use poies_shared::error::ScoringError;
use poies_shared::hash::Hash32;
use poies_shared::kind::{KindTable, ProofKind, ALL_KINDS};
use poies_shared::math::{mul_ppm, ratio_ppm, MuNat, PPM_SCALE};

/// One proof entering the engine: its kind, canonical-order tiebreak
/// key, and the adapter's raw score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoredProof {
    pub kind: ProofKind,
    pub order_key: Hash32,
    pub raw: MuNat,
}

/// Per-proof outcome after the per-proof cap and diversity multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProofScore {
    pub kind: ProofKind,
    pub order_key: Hash32,
    pub raw: MuNat,
    pub capped: MuNat,
    pub boosted: MuNat,
}

/// Per-type μ-nat sums through the pipeline stages. `effective` is the
/// amount this type contributes after the per-type and global caps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TypeScore {
    pub raw: MuNat,
    pub capped: MuNat,
    pub boosted: MuNat,
    pub cap_effective: MuNat,
    pub effective: MuNat,
}

/// The engine's result: `Σψ_eff`, the per-type breakdown in canonical
/// order, and the discarded-overflow summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreVector {
    pub per_proof: Vec<ProofScore>,
    pub per_type: KindTable<TypeScore>,
    pub total_effective: MuNat,
    pub discarded: MuNat,
    /// Diversity index D in ppm (10^6 when smooth mode is off).
    pub diversity_ppm: u64,
}

fn narrow(value: u128, site: &'static str) -> Result<MuNat, ScoringError> {
    u64::try_from(value).map_err(|_| ScoringError::Overflow(site))
}

/// The diversity index `D ∈ [0, 1]` in ppm: the normalized min-ratio of
/// provisional per-type sums over the policy's reference escorts.
fn diversity_ppm(escort: &EscortConfig, capped_sums: &KindTable<u128>) -> u64 {
    let mut index = PPM_SCALE;
    for kind in ALL_KINDS {
        let reference = escort.reference_munats[kind];
        if reference == 0 {
            continue;
        }
        index = index.min(ratio_ppm(capped_sums[kind], reference as u128));
    }
    index
}

/// The effective per-type cap under tiered escort: the highest tier
/// whose requirements are all met by the provisional sums, defaulting to
/// the plain per-type cap.
fn tiered_cap(
    policy: &Policy,
    kind: ProofKind,
    provisional: &KindTable<u128>,
) -> MuNat {
    let mut cap = policy.per_type_cap[kind];
    for tier in policy.escort.tiers[kind].iter() {
        let satisfied = tier
            .requires
            .iter()
            .all(|req| provisional[req.kind] >= req.min_munats as u128);
        if satisfied {
            cap = cap.max(tier.cap);
        }
    }
    cap
}

/// Runs the fixed cap order over the block's proofs. The input is
/// re-sorted into canonical order (type tag ascending, then order key),
/// so permuted inputs produce identical vectors.
pub fn aggregate(policy: &Policy, proofs: &[ScoredProof]) -> Result<ScoreVector, ScoringError> {
    let mut ordered = proofs.to_vec();
    ordered.sort_by(|a, b| {
        (a.kind.tag(), a.order_key)
            .cmp(&(b.kind.tag(), b.order_key))
    });

    // Stage 1: per-proof caps, accumulated per type.
    let mut raw_sums: KindTable<u128> = KindTable([0; 5]);
    let mut capped_sums: KindTable<u128> = KindTable([0; 5]);
    let mut per_proof: Vec<ProofScore> = Vec::with_capacity(ordered.len());
    for proof in &ordered {
        let capped = proof.raw.min(policy.per_proof_cap[proof.kind]);
        raw_sums[proof.kind] += proof.raw as u128;
        capped_sums[proof.kind] += capped as u128;
        per_proof.push(ProofScore {
            kind: proof.kind,
            order_key: proof.order_key,
            raw: proof.raw,
            capped,
            boosted: capped,
        });
    }

    // Stage 2: smooth diversity multipliers, applied per proof.
    let diversity = if policy.escort.smooth_enabled {
        diversity_ppm(&policy.escort, &capped_sums)
    } else {
        PPM_SCALE
    };
    let mut boosted_sums: KindTable<u128> = KindTable([0; 5]);
    for score in per_proof.iter_mut() {
        if policy.escort.smooth_enabled {
            let slope = policy.escort.boost_ppm[score.kind];
            let beta_ppm = PPM_SCALE.saturating_add(mul_ppm(slope, diversity));
            score.boosted = mul_ppm(score.capped, beta_ppm);
        }
        boosted_sums[score.kind] += score.boosted as u128;
    }

    // Stage 3: per-type caps, tier-unlocked from the post-multiplier
    // provisional sums when tiered mode is on.
    let mut per_type: KindTable<TypeScore> = KindTable([TypeScore::default(); 5]);
    for kind in ALL_KINDS {
        let cap_effective = if policy.escort.tiered_enabled {
            tiered_cap(policy, kind, &boosted_sums)
        } else {
            policy.per_type_cap[kind]
        };
        per_type[kind] = TypeScore {
            raw: narrow(raw_sums[kind].min(u64::MAX as u128), "raw sum")?,
            capped: narrow(capped_sums[kind].min(u64::MAX as u128), "capped sum")?,
            boosted: narrow(boosted_sums[kind].min(u64::MAX as u128), "boosted sum")?,
            cap_effective,
            effective: 0,
        };
    }

    // Stage 4: global cap, allocated greedily in canonical kind order.
    let mut total: u64 = 0;
    for kind in ALL_KINDS {
        let type_amount = per_type[kind]
            .boosted
            .min(per_type[kind].cap_effective);
        let allocated = type_amount.min(policy.global_cap - total);
        per_type[kind].effective = allocated;
        total += allocated;
    }

    let raw_total: u128 = ALL_KINDS.iter().map(|k| raw_sums[*k]).sum();
    let discarded = narrow(
        raw_total.saturating_sub(total as u128).min(u64::MAX as u128),
        "discard sum",
    )?;
    if discarded > 0 {
        log::debug!(
            "score aggregation discarded {discarded} μnats (diversity {diversity} ppm, total {total})"
        );
    }

    Ok(ScoreVector {
        per_proof,
        per_type,
        total_effective: total,
        discarded,
        diversity_ppm: diversity,
    })
}
