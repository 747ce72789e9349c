// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! The block validation façade: one transactional decision per
//! candidate block, pure in (header, body, snapshot). State mutation is
//! confined to [`advance_head`], which only the chain-head advancer
//! calls.

use std::collections::BTreeSet;

use poies_beacon::{verify_finalization, BeaconHistory, BeaconOut, RoundSchedule};
use poies_policy::PolicyStore;
use poies_proofs::{aggregate, proofs_root, psi_raw, ProofEnvelope, ScoreVector, ScoredProof, VerifierSet};
use poies_shared::error::{BeaconError, ConsensusError, HeaderError, ProofError};
use poies_shared::hash::Hash32;
use poies_shared::math::MuNat;

use crate::alpha::AlphaState;
use crate::header::{BlockBody, BlockHeader};
use crate::nullifier::{NullifierRegistry, NullifierSnapshot, REVEAL_TYPE_TAG};
use crate::retarget::ThetaState;
use crate::score::check_acceptance;
use crate::u_draw::{compute_u_draw, draw_munats};
use crate::epoch::epoch_of_height;

/// Everything a validation task reads: pinned policy store, the epoch's
/// Θ/α states, an immutable nullifier snapshot, the verifier fleet and
/// the canonical beacon history. Nothing here is mutated by validation.
pub struct ValidationContext<'a> {
    pub policies: &'a PolicyStore,
    pub theta: &'a ThetaState,
    pub alpha: &'a AlphaState,
    pub nullifiers: NullifierSnapshot,
    pub verifiers: &'a VerifierSet,
    pub beacons: &'a BeaconHistory,
}

/// A nullifier insertion the accepted block carries to head advancement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingNullifier {
    pub id: Hash32,
    pub type_tag: u8,
    pub ttl: u64,
}

/// A positively validated block plus the side effects head advancement
/// must apply atomically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedBlock {
    pub header_hash: Hash32,
    pub height: u64,
    pub h_u: MuNat,
    pub total_score: MuNat,
    pub score: ScoreVector,
    pub nullifiers: Vec<PendingNullifier>,
    pub beacon: Option<BeaconOut>,
}

/// Decides `header`/`body` against the snapshot in `ctx`. Pure:
/// repeated calls return identical results and mutate nothing.
pub fn verify_block_consensus(
    header: &BlockHeader,
    body: &BlockBody,
    ctx: &ValidationContext<'_>,
) -> Result<AcceptedBlock, ConsensusError> {
    // Policy pin. An unknown root (neither active nor grandfathered)
    // rejects outright.
    let policy = ctx.policies.pinned(&header.policy_root)?;

    // Header bindings: epoch, threshold, draw, proof commitment.
    let expected_epoch = epoch_of_height(&policy, header.height);
    if header.epoch_index != expected_epoch {
        return Err(HeaderError::EpochMismatch {
            header: header.epoch_index,
            expected: expected_epoch,
        }
        .into());
    }
    if header.theta != ctx.theta.theta {
        return Err(HeaderError::ThetaMismatch {
            header: header.theta,
            expected: ctx.theta.theta,
        }
        .into());
    }

    let template = header.template_bytes()?;
    let draw = compute_u_draw(&template, header.nonce);
    if draw.bind != header.u_draw_bind {
        return Err(HeaderError::UDrawBindMismatch.into());
    }

    if !ProofEnvelope::is_canonical_order(&body.proofs) {
        return Err(ProofError::Schema("proof list not in canonical order".into()).into());
    }
    if proofs_root(&body.proofs)? != header.proofs_root {
        return Err(HeaderError::ProofsRootMismatch.into());
    }
    match (&body.beacon, &header.beacon_record_ref) {
        (None, None) => {}
        (Some(record), Some(reference)) => {
            if record.record_hash()? != *reference {
                return Err(HeaderError::BeaconRefMismatch.into());
            }
        }
        _ => return Err(HeaderError::BeaconRefMismatch.into()),
    }

    // Proof verification, nullifier collection, raw scoring.
    let mut seen: BTreeSet<Hash32> = BTreeSet::new();
    let mut pending: Vec<PendingNullifier> = Vec::with_capacity(body.proofs.len());
    let mut scored: Vec<ScoredProof> = Vec::with_capacity(body.proofs.len());
    for envelope in &body.proofs {
        let metrics = ctx.verifiers.verify(&policy, envelope)?;
        let kind = metrics.kind();

        let id = envelope.nullifier;
        if !seen.insert(id) || ctx.nullifiers.contains(&id) {
            return Err(ConsensusError::NullifierReuse {
                id,
                type_tag: kind.tag(),
            });
        }
        pending.push(PendingNullifier {
            id,
            type_tag: kind.tag(),
            ttl: policy.ttl_for(kind),
        });

        let raw = psi_raw(&policy, &ctx.alpha.alpha_ppm, &metrics)?;
        scored.push(ScoredProof {
            kind,
            order_key: envelope.order_key(),
            raw,
        });
    }

    // Acceptance.
    let vector = aggregate(&policy, &scored)?;
    let h_u = draw_munats(draw.raw);
    let total_score = check_acceptance(h_u, vector.total_effective, ctx.theta.theta)?;

    // Beacon finalization, when the block closes a round.
    let beacon = match &body.beacon {
        None => None,
        Some(record) => {
            let finalizing =
                RoundSchedule::round_finalizing_at(&policy.beacon, header.height).ok_or(
                    BeaconError::OutsideWindow {
                        round: record.round_id,
                        height: header.height,
                    },
                )?;
            if finalizing != record.round_id {
                return Err(BeaconError::OutsideWindow {
                    round: record.round_id,
                    height: header.height,
                }
                .into());
            }
            let prev = ctx.beacons.prev_hash_for(record.round_id)?;
            let out = verify_finalization(&policy, record, &prev, header.height)?;

            for entry in &record.reveals {
                let id = entry.reveal.nullifier();
                if !seen.insert(id) || ctx.nullifiers.contains(&id) {
                    return Err(ConsensusError::NullifierReuse {
                        id,
                        type_tag: REVEAL_TYPE_TAG,
                    });
                }
                pending.push(PendingNullifier {
                    id,
                    type_tag: REVEAL_TYPE_TAG,
                    ttl: policy.ttl.reveal_ttl,
                });
            }
            Some(out)
        }
    };

    Ok(AcceptedBlock {
        header_hash: header.header_hash()?,
        height: header.height,
        h_u,
        total_score,
        score: vector,
        nullifiers: pending,
        beacon,
    })
}

/// Applies an accepted block's side effects: nullifier insertions, the
/// beacon append, and a TTL sweep. All-or-nothing against the single
/// authoritative registry; validation snapshots are unaffected.
pub fn advance_head(
    registry: &mut NullifierRegistry,
    beacons: &mut BeaconHistory,
    accepted: &AcceptedBlock,
) -> Result<(), ConsensusError> {
    for pending in &accepted.nullifiers {
        if registry.check(&pending.id).is_some() {
            return Err(ConsensusError::NullifierReuse {
                id: pending.id,
                type_tag: pending.type_tag,
            });
        }
    }
    if let Some(out) = &accepted.beacon {
        beacons.append(*out)?;
    }
    for pending in &accepted.nullifiers {
        registry.insert_if_absent(pending.id, pending.type_tag, accepted.height, pending.ttl);
    }
    registry.gc(accepted.height);
    log::debug!(
        "head advanced to {} ({}): score {} μnats, {} nullifiers",
        accepted.height,
        accepted.header_hash,
        accepted.total_score,
        accepted.nullifiers.len()
    );
    Ok(())
}
