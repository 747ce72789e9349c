// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! End-to-end validation scenarios through the façade: mined headers,
//! real envelopes, real beacon transcripts.

use fvm_ipld_encoding::RawBytes;
use pretty_assertions::assert_eq;

use poies_beacon::{
    aggregate_hash, commit_proof, commit_root, reveal_root, vdf_input, BeaconHistory,
    BeaconRecord, Reveal, RevealWithProof, RoundSchedule, VdfVerifier,
};
use poies_policy::{CurveShape, CurveSpec, Policy, PolicyStore};
use poies_proofs::{MetricsBodyVerifier, ProofEnvelope, ProofMetrics, VerifierSet};
use poies_shared::error::{BeaconError, ConsensusError, HeaderError, PolicyError, ProofError};
use poies_shared::hash::Hash32;
use poies_shared::kind::{KindTable, ProofKind, ALL_KINDS};
use poies_shared::math::{MuNat, PPM_SCALE};

use crate::{
    advance_head, compute_u_draw, draw_munats, epoch_of_height, verify_block_consensus,
    AlphaState, BlockBody, BlockHeader, NullifierRegistry, ThetaState, ValidationContext,
    REVEAL_TYPE_TAG,
};

const TEST_MODULUS_HEX: &str = "780000000000a8e7a00000002808ca5f";

/// Scenario profile: identity curves (ψ_raw equals the metric
/// magnitude), tuner and escorts off, Γ = 4.0, Θ₀ = 6.0, storage
/// proofs clipped at 0.5.
fn scenario_policy() -> Policy {
    let mut policy = Policy::default();
    for kind in ALL_KINDS {
        policy.curves[kind] = CurveSpec {
            shape: CurveShape::AffineClamp,
            scale: PPM_SCALE,
            shift: 0,
            clamp: u64::MAX,
        };
        policy.weights_ppm[kind] = PPM_SCALE;
    }
    policy.per_proof_cap = KindTable([4_000_000, 8_000_000, 8_000_000, 500_000, 4_000_000]);
    policy.per_type_cap = KindTable([4_000_000, 8_000_000, 8_000_000, 6_000_000, 4_000_000]);
    policy.global_cap = 4_000_000;
    policy.alpha.enabled = false;
    policy.escort.smooth_enabled = false;
    policy.escort.tiered_enabled = false;
    policy.vdf.modulus = hex::decode(TEST_MODULUS_HEX).unwrap();
    policy.vdf.t_max = 1 << 20;
    policy.validate().unwrap();
    policy
}

struct Harness {
    store: PolicyStore,
    theta: ThetaState,
    alpha: AlphaState,
    registry: NullifierRegistry,
    verifiers: VerifierSet,
    beacons: BeaconHistory,
}

impl Harness {
    fn new(theta: MuNat) -> Harness {
        let policy = scenario_policy();
        let theta_state = ThetaState {
            theta,
            ema_interval_ms: policy.theta.target_interval_ms,
            epoch_index: 0,
        };
        let alpha = AlphaState::genesis(&policy);
        Harness {
            store: PolicyStore::new(policy).unwrap(),
            theta: theta_state,
            alpha,
            registry: NullifierRegistry::new(),
            verifiers: MetricsBodyVerifier::full_set(),
            beacons: BeaconHistory::new(Hash32([0xa5; 32])),
        }
    }

    fn context(&self) -> ValidationContext<'_> {
        ValidationContext {
            policies: &self.store,
            theta: &self.theta,
            alpha: &self.alpha,
            nullifiers: self.registry.snapshot(),
            verifiers: &self.verifiers,
            beacons: &self.beacons,
        }
    }

    fn policy(&self) -> Policy {
        (**self.store.active()).clone()
    }
}

fn envelopes_for(metrics: &[ProofMetrics]) -> Vec<ProofEnvelope> {
    let mut envelopes: Vec<ProofEnvelope> = metrics
        .iter()
        .map(|m| MetricsBodyVerifier::envelope_for(m).unwrap())
        .collect();
    envelopes.sort_by_key(|e| (e.type_tag, e.order_key()));
    envelopes
}

/// Builds the header for a body, then searches nonces until the draw
/// satisfies `pred`, the same loop a miner runs.
fn mine_block(
    harness: &Harness,
    height: u64,
    body: &BlockBody,
    pred: impl Fn(MuNat) -> bool,
) -> BlockHeader {
    let policy = harness.policy();
    let mut header = BlockHeader {
        parent_hash: Hash32([0x11; 32]),
        height,
        epoch_index: epoch_of_height(&policy, height),
        policy_root: harness.store.active_root(),
        theta: harness.theta.theta,
        nonce: 0,
        u_draw_bind: Hash32::zero(),
        proofs_root: poies_proofs::proofs_root(&body.proofs).unwrap(),
        beacon_record_ref: body
            .beacon
            .as_ref()
            .map(|record| record.record_hash().unwrap()),
    };
    let template = header.template_bytes().unwrap();
    for nonce in 0..1_000_000u64 {
        let draw = compute_u_draw(&template, nonce);
        if pred(draw_munats(draw.raw)) {
            header.nonce = nonce;
            header.u_draw_bind = draw.bind;
            return header;
        }
    }
    panic!("no nonce satisfied the draw predicate");
}

fn plain_body(metrics: &[ProofMetrics]) -> BlockBody {
    BlockBody {
        proofs: envelopes_for(metrics),
        beacon: None,
    }
}

// --- acceptance scenarios ---

#[test]
fn hash_only_baseline() {
    let harness = Harness::new(6_000_000);
    let body = plain_body(&[]);

    // A draw below Θ rejects with the exact shortfall surfaced.
    let header = mine_block(&harness, 1, &body, |h_u| h_u < 6_000_000);
    let err = verify_block_consensus(&header, &body, &harness.context()).unwrap_err();
    assert!(matches!(err, ConsensusError::BelowThreshold { theta: 6_000_000, .. }));

    // A draw at or above Θ accepts on the draw alone.
    let header = mine_block(&harness, 1, &body, |h_u| h_u >= 6_000_000);
    let accepted = verify_block_consensus(&header, &body, &harness.context()).unwrap();
    assert_eq!(accepted.total_score, accepted.h_u);
    assert_eq!(accepted.score.total_effective, 0);
    assert!(accepted.nullifiers.is_empty());
}

#[test]
fn ai_and_storage_with_per_proof_clip() {
    let harness = Harness::new(6_000_000);
    // ψ_raw: AI 1.8, storage 0.6 clipped to 0.5 ⇒ Σψ_eff = 2.3.
    let body = plain_body(&[
        ProofMetrics::Ai {
            units: 1_800_000,
            traps_ppm: 0,
            qos_ppm: PPM_SCALE,
        },
        ProofMetrics::Storage {
            qos_ppm: PPM_SCALE,
            redundancy: 600_000,
        },
    ]);

    // u = 0.1 gives H(u) ≈ 2.302585 ⇒ 4.602585 < 6 ⇒ reject; anything
    // short of 3.7 nats shares that fate.
    let header = mine_block(&harness, 1, &body, |h_u| h_u < 3_700_000);
    let err = verify_block_consensus(&header, &body, &harness.context()).unwrap_err();
    assert!(matches!(err, ConsensusError::BelowThreshold { .. }));

    let header = mine_block(&harness, 1, &body, |h_u| h_u >= 3_700_000);
    let accepted = verify_block_consensus(&header, &body, &harness.context()).unwrap();
    assert_eq!(accepted.score.total_effective, 2_300_000);
    assert_eq!(accepted.score.per_type[ProofKind::Ai].effective, 1_800_000);
    assert_eq!(accepted.score.per_type[ProofKind::Storage].capped, 500_000);
    assert_eq!(accepted.score.discarded, 100_000);
    assert_eq!(accepted.total_score, accepted.h_u + 2_300_000);
}

#[test]
fn near_global_cap_saturates_exactly() {
    let harness = Harness::new(6_000_000);
    let body = plain_body(&[
        ProofMetrics::Ai {
            units: 2_000_000,
            traps_ppm: 0,
            qos_ppm: PPM_SCALE,
        },
        ProofMetrics::Quantum {
            units: 1_800_000,
            traps_ppm: 0,
        },
        ProofMetrics::Storage {
            qos_ppm: PPM_SCALE,
            redundancy: 700_000,
        },
        ProofMetrics::Vdf { seconds: 500_000 },
    ]);

    // Σψ_eff = Γ = 4.0 exactly; accept iff H(u) ≥ 2.0.
    let header = mine_block(&harness, 1, &body, |h_u| h_u >= 2_000_000);
    let accepted = verify_block_consensus(&header, &body, &harness.context()).unwrap();
    assert_eq!(accepted.score.total_effective, 4_000_000);

    let header = mine_block(&harness, 1, &body, |h_u| h_u < 2_000_000);
    assert!(matches!(
        verify_block_consensus(&header, &body, &harness.context()).unwrap_err(),
        ConsensusError::BelowThreshold { .. }
    ));
}

#[test]
fn nullifier_reuse_across_blocks() {
    let mut harness = Harness::new(5_000_000);
    let body = plain_body(&[ProofMetrics::Ai {
        units: 1_800_000,
        traps_ppm: 0,
        qos_ppm: PPM_SCALE,
    }]);

    let header = mine_block(&harness, 10, &body, |h_u| h_u >= 3_200_000);
    let accepted = verify_block_consensus(&header, &body, &harness.context()).unwrap();
    assert_eq!(accepted.nullifiers.len(), 1);
    advance_head(&mut harness.registry, &mut harness.beacons, &accepted).unwrap();

    // The same envelope one block later is a replay.
    let header2 = mine_block(&harness, 11, &body, |h_u| h_u >= 3_200_000);
    let err = verify_block_consensus(&header2, &body, &harness.context()).unwrap_err();
    let reused = accepted.nullifiers[0].id;
    assert_eq!(
        err,
        ConsensusError::NullifierReuse {
            id: reused,
            type_tag: ProofKind::Ai.tag(),
        }
    );

    // Within-block duplication trips the same check, before any draw
    // or score is consulted.
    let envelope = body.proofs[0].clone();
    let dup_body = BlockBody {
        proofs: vec![envelope.clone(), envelope],
        beacon: None,
    };
    let fresh = Harness::new(5_000_000);
    let dup_header = mine_block(&fresh, 10, &dup_body, |_| true);
    assert!(matches!(
        verify_block_consensus(&dup_header, &dup_body, &fresh.context()).unwrap_err(),
        ConsensusError::NullifierReuse { .. }
    ));
}

/// An honest round-0 transcript against the harness's genesis seed.
fn finalized_round(policy: &Policy, prev: Hash32) -> BeaconRecord {
    let reveal_a = Reveal {
        addr: RawBytes::new(b"addr-a".to_vec()),
        salt: Hash32([0x11; 32]),
        payload_hash: Hash32([0x12; 32]),
    };
    let reveal_b = Reveal {
        addr: RawBytes::new(b"addr-b".to_vec()),
        salt: Hash32([0x21; 32]),
        payload_hash: Hash32([0x22; 32]),
    };

    let commits = vec![reveal_a.commitment(), reveal_b.commitment()];
    let commit_root = commit_root(&commits).unwrap();
    let reveals = vec![reveal_a.clone(), reveal_b.clone()];
    let reveal_root = reveal_root(&reveals).unwrap();
    let aggregate = aggregate_hash(&reveals).unwrap();
    let input = vdf_input(&aggregate, &prev);

    let t = 64;
    let vdf = VdfVerifier::from_config(&policy.vdf).unwrap();
    let (y, pi) = vdf.eval(&input, t).unwrap();

    BeaconRecord {
        round_id: 0,
        commit_root,
        commit_leaf_count: commits.len() as u64,
        reveal_root,
        reveals: vec![
            RevealWithProof {
                reveal: reveal_a,
                leaf_index: 0,
                proof: RawBytes::new(commit_proof(&commits, 0).unwrap()),
            },
            RevealWithProof {
                reveal: reveal_b,
                leaf_index: 1,
                proof: RawBytes::new(commit_proof(&commits, 1).unwrap()),
            },
        ],
        aggregate_hash: aggregate,
        vdf_input: input,
        t,
        vdf_y: RawBytes::new(y),
        vdf_pi: RawBytes::new(pi),
        prev_beacon_hash: prev,
    }
}

#[test]
fn beacon_finalization_through_the_facade() {
    let mut harness = Harness::new(5_000_000);
    let policy = harness.policy();
    let finalize_height = RoundSchedule::for_round(&policy.beacon, 0).finalize_height;

    let prev = harness.beacons.prev_hash_for(0).unwrap();
    let record = finalized_round(&policy, prev);
    let body = BlockBody {
        proofs: vec![],
        beacon: Some(record.clone()),
    };

    let header = mine_block(&harness, finalize_height, &body, |h_u| h_u >= 5_000_000);
    let accepted = verify_block_consensus(&header, &body, &harness.context()).unwrap();
    let out = accepted.beacon.unwrap();
    assert_eq!(out.round_id, 0);
    // Both reveals become replay guards.
    assert_eq!(accepted.nullifiers.len(), 2);
    assert!(accepted
        .nullifiers
        .iter()
        .all(|n| n.type_tag == REVEAL_TYPE_TAG));

    advance_head(&mut harness.registry, &mut harness.beacons, &accepted).unwrap();
    assert_eq!(harness.beacons.lagged(1, 1), Some(&out));

    // One flipped byte in π fails the whole block.
    let mut tampered = record;
    let mut pi = tampered.vdf_pi.bytes().to_vec();
    let last = pi.len() - 1;
    pi[last] ^= 1;
    tampered.vdf_pi = RawBytes::new(pi);
    let bad_body = BlockBody {
        proofs: vec![],
        beacon: Some(tampered),
    };
    let fresh = Harness::new(5_000_000);
    let bad_header = mine_block(&fresh, finalize_height, &bad_body, |h_u| h_u >= 5_000_000);
    assert_eq!(
        verify_block_consensus(&bad_header, &bad_body, &fresh.context()).unwrap_err(),
        ConsensusError::Beacon(BeaconError::VdfInvalid)
    );
}

// --- binding and purity checks ---

#[test]
fn validation_is_pure_and_leaves_snapshots_alone() {
    let harness = Harness::new(5_000_000);
    let body = plain_body(&[ProofMetrics::Vdf { seconds: 300_000 }]);
    let header = mine_block(&harness, 3, &body, |h_u| h_u >= 5_000_000);

    let ctx = harness.context();
    let first = verify_block_consensus(&header, &body, &ctx).unwrap();
    let second = verify_block_consensus(&header, &body, &ctx).unwrap();
    assert_eq!(first, second);
    assert!(harness.registry.is_empty());
    assert_eq!(ctx.nullifiers.len(), 0);
}

#[test]
fn header_bindings_are_enforced() {
    let harness = Harness::new(5_000_000);
    let body = plain_body(&[ProofMetrics::Vdf { seconds: 100_000 }]);
    let header = mine_block(&harness, 3, &body, |h_u| h_u >= 5_000_000);

    // Unknown policy root.
    let mut unknown_root = header.clone();
    unknown_root.policy_root = Hash32([0xde; 32]);
    assert!(matches!(
        verify_block_consensus(&unknown_root, &body, &harness.context()).unwrap_err(),
        ConsensusError::Policy(PolicyError::UnknownRoot(_))
    ));

    // Stale threshold claim.
    let mut wrong_theta = header.clone();
    wrong_theta.theta += 1;
    assert!(matches!(
        verify_block_consensus(&wrong_theta, &body, &harness.context()).unwrap_err(),
        ConsensusError::Header(HeaderError::ThetaMismatch { .. })
    ));

    // Wrong epoch index for the height.
    let mut wrong_epoch = header.clone();
    wrong_epoch.epoch_index += 1;
    assert!(matches!(
        verify_block_consensus(&wrong_epoch, &body, &harness.context()).unwrap_err(),
        ConsensusError::Header(HeaderError::EpochMismatch { .. })
    ));

    // Forged nonce breaks the draw binding.
    let mut forged = header.clone();
    forged.nonce += 1;
    assert_eq!(
        verify_block_consensus(&forged, &body, &harness.context()).unwrap_err(),
        ConsensusError::Header(HeaderError::UDrawBindMismatch)
    );

    // Body swap breaks the proofs root.
    let other_body = plain_body(&[ProofMetrics::Vdf { seconds: 100_001 }]);
    assert_eq!(
        verify_block_consensus(&header, &other_body, &harness.context()).unwrap_err(),
        ConsensusError::Header(HeaderError::ProofsRootMismatch)
    );

    // A beacon record the header never referenced.
    let policy = harness.policy();
    let stray_record = finalized_round(&policy, harness.beacons.prev_hash_for(0).unwrap());
    let stray_body = BlockBody {
        proofs: body.proofs.clone(),
        beacon: Some(stray_record),
    };
    assert_eq!(
        verify_block_consensus(&header, &stray_body, &harness.context()).unwrap_err(),
        ConsensusError::Header(HeaderError::BeaconRefMismatch)
    );
}

#[test]
fn shuffled_proof_list_is_rejected() {
    let harness = Harness::new(5_000_000);
    let mut body = plain_body(&[
        ProofMetrics::Ai {
            units: 100,
            traps_ppm: 0,
            qos_ppm: PPM_SCALE,
        },
        ProofMetrics::Vdf { seconds: 100_000 },
    ]);
    let header = mine_block(&harness, 3, &body, |h_u| h_u >= 5_000_000);
    body.proofs.reverse();
    assert!(matches!(
        verify_block_consensus(&header, &body, &harness.context()).unwrap_err(),
        ConsensusError::Proof(ProofError::Schema(_))
    ));
}
