// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use fvm_ipld_encoding::tuple::*;

use poies_policy::Policy;
use poies_shared::error::ProofError;
use poies_shared::kind::ProofKind;

use crate::envelope::ProofEnvelope;
use crate::metrics::ProofMetrics;

/// A deterministic, bounded verifier for one proof kind. Implementations
/// must be pure functions of the envelope; the wall-clock budget is
/// enforced through [`ProofVerifier::deterministic_cost_ms`], a cost
/// model every implementation of the same verifier version must agree
/// on.
pub trait ProofVerifier: Send + Sync {
    fn kind(&self) -> ProofKind;

    /// Modelled verification cost for this envelope in milliseconds.
    fn deterministic_cost_ms(&self, _envelope: &ProofEnvelope) -> u64 {
        0
    }

    fn verify_and_extract(&self, envelope: &ProofEnvelope) -> Result<ProofMetrics, ProofError>;
}

/// Verifier dispatch table, one slot per proof kind.
#[derive(Default)]
pub struct VerifierSet {
    slots: [Option<Box<dyn ProofVerifier>>; 5],
}

impl VerifierSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, verifier: Box<dyn ProofVerifier>) {
        let index = verifier.kind().index();
        self.slots[index] = Some(verifier);
    }

    /// Runs the envelope through budget checks, its verifier, and metric
    /// range validation.
    pub fn verify(
        &self,
        policy: &Policy,
        envelope: &ProofEnvelope,
    ) -> Result<ProofMetrics, ProofError> {
        let kind = envelope.kind()?;
        let budget = policy.budgets[kind];

        let body_len = envelope.body.len() as u64;
        if body_len > budget.max_body_bytes as u64 {
            return Err(ProofError::Budget {
                what: "byte",
                used: body_len,
                limit: budget.max_body_bytes as u64,
            });
        }

        let verifier = self.slots[kind.index()]
            .as_ref()
            .ok_or_else(|| ProofError::Rejected(format!("no verifier registered for {kind}")))?;

        let cost = verifier.deterministic_cost_ms(envelope);
        if cost > budget.max_verify_ms as u64 {
            return Err(ProofError::Budget {
                what: "time",
                used: cost,
                limit: budget.max_verify_ms as u64,
            });
        }

        if envelope.nullifier != envelope.expected_nullifier()? {
            return Err(ProofError::Schema(
                "nullifier does not bind the proof body".into(),
            ));
        }

        let metrics = verifier.verify_and_extract(envelope)?;
        if metrics.kind() != kind {
            return Err(ProofError::Schema(format!(
                "verifier for {kind} returned {} metrics",
                metrics.kind()
            )));
        }
        metrics.validate()?;
        Ok(metrics)
    }
}

/// Wire body understood by [`MetricsBodyVerifier`]: the claimed metrics
/// in canonical CBOR. Field meaning depends on the tag, mirroring the
/// [`ProofMetrics`] variants in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_tuple, Deserialize_tuple)]
pub struct MetricsBody {
    pub type_tag: u8,
    pub m0: u64,
    pub m1: u64,
    pub m2: u64,
}

impl MetricsBody {
    pub fn from_metrics(metrics: &ProofMetrics) -> Self {
        let tag = metrics.kind().tag();
        let (m0, m1, m2) = match *metrics {
            ProofMetrics::Hash { u_draw } => (u_draw, 0, 0),
            ProofMetrics::Ai {
                units,
                traps_ppm,
                qos_ppm,
            } => (units, traps_ppm, qos_ppm),
            ProofMetrics::Quantum { units, traps_ppm } => (units, traps_ppm, 0),
            ProofMetrics::Storage { qos_ppm, redundancy } => (qos_ppm, redundancy, 0),
            ProofMetrics::Vdf { seconds } => (seconds, 0, 0),
        };
        MetricsBody {
            type_tag: tag,
            m0,
            m1,
            m2,
        }
    }

    pub fn into_metrics(self) -> Result<ProofMetrics, ProofError> {
        let kind = ProofKind::from_tag(self.type_tag)
            .ok_or_else(|| ProofError::Schema(format!("unknown type tag {}", self.type_tag)))?;
        Ok(match kind {
            ProofKind::Hash => ProofMetrics::Hash { u_draw: self.m0 },
            ProofKind::Ai => ProofMetrics::Ai {
                units: self.m0,
                traps_ppm: self.m1,
                qos_ppm: self.m2,
            },
            ProofKind::Quantum => ProofMetrics::Quantum {
                units: self.m0,
                traps_ppm: self.m1,
            },
            ProofKind::Storage => ProofMetrics::Storage {
                qos_ppm: self.m0,
                redundancy: self.m1,
            },
            ProofKind::Vdf => ProofMetrics::Vdf { seconds: self.m0 },
        })
    }
}

/// Development verifier: the body is the canonical CBOR of the claimed
/// metrics. Deterministic and bounded, it stands in for the real
/// verifier fleet on devnets and in the consensus test suite.
pub struct MetricsBodyVerifier {
    kind: ProofKind,
}

impl MetricsBodyVerifier {
    pub fn new(kind: ProofKind) -> Self {
        MetricsBodyVerifier { kind }
    }

    /// Builds the envelope a prover would attach for these metrics.
    pub fn envelope_for(metrics: &ProofMetrics) -> Result<ProofEnvelope, ProofError> {
        let body = fvm_ipld_encoding::to_vec(&MetricsBody::from_metrics(metrics))
            .map_err(|e| ProofError::Schema(e.to_string()))?;
        let mut envelope = ProofEnvelope {
            type_tag: metrics.kind().tag(),
            body: body.into(),
            nullifier: poies_shared::hash::Hash32::zero(),
            verifier_version: 1,
        };
        envelope.nullifier = envelope.expected_nullifier()?;
        Ok(envelope)
    }

    /// Registers a dev verifier for every kind.
    pub fn full_set() -> VerifierSet {
        let mut set = VerifierSet::new();
        for kind in poies_shared::kind::ALL_KINDS {
            set.register(Box::new(MetricsBodyVerifier::new(kind)));
        }
        set
    }
}

impl ProofVerifier for MetricsBodyVerifier {
    fn kind(&self) -> ProofKind {
        self.kind
    }

    fn verify_and_extract(&self, envelope: &ProofEnvelope) -> Result<ProofMetrics, ProofError> {
        let body: MetricsBody = fvm_ipld_encoding::from_slice(envelope.body.bytes())
            .map_err(|e| ProofError::Schema(e.to_string()))?;
        if body.type_tag != envelope.type_tag {
            return Err(ProofError::Schema(
                "body tag disagrees with envelope tag".into(),
            ));
        }
        body.into_metrics()
    }
}
