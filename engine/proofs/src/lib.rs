// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Proof plumbing for the acceptance predicate: envelopes and their
//! nullifier binding, verifier dispatch, the metric→ψ adapter, and the
//! caps & escort engine that turns per-proof raw scores into the capped
//! aggregate `Σψ_eff`.

mod adapter;
mod caps;
mod envelope;
mod metrics;
mod verifier;

pub use adapter::psi_raw;
pub use caps::{aggregate, ProofScore, ScoreVector, ScoredProof, TypeScore};
pub use envelope::{proofs_root, ProofEnvelope};
pub use metrics::ProofMetrics;
pub use verifier::{MetricsBody, MetricsBodyVerifier, ProofVerifier, VerifierSet};
