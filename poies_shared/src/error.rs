// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Consensus rejection taxonomy.
//!
//! Every failure surfaces to the block validator as a [`ConsensusError`]
//! with a stable machine-readable `kind()` tag; free-form messages are
//! for operators only and never affect consensus. Nothing here is
//! recovered locally; a failed block is rejected atomically.

use thiserror::Error;

use crate::hash::Hash32;

/// Errors raised while loading or pinning a policy.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("malformed policy: {0}")]
    Malformed(String),
    #[error("global cap {gamma} μnats reaches the threshold floor {theta_min} (margin {margin})")]
    GammaAboveThetaMin {
        gamma: u64,
        theta_min: u64,
        margin: u64,
    },
    #[error("unknown proof kind tag {0}")]
    UnknownKind(u8),
    #[error("curve outside admissible domain: {0}")]
    CurveDomain(String),
    #[error("policy root {0} is neither active nor grandfathered")]
    UnknownRoot(Hash32),
    #[error("policy pins a different ln table digest")]
    LnTableMismatch,
}

impl PolicyError {
    pub fn kind(&self) -> &'static str {
        match self {
            PolicyError::Malformed(_) => "policy/malformed",
            PolicyError::GammaAboveThetaMin { .. } => "policy/gamma-above-theta-min",
            PolicyError::UnknownKind(_) => "policy/unknown-kind",
            PolicyError::CurveDomain(_) => "policy/curve-domain",
            PolicyError::UnknownRoot(_) => "policy/unknown-root",
            PolicyError::LnTableMismatch => "policy/ln-table-mismatch",
        }
    }
}

/// Errors raised while verifying a single proof envelope.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProofError {
    #[error("proof exceeds its {what} budget: {used} > {limit}")]
    Budget {
        what: &'static str,
        used: u64,
        limit: u64,
    },
    #[error("proof envelope schema invalid: {0}")]
    Schema(String),
    #[error("verifier rejected proof: {0}")]
    Rejected(String),
    #[error("proof metric out of range: {0}")]
    MetricRange(String),
}

impl ProofError {
    pub fn kind(&self) -> &'static str {
        match self {
            ProofError::Budget { .. } => "proof/budget",
            ProofError::Schema(_) => "proof/schema",
            ProofError::Rejected(_) => "proof/rejected",
            ProofError::MetricRange(_) => "proof/metric-range",
        }
    }
}

/// Arithmetic overflow inside scoring. Unreachable under a valid policy;
/// callers must treat it as a fatal bug signal, not a routine rejection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScoringError {
    #[error("μ-nat arithmetic overflow in {0}")]
    Overflow(&'static str),
}

impl ScoringError {
    pub fn kind(&self) -> &'static str {
        match self {
            ScoringError::Overflow(_) => "scoring/overflow",
        }
    }
}

/// Errors raised while verifying a beacon finalization.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BeaconError {
    #[error("reveal merkle proof does not bind to the commit root")]
    MerkleProof,
    #[error("recomputed {0} root/hash does not match the record")]
    AggregateMismatch(&'static str),
    #[error("recomputed vdf input does not match the record")]
    InputMismatch,
    #[error("wesolowski verification failed")]
    VdfInvalid,
    #[error("round {round} not finalizable at height {height}")]
    OutsideWindow { round: u64, height: u64 },
    #[error("derived vdf base is not invertible mod N")]
    BaseNotInvertible,
    #[error("beacon record does not chain from the previous output")]
    ChainMismatch,
    #[error("beacon field encoding invalid: {0}")]
    Encoding(String),
}

impl BeaconError {
    pub fn kind(&self) -> &'static str {
        match self {
            BeaconError::MerkleProof => "beacon/merkle-proof",
            BeaconError::AggregateMismatch(_) => "beacon/aggregate-mismatch",
            BeaconError::InputMismatch => "beacon/input-mismatch",
            BeaconError::VdfInvalid => "beacon/vdf-invalid",
            BeaconError::OutsideWindow { .. } => "beacon/outside-window",
            BeaconError::BaseNotInvertible => "beacon/base-not-invertible",
            BeaconError::ChainMismatch => "beacon/chain-mismatch",
            BeaconError::Encoding(_) => "beacon/encoding",
        }
    }
}

/// Errors raised by the epoch retargeter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RetargetError {
    #[error("observed inter-block interval is not positive: {0}")]
    NonPositiveInterval(i64),
    #[error("fixed-point domain error in retarget")]
    FixedPointDomain,
}

impl RetargetError {
    pub fn kind(&self) -> &'static str {
        match self {
            RetargetError::NonPositiveInterval(_) => "retarget/non-positive-interval",
            RetargetError::FixedPointDomain => "retarget/fixed-point-domain",
        }
    }
}

impl From<FixedPointError> for RetargetError {
    fn from(_: FixedPointError) -> Self {
        RetargetError::FixedPointDomain
    }
}

/// Header fields that fail their binding checks.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HeaderError {
    #[error("header u-draw binding does not match the recomputed draw")]
    UDrawBindMismatch,
    #[error("header proofs root does not match the body")]
    ProofsRootMismatch,
    #[error("header theta {header} does not match the epoch threshold {expected}")]
    ThetaMismatch { header: u64, expected: u64 },
    #[error("header epoch {header} does not match the height-derived epoch {expected}")]
    EpochMismatch { header: u64, expected: u64 },
    #[error("header beacon reference does not match the body record")]
    BeaconRefMismatch,
    #[error("header encoding invalid: {0}")]
    Encoding(String),
}

impl HeaderError {
    pub fn kind(&self) -> &'static str {
        match self {
            HeaderError::UDrawBindMismatch => "header/u-draw-bind",
            HeaderError::ProofsRootMismatch => "header/proofs-root",
            HeaderError::ThetaMismatch { .. } => "header/theta",
            HeaderError::EpochMismatch { .. } => "header/epoch",
            HeaderError::BeaconRefMismatch => "header/beacon-ref",
            HeaderError::Encoding(_) => "header/encoding",
        }
    }
}

/// Domain violations inside the fixed-point math (zero or negative input
/// to a logarithm).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixedPointError {
    #[error("logarithm of a non-positive quantity")]
    NonPositive,
}

/// The top-level rejection reason returned by `verify_block_consensus`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConsensusError {
    #[error(transparent)]
    Policy(#[from] PolicyError),
    #[error(transparent)]
    Proof(#[from] ProofError),
    #[error(transparent)]
    Header(#[from] HeaderError),
    #[error("nullifier {id} (kind tag {type_tag}) already seen within ttl")]
    NullifierReuse { id: Hash32, type_tag: u8 },
    #[error(transparent)]
    Scoring(#[from] ScoringError),
    #[error("score {score} μnats below threshold {theta}")]
    BelowThreshold { score: u64, theta: u64 },
    #[error(transparent)]
    Beacon(#[from] BeaconError),
    #[error(transparent)]
    Retarget(#[from] RetargetError),
}

impl ConsensusError {
    /// Stable tag for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ConsensusError::Policy(e) => e.kind(),
            ConsensusError::Proof(e) => e.kind(),
            ConsensusError::Header(e) => e.kind(),
            ConsensusError::NullifierReuse { .. } => "nullifier/reuse",
            ConsensusError::Scoring(e) => e.kind(),
            ConsensusError::BelowThreshold { .. } => "score/below-threshold",
            ConsensusError::Beacon(e) => e.kind(),
            ConsensusError::Retarget(e) => e.kind(),
        }
    }

    /// Whether this rejection signals an implementation or policy bug
    /// rather than a bad block.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ConsensusError::Scoring(ScoringError::Overflow(_)))
    }
}
