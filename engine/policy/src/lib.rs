// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! The PoIES policy document: weights, curves, caps, escort rules,
//! α-tuner and Θ retarget parameters, beacon geometry, VDF group and
//! nullifier TTLs. A policy is immutable once loaded; its canonical
//! CBOR encoding is content-hashed into the `policy_root` every block
//! header pins.

pub mod constants;
mod curve;
mod doc;
mod policy;
mod store;

pub use curve::{CurveShape, CurveSpec};
pub use policy::{
    AlphaConfig, BeaconConfig, EscortConfig, EscortTier, Policy, ProofBudget, ThetaConfig,
    TierRequirement, TtlConfig, VdfConfig,
};
pub use store::PolicyStore;
