// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

pub mod error;
pub mod hash;
pub mod kind;
pub mod math;

pub use error::*;
pub use hash::{domain_hash, Hash32};
pub use kind::ProofKind;
pub use math::MuNat;

// Re-exports
pub extern crate fvm_ipld_encoding;
