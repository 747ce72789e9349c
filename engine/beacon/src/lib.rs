// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! The randomness beacon: commit–reveal rounds finalized by a
//! Wesolowski VDF. A round's reveals aggregate into the VDF input, the
//! sequential evaluation binds the output to elapsed delay, and
//! consumers read a lagged round so the last revealer cannot grind the
//! block that finalizes them.

mod aggregate;
mod engine;
mod merkle;
mod reveal;
#[cfg(test)]
mod testutil;
mod vdf;

pub use aggregate::{aggregate_hash, reveal_root, vdf_input};
pub use engine::{verify_finalization, BeaconHistory, BeaconOut, BeaconRecord, RoundSchedule};
pub use merkle::{commit_root, commit_proof, verify_commit_proof, TaggedSha3};
pub use reveal::{reveal_nullifier, Reveal, RevealWithProof};
pub use vdf::VdfVerifier;
