// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Block-level consensus decisions for PoIES: the u-draw, the
//! acceptance predicate `H(u) + Σψ_eff ≥ Θ`, epoch retargeting of Θ and
//! the per-type α multipliers, the nullifier registry, and the
//! validation façade that ties them to the proof and beacon engines.

mod alpha;
mod epoch;
mod header;
mod nullifier;
mod retarget;
mod score;
mod u_draw;
mod validate;

#[cfg(test)]
mod tests;

pub use alpha::{retarget_alpha, AlphaState};
pub use epoch::{epoch_of_height, retarget_epoch, BlockStats, EpochState, EpochStore};
pub use header::{BlockBody, BlockHeader};
pub use nullifier::{
    NullifierRecord, NullifierRegistry, NullifierSnapshot, REVEAL_TYPE_TAG,
};
pub use retarget::{retarget_theta, ThetaState};
pub use score::check_acceptance;
pub use u_draw::{compute_u_draw, draw_munats, UDraw};
pub use validate::{
    advance_head, verify_block_consensus, AcceptedBlock, PendingNullifier, ValidationContext,
};
