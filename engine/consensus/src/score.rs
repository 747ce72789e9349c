// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use poies_shared::error::ConsensusError;
use poies_shared::math::MuNat;

/// The acceptance predicate: `H(u) + Σψ_eff ≥ Θ`, pure integer
/// arithmetic. Returns the combined score on acceptance.
pub fn check_acceptance(
    h_u: MuNat,
    effective_psi: MuNat,
    theta: MuNat,
) -> Result<MuNat, ConsensusError> {
    let score = h_u.saturating_add(effective_psi);
    if score >= theta {
        Ok(score)
    } else {
        Err(ConsensusError::BelowThreshold { score, theta })
    }
}
