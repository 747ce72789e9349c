// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use poies_shared::error::ProofError;
use poies_shared::kind::ProofKind;
use poies_shared::math::PPM_SCALE;

/// Verified measurements extracted from a proof. Ratios are ppm and must
/// lie in `[0, 10^6]`; magnitudes are unbounded here and shaped by the
/// policy curves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProofMetrics {
    /// A secondary hash-share draw, as a Q64 fraction like the block
    /// draw itself.
    Hash { u_draw: u64 },
    Ai {
        units: u64,
        traps_ppm: u64,
        qos_ppm: u64,
    },
    Quantum { units: u64, traps_ppm: u64 },
    Storage { qos_ppm: u64, redundancy: u64 },
    Vdf { seconds: u64 },
}

impl ProofMetrics {
    pub fn kind(&self) -> ProofKind {
        match self {
            ProofMetrics::Hash { .. } => ProofKind::Hash,
            ProofMetrics::Ai { .. } => ProofKind::Ai,
            ProofMetrics::Quantum { .. } => ProofKind::Quantum,
            ProofMetrics::Storage { .. } => ProofKind::Storage,
            ProofMetrics::Vdf { .. } => ProofKind::Vdf,
        }
    }

    pub fn validate(&self) -> Result<(), ProofError> {
        let check_ppm = |name: &str, value: u64| {
            if value > PPM_SCALE {
                Err(ProofError::MetricRange(format!(
                    "{name} ratio {value} exceeds unity"
                )))
            } else {
                Ok(())
            }
        };
        match self {
            ProofMetrics::Hash { .. } | ProofMetrics::Vdf { .. } => Ok(()),
            ProofMetrics::Ai {
                traps_ppm, qos_ppm, ..
            } => {
                check_ppm("traps", *traps_ppm)?;
                check_ppm("qos", *qos_ppm)
            }
            ProofMetrics::Quantum { traps_ppm, .. } => check_ppm("traps", *traps_ppm),
            ProofMetrics::Storage { qos_ppm, .. } => check_ppm("qos", *qos_ppm),
        }
    }
}
