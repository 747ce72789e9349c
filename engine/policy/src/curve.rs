// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use fvm_ipld_encoding::tuple::*;
use serde_repr::{Deserialize_repr, Serialize_repr};

use poies_shared::error::{PolicyError, ScoringError};
use poies_shared::math::{ln_ratio_munats, MuNat, PPM_SCALE};

/// The admissible curve families for mapping a verified metric to a raw
/// μ-nat score. All three are monotone non-decreasing and concave on
/// the admissible domain.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum CurveShape {
    /// `min(clamp, x·scale/10^6 + shift)`; `shift` in μ-nats.
    AffineClamp = 0,
    /// `min(clamp, scale/10^6 · ln(1 + x/shift))`; `shift > 0`.
    Log = 1,
    /// `min(clamp, scale · x / (x + shift))`; `scale` is the μ-nat
    /// asymptote, `shift > 0` the half-saturation point.
    SaturatingRational = 2,
}

/// A curve instance. Field meaning depends on [`CurveShape`]; see the
/// shape variants for units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_tuple, Deserialize_tuple)]
pub struct CurveSpec {
    pub shape: CurveShape,
    pub scale: u64,
    pub shift: u64,
    pub clamp: MuNat,
}

impl CurveSpec {
    pub fn validate(&self) -> Result<(), PolicyError> {
        match self.shape {
            CurveShape::AffineClamp => Ok(()),
            CurveShape::Log | CurveShape::SaturatingRational => {
                if self.shift == 0 {
                    Err(PolicyError::CurveDomain(format!(
                        "{:?} curve requires a positive shift",
                        self.shape
                    )))
                } else {
                    Ok(())
                }
            }
        }
    }

    /// Evaluates the curve at metric `x` with truncating fixed-point
    /// arithmetic. Only fails on domain violations a valid policy rules
    /// out, which is why the error is the fatal overflow signal.
    pub fn evaluate(&self, x: u64) -> Result<MuNat, ScoringError> {
        let psi = match self.shape {
            CurveShape::AffineClamp => {
                let scaled = (x as u128 * self.scale as u128) / PPM_SCALE as u128;
                scaled.saturating_add(self.shift as u128)
            }
            CurveShape::Log => {
                let arg = self.shift.saturating_add(x);
                let ln = ln_ratio_munats(arg, self.shift)
                    .map_err(|_| ScoringError::Overflow("log curve domain"))?;
                (ln as u128 * self.scale as u128) / PPM_SCALE as u128
            }
            CurveShape::SaturatingRational => {
                let num = self.scale as u128 * x as u128;
                let den = x as u128 + self.shift as u128;
                num / den
            }
        };
        Ok(psi.min(self.clamp as u128) as u64)
    }
}
