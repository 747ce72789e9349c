// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! μ-nat fixed-point arithmetic for the acceptance predicate.
//!
//! All consensus quantities (ψ, Θ, H(u)) are unsigned 64-bit μ-nats
//! (1 nat = 10^6 μ-nats). Acceptance itself is integer add/compare; the
//! logarithms below exist for the u-draw mapping and threshold
//! retargeting. Every operation truncates toward zero and is bit-exact
//! for identical inputs on every platform.

use lazy_static::lazy_static;

use crate::error::FixedPointError;
use crate::hash::{domain_hash, Hash32, TAG_LN_TABLE};

/// Consensus fixed-point quantum: 10^-6 of a natural-logarithm unit.
pub type MuNat = u64;

pub const MUNATS_PER_NAT: u64 = 1_000_000;

/// Parts-per-million scale used for ratios, weights and multipliers.
pub const PPM_SCALE: u64 = 1_000_000;

/// `floor(ln(2) * 2^32)`.
pub const LN2_Q32: u64 = 2_977_044_471;

/// `floor(ln(1 + 2^-j) * 2^32)` for `j = 1..=32`. Together with
/// [`LN2_Q32`] this is the published ln table; its digest is pinned in
/// the policy root.
pub const LN_TABLE_Q32: [u64; 32] = [
    1_741_459_378, // ln(1 + 2^-1)
    958_394_255,   // ln(1 + 2^-2)
    505_874_286,   // ln(1 + 2^-3)
    260_380_768,   // ln(1 + 2^-4)
    132_163_267,   // ln(1 + 2^-5)
    66_589_974,    // ln(1 + 2^-6)
    33_424_038,    // ln(1 + 2^-7)
    16_744_533,    // ln(1 + 2^-8)
    8_380_426,     // ln(1 + 2^-9)
    4_192_257,     // ln(1 + 2^-10)
    2_096_640,     // ln(1 + 2^-11)
    1_048_448,     // ln(1 + 2^-12)
    524_256,       // ln(1 + 2^-13)
    262_136,       // ln(1 + 2^-14)
    131_070,       // ln(1 + 2^-15)
    65_535,        // ln(1 + 2^-16)
    32_767,        // ln(1 + 2^-17)
    16_383,        // ln(1 + 2^-18)
    8_191,         // ln(1 + 2^-19)
    4_095,         // ln(1 + 2^-20)
    2_047,         // ln(1 + 2^-21)
    1_023,         // ln(1 + 2^-22)
    511,           // ln(1 + 2^-23)
    255,           // ln(1 + 2^-24)
    127,           // ln(1 + 2^-25)
    63,            // ln(1 + 2^-26)
    31,            // ln(1 + 2^-27)
    15,            // ln(1 + 2^-28)
    7,             // ln(1 + 2^-29)
    3,             // ln(1 + 2^-30)
    1,             // ln(1 + 2^-31)
    0,             // ln(1 + 2^-32)
];

/// `-ln(u)` for the smallest representable draw (`U = 1`, i.e. 64·ln 2).
pub const MAX_DRAW_MUNATS: MuNat = 44_361_419;

lazy_static! {
    /// Digest of the ln table (LN2 then the 32 entries, big-endian u64
    /// concatenation) under `poies/ln-table`. Policies pin this value.
    pub static ref LN_TABLE_DIGEST: Hash32 = {
        let mut bytes = Vec::with_capacity(8 * 33);
        bytes.extend_from_slice(&LN2_Q32.to_be_bytes());
        for entry in LN_TABLE_Q32 {
            bytes.extend_from_slice(&entry.to_be_bytes());
        }
        domain_hash(TAG_LN_TABLE, &[&bytes])
    };
}

/// `ln(m / 2^63)` in Q32 nats for a mantissa `m` in `[2^63, 2^64)`.
///
/// Greedy product decomposition over the `(1 + 2^-j)` factors followed
/// by a linear remainder term. The result never exceeds [`LN2_Q32`].
fn ln_frac_q32(m: u64) -> u64 {
    debug_assert!(m >= 1 << 63);
    let m = m as u128;
    let mut p: u128 = 1 << 63;
    let mut acc: u64 = 0;
    for (i, entry) in LN_TABLE_Q32.iter().enumerate() {
        if *entry == 0 {
            continue;
        }
        let j = (i + 1) as u32;
        loop {
            let cand = p + (p >> j);
            if cand <= m {
                p = cand;
                acc += entry;
            } else {
                break;
            }
        }
    }
    let rem = (((m - p) << 32) / p) as u64;
    acc + rem
}

/// `ln(x)` in Q32 nats for `x >= 1`.
fn ln_int_q32(x: u64) -> u64 {
    debug_assert!(x >= 1);
    let bits = 64 - x.leading_zeros();
    let m = x << (64 - bits);
    (bits as u64 - 1) * LN2_Q32 + ln_frac_q32(m)
}

/// `-ln(u)` in μ-nats for `u = U / 2^64`.
///
/// `U = 0` is treated as the smallest positive unit, so the result is
/// bounded by [`MAX_DRAW_MUNATS`] and never overflows.
pub fn neg_ln_frac_q64(raw: u64) -> MuNat {
    let u = if raw == 0 { 1 } else { raw };
    let bits = 64 - u.leading_zeros();
    let shift = (64 - bits) as u64;
    let m = u << (shift as u32);
    let ln_m = ln_frac_q32(m);
    let total_q32 = (shift + 1) * LN2_Q32 - ln_m;
    ((total_q32 as u128 * MUNATS_PER_NAT as u128) >> 32) as u64
}

/// `ln(a / b)` in signed μ-nats for positive integers, truncated toward
/// zero. The retargeter and the log curve are the only consumers.
pub fn ln_ratio_munats(a: u64, b: u64) -> Result<i64, FixedPointError> {
    if a == 0 || b == 0 {
        return Err(FixedPointError::NonPositive);
    }
    let diff = ln_int_q32(a) as i128 - ln_int_q32(b) as i128;
    // i128 division truncates toward zero, matching the global rounding
    // rule for signed quantities.
    Ok((diff * MUNATS_PER_NAT as i128 / (1i128 << 32)) as i64)
}

/// `e^-x` in parts-per-million for `x` in μ-nats. Telemetry and test
/// support only; never on the acceptance path.
pub fn exp_neg_ppm(x_munats: MuNat) -> u64 {
    let x_q32 = (x_munats as u128 * (1u128 << 32)) / MUNATS_PER_NAT as u128;
    let k = (x_q32 / LN2_Q32 as u128) as u64;
    if k >= 32 {
        return 0;
    }
    let r = (x_q32 % LN2_Q32 as u128) as u64;
    // e^-x = e^(ln2 - r) / 2^(k+1); the positive exponent keeps the
    // running product inside (1, 2] in Q63.
    let s = LN2_Q32 - r;
    let mut p: u128 = 1 << 63;
    let mut acc: u64 = 0;
    for (i, entry) in LN_TABLE_Q32.iter().enumerate() {
        if *entry == 0 {
            continue;
        }
        let j = (i + 1) as u32;
        while acc + entry <= s {
            acc += entry;
            p += p >> j;
        }
    }
    let dr = (s - acc) as u128;
    p += (p * dr) >> 32;
    ((p * MUNATS_PER_NAT as u128) >> (64 + k as u32)) as u64
}

/// Multiplies a μ-nat amount by a ppm factor, truncating. Saturates at
/// `u64::MAX`; downstream caps bound every consensus value long before
/// that.
pub fn mul_ppm(x: MuNat, ppm: u64) -> MuNat {
    let product = (x as u128 * ppm as u128) / PPM_SCALE as u128;
    product.min(u64::MAX as u128) as u64
}

/// The share `num / den` expressed in ppm, clamped to `PPM_SCALE`.
pub fn ratio_ppm(num: u128, den: u128) -> u64 {
    if den == 0 {
        return 0;
    }
    let ppm = num.saturating_mul(PPM_SCALE as u128) / den;
    ppm.min(PPM_SCALE as u128) as u64
}

pub fn clamp_munat(x: MuNat, lo: MuNat, hi: MuNat) -> MuNat {
    x.clamp(lo, hi)
}
