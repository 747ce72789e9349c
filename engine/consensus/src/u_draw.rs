// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use byteorder::{BigEndian, ByteOrder};

use poies_shared::hash::{domain_hash, Hash32, TAG_U_DRAW};
use poies_shared::math::{neg_ln_frac_q64, MuNat};

/// A block's hash draw: the binding hash and the Q64 fraction read from
/// its first eight bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UDraw {
    pub bind: Hash32,
    /// `u = raw / 2^64`; zero stands in for the smallest positive unit.
    pub raw: u64,
}

/// Recomputes the draw for a mining template and nonce.
pub fn compute_u_draw(template_bytes: &[u8], nonce: u64) -> UDraw {
    let bind = domain_hash(TAG_U_DRAW, &[template_bytes, &nonce.to_be_bytes()]);
    let raw = BigEndian::read_u64(&bind.0[..8]);
    UDraw { bind, raw }
}

/// `H(u) = -ln(u)` in μ-nats.
pub fn draw_munats(raw: u64) -> MuNat {
    neg_ln_frac_q64(raw)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn pinned_draw_vector() {
        let draw = compute_u_draw(b"header-template", 42);
        assert_eq!(
            hex::encode(draw.bind.0),
            "08a10af8c3a3f479a5e002f49991067f48f55f347b8e8492b42e33f80082e423"
        );
        assert_eq!(draw.raw, 621_790_287_104_308_345);
        assert_eq!(draw_munats(draw.raw), 3_390_040);
    }

    #[test]
    fn nonce_changes_the_draw() {
        let a = compute_u_draw(b"header-template", 42);
        let b = compute_u_draw(b"header-template", 43);
        assert_ne!(a.bind, b.bind);
        assert_eq!(b.raw, 3_841_991_452_581_638_958);
        assert_eq!(draw_munats(b.raw), 1_568_897);
    }

    #[test]
    fn draw_is_deterministic() {
        let a = compute_u_draw(b"tpl", 7);
        let b = compute_u_draw(b"tpl", 7);
        assert_eq!(a, b);
    }
}
