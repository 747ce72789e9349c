// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Wesolowski proof-of-delay verification in an RSA group of unknown
//! order: `y = x^(2^T) mod N`, attested by `π = x^⌊2^T/ℓ⌋` for a
//! hash-derived prime challenge ℓ.

use num_bigint::BigUint;
use num_integer::Integer;
use num_traits::{One, Zero};

use poies_policy::VdfConfig;
use poies_shared::error::BeaconError;
use poies_shared::hash::{domain_hash, Hash32, TAG_RAND_VDF_BASE, TAG_RAND_VDF_CHAL};

/// Fixed Miller-Rabin base set; part of consensus.
const MR_BASES: [u32; 12] = [2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37];

/// Rejection-sampling bound for the prime challenge. The expected
/// number of attempts is ~ln(2^128)/2 ≈ 44; running dry means a broken
/// hash, not bad luck.
const MAX_CHALLENGE_ATTEMPTS: u32 = 4_096;

pub struct VdfVerifier {
    modulus: BigUint,
    modulus_bytes: Vec<u8>,
    /// Wire width of `y` and `π`: `ceil(|N|/8)`.
    width: usize,
    t_min: u64,
    t_max: u64,
}

impl VdfVerifier {
    pub fn from_config(config: &VdfConfig) -> Result<Self, BeaconError> {
        if config.modulus.is_empty() || config.modulus[0] == 0 {
            return Err(BeaconError::Encoding(
                "vdf modulus must be non-empty without leading zeros".into(),
            ));
        }
        let modulus = BigUint::from_bytes_be(&config.modulus);
        if (&modulus % 2u8).is_zero() {
            return Err(BeaconError::Encoding("vdf modulus must be odd".into()));
        }
        Ok(VdfVerifier {
            width: config.modulus.len(),
            modulus_bytes: config.modulus.clone(),
            modulus,
            t_min: config.t_min,
            t_max: config.t_max,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Left-pads a reduced group element to the wire width.
    pub fn to_fixed_width(&self, value: &BigUint) -> Vec<u8> {
        let raw = value.to_bytes_be();
        let mut out = vec![0u8; self.width - raw.len()];
        out.extend_from_slice(&raw);
        out
    }

    fn parse_element(&self, bytes: &[u8], field: &'static str) -> Result<BigUint, BeaconError> {
        if bytes.len() != self.width {
            return Err(BeaconError::Encoding(format!(
                "{field} must be exactly {} bytes, got {}",
                self.width,
                bytes.len()
            )));
        }
        let value = BigUint::from_bytes_be(bytes);
        if value >= self.modulus {
            return Err(BeaconError::Encoding(format!("{field} is not reduced mod N")));
        }
        if value.is_zero() {
            return Err(BeaconError::Encoding(format!("{field} is zero")));
        }
        Ok(value)
    }

    /// `x = hash_to_Zn_star("rand/vdf/base" || X) mod N`. A single
    /// derivation: an uninvertible base fails the round rather than
    /// being resampled, which an adversary cannot steer X into in
    /// practice.
    pub fn derive_base(&self, input: &Hash32) -> Result<BigUint, BeaconError> {
        let mut stream = Vec::with_capacity(self.width + 32);
        let mut counter: u32 = 0;
        while stream.len() < self.width {
            let block = domain_hash(
                TAG_RAND_VDF_BASE,
                &[input.as_bytes(), &counter.to_be_bytes()],
            );
            stream.extend_from_slice(block.as_bytes());
            counter += 1;
        }
        stream.truncate(self.width);
        let x = BigUint::from_bytes_be(&stream) % &self.modulus;
        if x < BigUint::from(2u8) || x.gcd(&self.modulus) != BigUint::one() {
            return Err(BeaconError::BaseNotInvertible);
        }
        Ok(x)
    }

    /// `ℓ = hash_to_prime("rand/vdf/chal" || N || x || y || T)` by
    /// counter-based rejection sampling to 128 bits, top and low bits
    /// forced, fixed-base Miller-Rabin.
    pub fn derive_challenge(
        &self,
        x: &BigUint,
        y: &BigUint,
        t: u64,
    ) -> Result<BigUint, BeaconError> {
        let x_bytes = self.to_fixed_width(x);
        let y_bytes = self.to_fixed_width(y);
        for counter in 0..MAX_CHALLENGE_ATTEMPTS {
            let digest = domain_hash(
                TAG_RAND_VDF_CHAL,
                &[
                    &self.modulus_bytes,
                    &x_bytes,
                    &y_bytes,
                    &t.to_be_bytes(),
                    &counter.to_be_bytes(),
                ],
            );
            let mut candidate = [0u8; 16];
            candidate.copy_from_slice(&digest.as_bytes()[..16]);
            candidate[0] |= 0x80;
            candidate[15] |= 0x01;
            let ell = BigUint::from_bytes_be(&candidate);
            if is_prime(&ell) {
                return Ok(ell);
            }
        }
        Err(BeaconError::Encoding(
            "prime challenge derivation exhausted its attempt bound".into(),
        ))
    }

    /// Verifies `(y, π)` for delay `t` against the derived base.
    pub fn verify(
        &self,
        input: &Hash32,
        t: u64,
        y_bytes: &[u8],
        pi_bytes: &[u8],
    ) -> Result<(), BeaconError> {
        if t < self.t_min || t > self.t_max {
            return Err(BeaconError::Encoding(format!(
                "delay {t} outside [{}, {}]",
                self.t_min, self.t_max
            )));
        }
        let y = self.parse_element(y_bytes, "vdf y")?;
        let pi = self.parse_element(pi_bytes, "vdf pi")?;
        let x = self.derive_base(input)?;

        let ell = self.derive_challenge(&x, &y, t)?;
        // r = 2^T mod ℓ
        let r = BigUint::from(2u8).modpow(&BigUint::from(t), &ell);
        let rhs = (pi.modpow(&ell, &self.modulus) * x.modpow(&r, &self.modulus)) % &self.modulus;
        if y == rhs {
            Ok(())
        } else {
            Err(BeaconError::VdfInvalid)
        }
    }

    /// Sequential evaluation and proof: `T` squarings for `y`, plus the
    /// long-division pass for `π`. Prover-side only (fixtures, devnet
    /// round drivers); validation never calls this.
    pub fn eval(&self, input: &Hash32, t: u64) -> Result<(Vec<u8>, Vec<u8>), BeaconError> {
        let x = self.derive_base(input)?;
        let mut y = x.clone();
        for _ in 0..t {
            y = (&y * &y) % &self.modulus;
        }
        let ell = self.derive_challenge(&x, &y, t)?;

        // π = x^⌊2^T/ℓ⌋ without materializing 2^T: carry the remainder
        // of the division digit by digit.
        let mut pi = BigUint::one();
        let mut rem = BigUint::one();
        for _ in 0..t {
            pi = (&pi * &pi) % &self.modulus;
            rem <<= 1;
            if rem >= ell {
                rem -= &ell;
                pi = (pi * &x) % &self.modulus;
            }
        }
        Ok((self.to_fixed_width(&y), self.to_fixed_width(&pi)))
    }
}

/// Deterministic Miller-Rabin over the fixed base set.
fn is_prime(n: &BigUint) -> bool {
    let one = BigUint::one();
    if *n < BigUint::from(2u8) {
        return false;
    }
    for base in MR_BASES {
        let small = BigUint::from(base);
        if *n == small {
            return true;
        }
        if (n % &small).is_zero() {
            return false;
        }
    }
    let n_minus_one = n - &one;
    let s = n_minus_one.trailing_zeros().unwrap_or(0);
    let d = &n_minus_one >> s;
    'bases: for base in MR_BASES {
        let mut x = BigUint::from(base).modpow(&d, n);
        if x == one || x == n_minus_one {
            continue;
        }
        for _ in 1..s {
            x = (&x * &x) % n;
            if x == n_minus_one {
                continue 'bases;
            }
        }
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::testutil::{test_config, TEST_MODULUS_HEX};

    use super::*;

    #[test]
    fn eval_then_verify_roundtrip() {
        let vdf = VdfVerifier::from_config(&test_config()).unwrap();
        let input = Hash32([7; 32]);
        for t in [1u64, 2, 17, 64, 257] {
            let (y, pi) = vdf.eval(&input, t).unwrap();
            assert_eq!(y.len(), vdf.width());
            assert_eq!(pi.len(), vdf.width());
            vdf.verify(&input, t, &y, &pi).unwrap();
        }
    }

    #[test]
    fn corrupted_proof_fails() {
        let vdf = VdfVerifier::from_config(&test_config()).unwrap();
        let input = Hash32([9; 32]);
        let (y, pi) = vdf.eval(&input, 64).unwrap();

        let mut bad_pi = pi.clone();
        bad_pi[vdf.width() - 1] ^= 1;
        assert_eq!(
            vdf.verify(&input, 64, &y, &bad_pi).unwrap_err(),
            BeaconError::VdfInvalid
        );

        let mut bad_y = y.clone();
        bad_y[vdf.width() - 1] ^= 1;
        assert_eq!(
            vdf.verify(&input, 64, &bad_y, &pi).unwrap_err(),
            BeaconError::VdfInvalid
        );

        // Wrong delay claim also fails.
        assert_eq!(
            vdf.verify(&input, 65, &y, &pi).unwrap_err(),
            BeaconError::VdfInvalid
        );
    }

    #[test]
    fn delay_bounds_are_enforced() {
        let vdf = VdfVerifier::from_config(&test_config()).unwrap();
        let input = Hash32([1; 32]);
        let (y, pi) = vdf.eval(&input, 8).unwrap();
        assert!(matches!(
            vdf.verify(&input, 0, &y, &pi),
            Err(BeaconError::Encoding(_))
        ));
        assert!(matches!(
            vdf.verify(&input, (1 << 20) + 1, &y, &pi),
            Err(BeaconError::Encoding(_))
        ));
    }

    #[test]
    fn unreduced_or_missized_elements_are_rejected() {
        let vdf = VdfVerifier::from_config(&test_config()).unwrap();
        let input = Hash32([2; 32]);
        let (y, pi) = vdf.eval(&input, 8).unwrap();

        // Too short.
        assert!(matches!(
            vdf.verify(&input, 8, &y[1..], &pi),
            Err(BeaconError::Encoding(_))
        ));

        // Not reduced: the modulus itself.
        let unreduced = hex::decode(TEST_MODULUS_HEX).unwrap();
        assert!(matches!(
            vdf.verify(&input, 8, &unreduced, &pi),
            Err(BeaconError::Encoding(_))
        ));

        // Zero element.
        let zero = vec![0u8; vdf.width()];
        assert!(matches!(
            vdf.verify(&input, 8, &zero, &pi),
            Err(BeaconError::Encoding(_))
        ));
    }

    #[test]
    fn base_derivation_is_stable_and_bound_to_input() {
        let vdf = VdfVerifier::from_config(&test_config()).unwrap();
        let a = vdf.derive_base(&Hash32([3; 32])).unwrap();
        let b = vdf.derive_base(&Hash32([3; 32])).unwrap();
        let c = vdf.derive_base(&Hash32([4; 32])).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn challenge_is_an_odd_128_bit_prime() {
        let vdf = VdfVerifier::from_config(&test_config()).unwrap();
        let x = vdf.derive_base(&Hash32([5; 32])).unwrap();
        let y = BigUint::from(12345u32);
        let ell = vdf.derive_challenge(&x, &y, 99).unwrap();
        assert_eq!(ell.bits(), 128);
        assert!(ell.bit(0));
        assert!(is_prime(&ell));
    }

    #[test]
    fn small_prime_classifier_agrees_with_known_values() {
        for prime in [2u32, 3, 5, 97, 7919] {
            assert!(is_prime(&BigUint::from(prime)), "{prime} is prime");
        }
        for composite in [1u32, 4, 9, 91, 7917, 561, 41041] {
            // 561 and 41041 are Carmichael numbers.
            assert!(!is_prime(&BigUint::from(composite)), "{composite} is composite");
        }
    }
}
