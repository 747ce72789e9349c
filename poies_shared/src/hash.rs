// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::fmt;

use serde::de::{Deserializer, Visitor};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};

/// Domain separation tags. Every hash computed anywhere in the engine
/// prepends exactly one of these ASCII strings; untagged hashing is not
/// exported.
pub const TAG_RAND_COMMIT: &str = "rand/commit";
pub const TAG_RAND_AGGREGATE: &str = "rand/aggregate";
pub const TAG_RAND_VDF_INPUT: &str = "rand/vdf-input";
pub const TAG_RAND_VDF_BASE: &str = "rand/vdf/base";
pub const TAG_RAND_VDF_CHAL: &str = "rand/vdf/chal";
/// Interior nodes of the beacon commit tree. Leaves are the commit
/// hashes themselves, which already carry `rand/commit`.
pub const TAG_RAND_MERKLE_NODE: &str = "rand/merkle-node";
/// Finalized beacon output, chained into the next round's VDF input.
pub const TAG_RAND_BEACON_OUT: &str = "rand/beacon-out";
pub const TAG_U_DRAW: &str = "poies/u-draw";
pub const TAG_POLICY_ROOT: &str = "poies/policy-root";
pub const TAG_PROOFS_ROOT: &str = "poies/proofs-root";
/// Tiebreak hash for the canonical proof order within a block.
pub const TAG_PROOF_BODY: &str = "poies/proof-body";
pub const TAG_LN_TABLE: &str = "poies/ln-table";
pub const TAG_HEADER: &str = "poies/header";
pub const TAG_BEACON_RECORD: &str = "poies/beacon-record";
/// Per-type nullifier tags are `poies/nullifier/<type>`; see
/// [`crate::kind::ProofKind::nullifier_tag`]. Beacon reveals use the
/// `reveal` suffix.
pub const NULLIFIER_TAG_PREFIX: &str = "poies/nullifier/";
pub const TAG_NULLIFIER_REVEAL: &str = "poies/nullifier/reveal";

/// A 32-byte SHA3-256 output. Serializes as a strict CBOR byte string of
/// length 32.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Hash32(pub [u8; 32]);

impl Hash32 {
    pub const LEN: usize = 32;

    pub const fn zero() -> Self {
        Hash32([0u8; 32])
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let arr: [u8; 32] = bytes.try_into().ok()?;
        Some(Hash32(arr))
    }
}

impl From<[u8; 32]> for Hash32 {
    fn from(arr: [u8; 32]) -> Self {
        Hash32(arr)
    }
}

impl AsRef<[u8]> for Hash32 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Hash32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Hash32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash32({})", hex::encode(self.0))
    }
}

impl Serialize for Hash32 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(&self.0)
    }
}

struct Hash32Visitor;

impl<'de> Visitor<'de> for Hash32Visitor {
    type Value = Hash32;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a byte string of length 32")
    }

    fn visit_bytes<E: serde::de::Error>(self, v: &[u8]) -> Result<Hash32, E> {
        Hash32::from_slice(v).ok_or_else(|| E::custom(format!("expected 32 bytes, got {}", v.len())))
    }
}

impl<'de> Deserialize<'de> for Hash32 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Hash32, D::Error> {
        deserializer.deserialize_bytes(Hash32Visitor)
    }
}

/// Hashes `parts` in order under the given domain tag.
pub fn domain_hash(tag: &str, parts: &[&[u8]]) -> Hash32 {
    let mut hasher = Sha3_256::new();
    hasher.update(tag.as_bytes());
    for part in parts {
        hasher.update(part);
    }
    Hash32(hasher.finalize().into())
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn tagged_hash_vectors() {
        let h = domain_hash(TAG_U_DRAW, &[b"header-template", &42u64.to_be_bytes()]);
        assert_eq!(
            h.0,
            hex!("08a10af8c3a3f479a5e002f49991067f48f55f347b8e8492b42e33f80082e423")
        );

        let h = domain_hash(TAG_RAND_COMMIT, &[b"addr-a", b"salt-a", &[0xab; 32]]);
        assert_eq!(
            h.0,
            hex!("9a87b41d52d353411829dc4a2f6b428b5f6ef7d9ea5fefd7726ce5018ff9342b")
        );
    }

    #[test]
    fn tag_changes_output() {
        let a = domain_hash(TAG_RAND_COMMIT, &[b"payload"]);
        let b = domain_hash(TAG_RAND_AGGREGATE, &[b"payload"]);
        assert_ne!(a, b);
    }

    #[test]
    fn split_points_do_not_matter() {
        // The tag is the only framing; parts are absorbed as one stream.
        let a = domain_hash(TAG_RAND_COMMIT, &[b"ab", b"cd"]);
        let b = domain_hash(TAG_RAND_COMMIT, &[b"abcd"]);
        assert_eq!(a, b);
    }

    #[test]
    fn hash32_cbor_roundtrip() {
        let h = domain_hash(TAG_HEADER, &[b"x"]);
        let bytes = fvm_ipld_encoding::to_vec(&h).unwrap();
        // major type 2 (byte string), length 32, then the digest
        assert_eq!(bytes[0], 0x58);
        assert_eq!(bytes[1], 32);
        let back: Hash32 = fvm_ipld_encoding::from_slice(&bytes).unwrap();
        assert_eq!(h, back);
    }

    #[test]
    fn hash32_rejects_wrong_length() {
        assert!(Hash32::from_slice(&[0u8; 31]).is_none());
        assert!(Hash32::from_slice(&[0u8; 33]).is_none());
    }
}
