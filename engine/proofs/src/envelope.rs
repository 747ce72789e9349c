// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use fvm_ipld_encoding::tuple::*;
use fvm_ipld_encoding::RawBytes;

use poies_shared::error::ProofError;
use poies_shared::hash::{domain_hash, Hash32, TAG_PROOFS_ROOT, TAG_PROOF_BODY};
use poies_shared::kind::ProofKind;

/// Wire form of a single proof attached to a block body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize_tuple, Deserialize_tuple)]
pub struct ProofEnvelope {
    pub type_tag: u8,
    /// Opaque verifier payload, bounded by the per-kind byte budget.
    pub body: RawBytes,
    /// Domain-separated replay guard; must equal
    /// [`ProofEnvelope::expected_nullifier`].
    pub nullifier: Hash32,
    pub verifier_version: u32,
}

impl ProofEnvelope {
    pub fn kind(&self) -> Result<ProofKind, ProofError> {
        ProofKind::from_tag(self.type_tag)
            .ok_or_else(|| ProofError::Schema(format!("unknown type tag {}", self.type_tag)))
    }

    /// The nullifier this envelope must carry:
    /// `H("poies/nullifier/<type>" || body)`.
    pub fn expected_nullifier(&self) -> Result<Hash32, ProofError> {
        Ok(domain_hash(self.kind()?.nullifier_tag(), &[self.body.bytes()]))
    }

    /// Tiebreak key for the canonical proof order within a block.
    pub fn order_key(&self) -> Hash32 {
        domain_hash(TAG_PROOF_BODY, &[self.body.bytes()])
    }

    /// Whether `envelopes` is in canonical order: type tag ascending,
    /// then body hash ascending.
    pub fn is_canonical_order(envelopes: &[ProofEnvelope]) -> bool {
        envelopes
            .windows(2)
            .all(|w| (w[0].type_tag, w[0].order_key()) <= (w[1].type_tag, w[1].order_key()))
    }
}

/// Commitment to a block's proof list, pinned in the header. The list
/// must already be canonical; callers enforce the ordering separately so
/// a shuffled body surfaces as an ordering error, not a root mismatch.
pub fn proofs_root(envelopes: &[ProofEnvelope]) -> Result<Hash32, ProofError> {
    let bytes =
        fvm_ipld_encoding::to_vec(&envelopes).map_err(|e| ProofError::Schema(e.to_string()))?;
    Ok(domain_hash(TAG_PROOFS_ROOT, &[&bytes]))
}
