// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use fvm_ipld_encoding::tuple::*;

use poies_beacon::BeaconRecord;
use poies_proofs::ProofEnvelope;
use poies_shared::error::HeaderError;
use poies_shared::hash::{domain_hash, Hash32, TAG_HEADER};
use poies_shared::math::MuNat;

/// The header fields consensus consumes. The nonce and the draw binding
/// are excluded from the mining template; everything else is fixed
/// before the search starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize_tuple, Deserialize_tuple)]
pub struct BlockHeader {
    pub parent_hash: Hash32,
    pub height: u64,
    pub epoch_index: u64,
    pub policy_root: Hash32,
    pub theta: MuNat,
    pub nonce: u64,
    /// `H("poies/u-draw" || template || nonce)`, restated so light
    /// consumers can check the draw without the body.
    pub u_draw_bind: Hash32,
    pub proofs_root: Hash32,
    pub beacon_record_ref: Option<Hash32>,
}

/// The nonce-independent part of the header, hashed into the u-draw.
#[derive(Debug, Clone, PartialEq, Eq, Serialize_tuple, Deserialize_tuple)]
struct HeaderTemplate {
    parent_hash: Hash32,
    height: u64,
    epoch_index: u64,
    policy_root: Hash32,
    theta: MuNat,
    proofs_root: Hash32,
    beacon_record_ref: Option<Hash32>,
}

impl BlockHeader {
    /// Canonical bytes of the mining template.
    pub fn template_bytes(&self) -> Result<Vec<u8>, HeaderError> {
        let template = HeaderTemplate {
            parent_hash: self.parent_hash,
            height: self.height,
            epoch_index: self.epoch_index,
            policy_root: self.policy_root,
            theta: self.theta,
            proofs_root: self.proofs_root,
            beacon_record_ref: self.beacon_record_ref,
        };
        fvm_ipld_encoding::to_vec(&template).map_err(|e| HeaderError::Encoding(e.to_string()))
    }

    pub fn header_hash(&self) -> Result<Hash32, HeaderError> {
        let bytes =
            fvm_ipld_encoding::to_vec(self).map_err(|e| HeaderError::Encoding(e.to_string()))?;
        Ok(domain_hash(TAG_HEADER, &[&bytes]))
    }
}

/// The body parts consensus reads: the proof list (canonically ordered)
/// and, on a finalize height, the beacon transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize_tuple, Deserialize_tuple)]
pub struct BlockBody {
    pub proofs: Vec<ProofEnvelope>,
    pub beacon: Option<BeaconRecord>,
}
