// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::collections::BTreeMap;
use std::sync::Arc;

use fvm_ipld_encoding::tuple::*;

use poies_shared::hash::Hash32;

/// Registry tag byte for beacon reveal nullifiers, outside the proof
/// kind range.
pub const REVEAL_TYPE_TAG: u8 = 0xff;

/// One anti-replay record, keyed by its 32-byte id in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_tuple, Deserialize_tuple)]
pub struct NullifierRecord {
    pub type_tag: u8,
    pub first_seen_height: u64,
    pub expires_at_height: u64,
}

/// Insert-once set with per-type TTL windows. A single writer (the
/// chain-head advancer) mutates it; validators operate on cheap
/// copy-on-write snapshots that never observe later insertions.
#[derive(Debug, Clone, Default)]
pub struct NullifierRegistry {
    records: Arc<BTreeMap<Hash32, NullifierRecord>>,
}

impl NullifierRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn check(&self, id: &Hash32) -> Option<&NullifierRecord> {
        self.records.get(id)
    }

    /// Inserts the id unless present. Returns whether the insert
    /// happened; a `false` means replay.
    pub fn insert_if_absent(&mut self, id: Hash32, type_tag: u8, height: u64, ttl: u64) -> bool {
        let records = Arc::make_mut(&mut self.records);
        if records.contains_key(&id) {
            return false;
        }
        records.insert(
            id,
            NullifierRecord {
                type_tag,
                first_seen_height: height,
                expires_at_height: height.saturating_add(ttl),
            },
        );
        true
    }

    /// Drops records whose TTL window closed before `current_height`.
    pub fn gc(&mut self, current_height: u64) -> usize {
        let records = Arc::make_mut(&mut self.records);
        let before = records.len();
        records.retain(|_, record| record.expires_at_height >= current_height);
        let removed = before - records.len();
        if removed > 0 {
            log::debug!("nullifier gc at height {current_height}: dropped {removed} records");
        }
        removed
    }

    /// O(1) immutable view for a validation task.
    pub fn snapshot(&self) -> NullifierSnapshot {
        NullifierSnapshot {
            records: Arc::clone(&self.records),
        }
    }
}

/// An immutable registry view taken at a parent block. Cross-fork
/// validation reads these; only head advancement touches the registry.
#[derive(Debug, Clone)]
pub struct NullifierSnapshot {
    records: Arc<BTreeMap<Hash32, NullifierRecord>>,
}

impl NullifierSnapshot {
    pub fn contains(&self, id: &Hash32) -> bool {
        self.records.contains_key(id)
    }

    pub fn get(&self, id: &Hash32) -> Option<&NullifierRecord> {
        self.records.get(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
