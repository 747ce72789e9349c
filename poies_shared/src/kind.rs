// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use num_derive::FromPrimitive;
use serde_repr::{Deserialize_repr, Serialize_repr};

/// The proof families the engine scores. The discriminant is the wire
/// `type_tag` byte and the primary key of the canonical proof order.
#[derive(
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Copy,
    Clone,
    FromPrimitive,
    Debug,
    Hash,
    Serialize_repr,
    Deserialize_repr,
)]
#[repr(u8)]
pub enum ProofKind {
    Hash = 0,
    Ai = 1,
    Quantum = 2,
    Storage = 3,
    Vdf = 4,
}

/// All kinds in canonical (tag-ascending) order.
pub const ALL_KINDS: [ProofKind; 5] = [
    ProofKind::Hash,
    ProofKind::Ai,
    ProofKind::Quantum,
    ProofKind::Storage,
    ProofKind::Vdf,
];

pub const NUM_KINDS: usize = ALL_KINDS.len();

impl ProofKind {
    pub fn from_tag(tag: u8) -> Option<Self> {
        num_traits::FromPrimitive::from_u8(tag)
    }

    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProofKind::Hash => "hash",
            ProofKind::Ai => "ai",
            ProofKind::Quantum => "quantum",
            ProofKind::Storage => "storage",
            ProofKind::Vdf => "vdf",
        }
    }

    /// Domain tag for nullifier ids of this kind: `poies/nullifier/<type>`.
    pub fn nullifier_tag(self) -> &'static str {
        match self {
            ProofKind::Hash => "poies/nullifier/hash",
            ProofKind::Ai => "poies/nullifier/ai",
            ProofKind::Quantum => "poies/nullifier/quantum",
            ProofKind::Storage => "poies/nullifier/storage",
            ProofKind::Vdf => "poies/nullifier/vdf",
        }
    }
}

impl std::fmt::Display for ProofKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value per proof kind, indexed by tag. Serializes as a plain
/// five-element array, which keeps the canonical CBOR encoding free of
/// maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct KindTable<T>(pub [T; NUM_KINDS]);

impl<T: Default + Copy> Default for KindTable<T> {
    fn default() -> Self {
        KindTable([T::default(); NUM_KINDS])
    }
}

impl<T> KindTable<T> {
    pub fn get(&self, kind: ProofKind) -> &T {
        &self.0[kind.index()]
    }

    pub fn get_mut(&mut self, kind: ProofKind) -> &mut T {
        &mut self.0[kind.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (ProofKind, &T)> {
        ALL_KINDS.iter().map(move |k| (*k, &self.0[k.index()]))
    }
}

impl<T> std::ops::Index<ProofKind> for KindTable<T> {
    type Output = T;

    fn index(&self, kind: ProofKind) -> &T {
        self.get(kind)
    }
}

impl<T> std::ops::IndexMut<ProofKind> for KindTable<T> {
    fn index_mut(&mut self, kind: ProofKind) -> &mut T {
        self.get_mut(kind)
    }
}
