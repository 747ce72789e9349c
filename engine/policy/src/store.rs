// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::collections::BTreeMap;
use std::sync::Arc;

use poies_shared::error::PolicyError;
use poies_shared::hash::Hash32;

/// Holds the active policy plus any grandfathered predecessors listed in
/// the upgrade table. Validators pin a policy by the root carried in the
/// block header; an unknown root rejects the block.
#[derive(Debug, Clone)]
pub struct PolicyStore {
    active_root: Hash32,
    policies: BTreeMap<Hash32, Arc<crate::Policy>>,
}

impl PolicyStore {
    pub fn new(active: crate::Policy) -> Result<Self, PolicyError> {
        active.validate()?;
        let root = active.policy_root()?;
        log::info!("activating policy root {root} (version {})", active.version);
        let mut policies = BTreeMap::new();
        policies.insert(root, Arc::new(active));
        Ok(PolicyStore {
            active_root: root,
            policies,
        })
    }

    pub fn active_root(&self) -> Hash32 {
        self.active_root
    }

    pub fn active(&self) -> &Arc<crate::Policy> {
        // The active root is always present; `new` and `activate` keep
        // the map and the root in lockstep.
        &self.policies[&self.active_root]
    }

    /// Installs a new active policy. When `grandfather` is set the
    /// current policy stays pinnable, so blocks referencing its root
    /// remain valid through the upgrade window.
    pub fn activate(
        &mut self,
        next: crate::Policy,
        grandfather: bool,
    ) -> Result<Hash32, PolicyError> {
        next.validate()?;
        let root = next.policy_root()?;
        if !grandfather {
            self.policies.clear();
        }
        log::info!(
            "activating policy root {root} (version {}, {} grandfathered)",
            next.version,
            self.policies.len()
        );
        self.policies.insert(root, Arc::new(next));
        self.active_root = root;
        Ok(root)
    }

    /// Returns the pinned view for a header's policy root.
    pub fn pinned(&self, root: &Hash32) -> Result<Arc<crate::Policy>, PolicyError> {
        self.policies
            .get(root)
            .cloned()
            .ok_or(PolicyError::UnknownRoot(*root))
    }

    pub fn roots(&self) -> impl Iterator<Item = &Hash32> {
        self.policies.keys()
    }
}
