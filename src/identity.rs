//! Creator identity resolution

use crate::{Address, CreatorId};
use std::collections::BTreeMap;

/// Resolves a creator profile to the address that controls it
pub trait IdentityResolver {
    fn resolve_owner(&self, creator: CreatorId) -> Option<Address>;
}

/// Fixed creator → owner directory
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    owners: BTreeMap<CreatorId, Address>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_owner(mut self, creator: CreatorId, owner: Address) -> Self {
        self.register(creator, owner);
        self
    }

    /// Registers or replaces the owner of `creator`; the zero address unregisters it
    pub fn register(&mut self, creator: CreatorId, owner: Address) {
        if owner.is_zero() {
            self.owners.remove(&creator);
        } else {
            self.owners.insert(creator, owner);
        }
    }
}

impl IdentityResolver for StaticDirectory {
    fn resolve_owner(&self, creator: CreatorId) -> Option<Address> {
        self.owners.get(&creator).copied()
    }
}
