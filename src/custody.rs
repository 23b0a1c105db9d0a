//! Key custody
//!
//! Keys are non-fungible, but their price depends only on how many of a
//! pool's keys exist. Custody is therefore an index-addressed arena: a dense
//! id counter plus an id → record map. Burned ids are removed from the map
//! and never handed out again by `mint`.

use crate::constants::FIRST_UNIT_ID;
use crate::{Address, CreatorId, UnitId};
use anyhow::{anyhow, Result};
use std::collections::{BTreeMap, BTreeSet};

/// A unit removed by `burn`, kept so the burn can be undone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BurnedUnit {
    pub id: UnitId,
    pub creator: CreatorId,
    pub owner: Address,
    /// Single-unit approval held at burn time
    pub approved: Option<Address>,
}

/// Mint/burn and ownership queries the market relies on
pub trait UnitCustody {
    /// Mints `count` new units of `creator`'s pool to `to`
    fn mint(&mut self, creator: CreatorId, to: &Address, count: u64) -> Result<Vec<UnitId>>;

    /// Burns every id, or none of them on error
    fn burn(&mut self, ids: &[UnitId]) -> Result<Vec<BurnedUnit>>;

    /// Puts previously burned units back with their former owners
    fn restore(&mut self, units: &[BurnedUnit]) -> Result<()>;

    /// Pool a unit belongs to, if it exists
    fn pool_of(&self, id: UnitId) -> Option<CreatorId>;

    fn is_owner_or_approved(&self, id: UnitId, caller: &Address) -> bool;
}

#[derive(Debug, Clone)]
struct UnitRecord {
    creator: CreatorId,
    owner: Address,
}

/// In-memory custody of all keys across pools
#[derive(Debug, Clone)]
pub struct KeyArena {
    next_id: u64,
    units: BTreeMap<UnitId, UnitRecord>,
    approvals: BTreeMap<UnitId, Address>,
    operators: BTreeSet<(Address, Address)>,
}

impl Default for KeyArena {
    fn default() -> Self {
        Self {
            next_id: FIRST_UNIT_ID,
            units: BTreeMap::new(),
            approvals: BTreeMap::new(),
            operators: BTreeSet::new(),
        }
    }
}

impl KeyArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn owner_of(&self, id: UnitId) -> Option<Address> {
        self.units.get(&id).map(|record| record.owner)
    }

    pub fn balance_of(&self, owner: &Address) -> usize {
        self.units.values().filter(|record| &record.owner == owner).count()
    }

    /// Units currently held by `owner`, ascending
    pub fn units_of(&self, owner: &Address) -> Vec<UnitId> {
        self.units
            .iter()
            .filter(|(_, record)| &record.owner == owner)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Live units across every pool
    pub fn total_live(&self) -> usize {
        self.units.len()
    }

    pub fn get_approved(&self, id: UnitId) -> Option<Address> {
        self.approvals.get(&id).copied()
    }

    pub fn is_approved_for_all(&self, owner: &Address, operator: &Address) -> bool {
        self.operators.contains(&(*owner, *operator))
    }

    /// Approves `spender` for one unit; caller must own it or be an operator
    pub fn approve(&mut self, caller: &Address, spender: Address, id: UnitId) -> Result<()> {
        let owner = self.owner_of(id).ok_or_else(|| anyhow!("unit {} does not exist", id))?;
        if &owner != caller && !self.is_approved_for_all(&owner, caller) {
            return Err(anyhow!("caller is not owner nor approved for all"));
        }
        self.approvals.insert(id, spender);
        Ok(())
    }

    pub fn set_approval_for_all(&mut self, caller: &Address, operator: Address, approved: bool) {
        if approved {
            self.operators.insert((*caller, operator));
        } else {
            self.operators.remove(&(*caller, operator));
        }
    }

    pub fn transfer(&mut self, caller: &Address, to: Address, id: UnitId) -> Result<()> {
        if !self.is_owner_or_approved(id, caller) {
            return Err(anyhow!("caller is not token owner or approved"));
        }
        let record = self
            .units
            .get_mut(&id)
            .ok_or_else(|| anyhow!("unit {} does not exist", id))?;
        record.owner = to;
        self.approvals.remove(&id);
        Ok(())
    }
}

impl UnitCustody for KeyArena {
    fn mint(&mut self, creator: CreatorId, to: &Address, count: u64) -> Result<Vec<UnitId>> {
        let end = self
            .next_id
            .checked_add(count)
            .ok_or_else(|| anyhow!("unit id space exhausted"))?;
        let ids: Vec<UnitId> = (self.next_id..end).map(UnitId).collect();
        for id in &ids {
            self.units.insert(*id, UnitRecord { creator, owner: *to });
        }
        self.next_id = end;
        Ok(ids)
    }

    fn burn(&mut self, ids: &[UnitId]) -> Result<Vec<BurnedUnit>> {
        if let Some(missing) = ids.iter().find(|id| !self.units.contains_key(*id)) {
            return Err(anyhow!("unit {} does not exist", missing));
        }
        let mut burned = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(record) = self.units.remove(id) {
                burned.push(BurnedUnit {
                    id: *id,
                    creator: record.creator,
                    owner: record.owner,
                    approved: self.approvals.remove(id),
                });
            }
        }
        Ok(burned)
    }

    fn restore(&mut self, units: &[BurnedUnit]) -> Result<()> {
        if let Some(live) = units.iter().find(|unit| self.units.contains_key(&unit.id)) {
            return Err(anyhow!("unit {} is still live", live.id));
        }
        for unit in units {
            self.units.insert(
                unit.id,
                UnitRecord {
                    creator: unit.creator,
                    owner: unit.owner,
                },
            );
            if let Some(spender) = unit.approved {
                self.approvals.insert(unit.id, spender);
            }
        }
        Ok(())
    }

    fn pool_of(&self, id: UnitId) -> Option<CreatorId> {
        self.units.get(&id).map(|record| record.creator)
    }

    fn is_owner_or_approved(&self, id: UnitId, caller: &Address) -> bool {
        match self.units.get(&id) {
            Some(record) => {
                &record.owner == caller
                    || self.approvals.get(&id) == Some(caller)
                    || self.is_approved_for_all(&record.owner, caller)
            }
            None => false,
        }
    }
}
