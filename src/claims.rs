//! Creator fee ledger
//!
//! Balances only grow through trade fee splits and only drop, to zero,
//! through a claim.

use crate::error::{overflow, MarketResult};
use crate::CreatorId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClaimLedger {
    balances: BTreeMap<CreatorId, u128>,
}

impl ClaimLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance(&self, creator: CreatorId) -> u128 {
        self.balances.get(&creator).copied().unwrap_or(0)
    }

    /// Balance after crediting `amount`, without applying it
    pub fn credited(&self, creator: CreatorId, amount: u128) -> MarketResult<u128> {
        overflow(self.balance(creator).checked_add(amount))
    }

    /// Overwrites a balance with one computed by `credited`
    pub(crate) fn set_balance(&mut self, creator: CreatorId, balance: u128) {
        if balance == 0 {
            self.balances.remove(&creator);
        } else {
            self.balances.insert(creator, balance);
        }
    }

    /// Zeroes the balance and returns what it held
    pub fn take(&mut self, creator: CreatorId) -> u128 {
        self.balances.remove(&creator).unwrap_or(0)
    }

    /// Creators with a non-zero balance
    pub fn creators(&self) -> impl Iterator<Item = (CreatorId, u128)> + '_ {
        self.balances
            .iter()
            .filter(|(_, amount)| **amount > 0)
            .map(|(creator, amount)| (*creator, *amount))
    }
}
