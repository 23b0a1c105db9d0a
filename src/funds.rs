//! Movement of funds
//!
//! The market never moves value piecemeal: each operation hands the channel
//! one batch of transfers which is settled entirely or not at all.

use crate::Address;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferReason {
    Refund,
    ProtocolFee,
    Proceeds,
    Claim,
}

/// One outgoing payment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub to: Address,
    pub amount: u128,
    pub reason: TransferReason,
}

impl Transfer {
    pub fn new(to: Address, amount: u128, reason: TransferReason) -> Self {
        Self { to, amount, reason }
    }
}

/// Pays out of the market
pub trait FundsChannel {
    /// Settles every transfer, or none of them on error
    fn settle(&mut self, transfers: &[Transfer]) -> Result<()>;
}

/// In-memory account balances credited by settlements
#[derive(Debug, Clone, Default)]
pub struct Vault {
    balances: BTreeMap<Address, u128>,
    settled: Vec<Transfer>,
}

impl Vault {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance_of(&self, account: &Address) -> u128 {
        self.balances.get(account).copied().unwrap_or(0)
    }

    /// Every transfer settled so far, in order
    pub fn history(&self) -> &[Transfer] {
        &self.settled
    }
}

impl FundsChannel for Vault {
    fn settle(&mut self, transfers: &[Transfer]) -> Result<()> {
        // Stage new balances first so a failure leaves nothing applied
        let mut staged: BTreeMap<Address, u128> = BTreeMap::new();
        for transfer in transfers {
            let current = match staged.get(&transfer.to) {
                Some(balance) => *balance,
                None => self.balance_of(&transfer.to),
            };
            let next = current
                .checked_add(transfer.amount)
                .ok_or_else(|| anyhow!("balance overflow for {}", transfer.to))?;
            staged.insert(transfer.to, next);
        }

        self.balances.extend(staged);
        self.settled.extend_from_slice(transfers);
        Ok(())
    }
}
