//! Profile Keys Market
//!
//! A bonding curve market for creator "keys": every creator profile owns at
//! most one pool of non-fungible units whose price follows the pool's supply.
//!
//! This crate provides:
//! - Piecewise pricing (flat IDO segment, then a signed quadratic) and a
//!   constant-product AMM variant behind one pricing interface
//! - Buy/sell with exact payment checks, fee splitting and a slippage bound
//! - A per-creator ledger of claimable trading fees
//! - Owner-gated fee governance and a market open switch
//!
//! Unit custody, identity resolution and movement of funds are collaborators
//! described by traits; in-memory implementations ship with the crate.

use anyhow::{anyhow, Result};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

pub mod amm;
pub mod bonding_curve;
pub mod claims;
pub mod config;
pub mod constants;
pub mod curve;
pub mod custody;
pub mod error;
pub mod fees;
pub mod funds;
pub mod identity;
pub mod market;
pub mod registry;
pub mod shared;

#[cfg(test)]
pub mod tests;

// Re-export key types
pub use amm::AmmReserves;
pub use bonding_curve::PiecewiseParams;
pub use claims::ClaimLedger;
pub use config::MarketConfig;
pub use curve::{Curve, PricingCurve};
pub use custody::{BurnedUnit, KeyArena, UnitCustody};
pub use error::{ErrorKind, MarketError, MarketResult};
pub use fees::{FeeConfig, FeeSplit};
pub use funds::{FundsChannel, Transfer, TransferReason, Vault};
pub use identity::{IdentityResolver, StaticDirectory};
pub use market::{ProfileMarket, TradeReceipt, TradeSide};
pub use registry::{Pool, PoolRegistry};
pub use shared::SharedMarket;

/// Creator profile identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CreatorId(pub u64);

impl fmt::Display for CreatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identifier of a single minted key
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UnitId(pub u64);

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 20-byte account address, written as `0x`-prefixed hex
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address(pub [u8; 20]);

impl Address {
    pub const ZERO: Address = Address([0u8; 20]);

    /// Address holding `n` in its low eight bytes
    pub fn from_low_u64(n: u64) -> Self {
        let mut bytes = [0u8; 20];
        bytes[12..].copy_from_slice(&n.to_be_bytes());
        Address(bytes)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl FromStr for Address {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(digits).map_err(|e| anyhow!("invalid address {}: {}", s, e))?;
        let bytes: [u8; 20] = bytes
            .try_into()
            .map_err(|v: Vec<u8>| anyhow!("address must be 20 bytes, got {}", v.len()))?;
        Ok(Address(bytes))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}
