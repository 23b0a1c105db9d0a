//! Market configuration
//!
//! Loaded from JSON. Fee percentages use the same 1e18 = 100% scale as the
//! governance setters.

use crate::constants::{DEFAULT_FEE_PERCENT, DEFAULT_SUPPLY_FLOOR};
use crate::fees::FeeConfig;
use crate::Address;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

fn default_fee_percent() -> u128 {
    DEFAULT_FEE_PERCENT
}

fn default_supply_floor() -> u64 {
    DEFAULT_SUPPLY_FLOOR
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketConfig {
    pub owner: Address,
    /// Receives protocol fees; the owner when unset
    #[serde(default)]
    pub fee_destination: Option<Address>,
    #[serde(default = "default_fee_percent")]
    pub protocol_buy_fee_percent: u128,
    #[serde(default = "default_fee_percent")]
    pub protocol_sell_fee_percent: u128,
    #[serde(default = "default_fee_percent")]
    pub creator_buy_fee_percent: u128,
    #[serde(default = "default_fee_percent")]
    pub creator_sell_fee_percent: u128,
    /// Whether trading starts enabled
    #[serde(default)]
    pub open: bool,
    /// Lowest supply a sell may leave behind
    #[serde(default = "default_supply_floor")]
    pub supply_floor: u64,
}

impl MarketConfig {
    /// Closed market with zero fees, owned by `owner`
    pub fn new(owner: Address) -> Self {
        Self {
            owner,
            fee_destination: None,
            protocol_buy_fee_percent: DEFAULT_FEE_PERCENT,
            protocol_sell_fee_percent: DEFAULT_FEE_PERCENT,
            creator_buy_fee_percent: DEFAULT_FEE_PERCENT,
            creator_sell_fee_percent: DEFAULT_FEE_PERCENT,
            open: false,
            supply_floor: DEFAULT_SUPPLY_FLOOR,
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| anyhow!("Failed to parse market config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading market config {}", path.display()))?;
        Self::from_json(&json).with_context(|| format!("loading market config {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.owner.is_zero() {
            return Err(anyhow!("owner must not be the zero address"));
        }
        self.fee_config()
            .validate()
            .map_err(|e| anyhow!("invalid fee config: {}", e))
    }

    pub fn fee_config(&self) -> FeeConfig {
        FeeConfig {
            protocol_buy_fee_percent: self.protocol_buy_fee_percent,
            protocol_sell_fee_percent: self.protocol_sell_fee_percent,
            creator_buy_fee_percent: self.creator_buy_fee_percent,
            creator_sell_fee_percent: self.creator_sell_fee_percent,
            fee_destination: self.fee_destination.unwrap_or(self.owner),
        }
    }
}
