//! Trading fees
//!
//! Four percentages, each scaled so that `FEE_PRECISION` is 100%, and the
//! destination of the protocol share. The creator share is never paid out
//! directly; it accrues in the claim ledger.

use crate::constants::{DEFAULT_FEE_PERCENT, FEE_PRECISION, MAX_FEE_PERCENT};
use crate::error::{overflow, MarketError, MarketResult};
use crate::Address;
use serde::{Deserialize, Serialize};

/// Owner-settable fee parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeConfig {
    pub protocol_buy_fee_percent: u128,
    pub protocol_sell_fee_percent: u128,
    pub creator_buy_fee_percent: u128,
    pub creator_sell_fee_percent: u128,
    pub fee_destination: Address,
}

impl FeeConfig {
    pub fn new(fee_destination: Address) -> Self {
        Self {
            protocol_buy_fee_percent: DEFAULT_FEE_PERCENT,
            protocol_sell_fee_percent: DEFAULT_FEE_PERCENT,
            creator_buy_fee_percent: DEFAULT_FEE_PERCENT,
            creator_sell_fee_percent: DEFAULT_FEE_PERCENT,
            fee_destination,
        }
    }

    pub fn validate(&self) -> MarketResult<()> {
        for percent in [
            self.protocol_buy_fee_percent,
            self.protocol_sell_fee_percent,
            self.creator_buy_fee_percent,
            self.creator_sell_fee_percent,
        ] {
            check_percent(percent)?;
        }
        Ok(())
    }

    /// Fee split of a buy whose curve price is `base`
    pub fn split_buy(&self, base: u128) -> MarketResult<FeeSplit> {
        Ok(FeeSplit {
            base,
            protocol_fee: apply_percent(base, self.protocol_buy_fee_percent)?,
            creator_fee: apply_percent(base, self.creator_buy_fee_percent)?,
        })
    }

    /// Fee split of a sell whose curve value is `base`
    pub fn split_sell(&self, base: u128) -> MarketResult<FeeSplit> {
        Ok(FeeSplit {
            base,
            protocol_fee: apply_percent(base, self.protocol_sell_fee_percent)?,
            creator_fee: apply_percent(base, self.creator_sell_fee_percent)?,
        })
    }
}

/// Rejects percentages above 100%
pub fn check_percent(percent: u128) -> MarketResult<()> {
    if percent > MAX_FEE_PERCENT {
        return Err(MarketError::InvalidFeePercent(percent));
    }
    Ok(())
}

/// `floor(amount · percent / FEE_PRECISION)`
pub fn apply_percent(amount: u128, percent: u128) -> MarketResult<u128> {
    Ok(overflow(amount.checked_mul(percent))? / FEE_PRECISION)
}

/// Curve price of a trade and the fees charged on it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSplit {
    pub base: u128,
    pub protocol_fee: u128,
    pub creator_fee: u128,
}

impl FeeSplit {
    pub fn total_fees(&self) -> MarketResult<u128> {
        overflow(self.protocol_fee.checked_add(self.creator_fee))
    }

    /// What a buyer must pay
    pub fn buy_total(&self) -> MarketResult<u128> {
        overflow(self.base.checked_add(self.total_fees()?))
    }

    /// What a seller receives
    pub fn sell_proceeds(&self) -> MarketResult<u128> {
        overflow(self.base.checked_sub(self.total_fees()?))
    }
}
