//! AMM Pricing
//!
//! Reserve-based pricing for pools created in AMM mode. A pool keeps virtual
//! quote and unit reserves whose product stays (up to rounding) constant:
//! - buying `n` units costs `ceil(quote·n / (units − n))`
//! - selling `n` units returns `floor(quote·n / (units + n))`
//!
//! Rounding always favours the pool, so a buy followed by a sell of the same
//! size never pays out more than was paid in.

use crate::error::{overflow, MarketError, MarketResult};
use serde::{Deserialize, Serialize};

/// Virtual reserves of an AMM pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmmReserves {
    pub quote_reserve: u128,
    pub unit_reserve: u128,
}

impl AmmReserves {
    pub fn new(quote_reserve: u128, unit_reserve: u128) -> Self {
        Self { quote_reserve, unit_reserve }
    }

    pub fn validate(&self) -> MarketResult<()> {
        if self.quote_reserve == 0 || self.unit_reserve == 0 {
            return Err(MarketError::InvalidCurveParams(
                "AMM reserves must both be > 0".into(),
            ));
        }
        Ok(())
    }

    /// Cost of taking `amount` units out of the pool
    pub fn buy_price(&self, amount: u64) -> MarketResult<u128> {
        if amount == 0 {
            return Ok(0);
        }
        let amount = u128::from(amount);
        if amount >= self.unit_reserve {
            return Err(MarketError::SupplyCapExceeded {
                max: u64::try_from(self.unit_reserve.saturating_sub(1)).unwrap_or(u64::MAX),
                would_have: amount,
            });
        }
        let numerator = overflow(self.quote_reserve.checked_mul(amount))?;
        let denominator = self.unit_reserve - amount;
        Ok(numerator.div_ceil(denominator))
    }

    /// Value of returning `amount` units to the pool
    pub fn sell_price(&self, amount: u64) -> MarketResult<u128> {
        if amount == 0 {
            return Ok(0);
        }
        let amount = u128::from(amount);
        let numerator = overflow(self.quote_reserve.checked_mul(amount))?;
        let denominator = overflow(self.unit_reserve.checked_add(amount))?;
        Ok(numerator / denominator)
    }

    /// Reserves after a buy of `amount` units costing `cost`
    pub fn after_buy(&self, amount: u64, cost: u128) -> MarketResult<Self> {
        Ok(Self {
            quote_reserve: overflow(self.quote_reserve.checked_add(cost))?,
            unit_reserve: overflow(self.unit_reserve.checked_sub(u128::from(amount)))?,
        })
    }

    /// Reserves after a sell of `amount` units returning `value`
    pub fn after_sell(&self, amount: u64, value: u128) -> MarketResult<Self> {
        Ok(Self {
            quote_reserve: overflow(self.quote_reserve.checked_sub(value))?,
            unit_reserve: overflow(self.unit_reserve.checked_add(u128::from(amount)))?,
        })
    }

    /// Constant-product invariant
    pub fn k(&self) -> Option<u128> {
        self.quote_reserve.checked_mul(self.unit_reserve)
    }
}
