//! Piecewise Bonding Curve
//!
//! Unit prices for the piecewise pool mode:
//! - a flat IDO segment: the first `ido_amount` units cost `ido_price` each
//! - a signed quadratic after it: with `s = n + 1` for unit index `n`,
//!   `price = (a·s² ± b·s ± c) / CURVE_PRECISION`, floored per unit
//!
//! Buy and sell ranges are priced by summing the same per-unit function, so
//! buying and then selling the same units is neutral before fees.

use crate::constants::CURVE_PRECISION;
use crate::error::{overflow, MarketError, MarketResult};
use serde::{Deserialize, Serialize};

/// Piecewise curve parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PiecewiseParams {
    pub ido_price: u128,  // Flat price of each IDO unit
    pub ido_amount: u64,  // Units sold at the flat price
    pub max_supply: u64,  // Pool cap
    pub a: u128,          // Quadratic coefficient, scaled by CURVE_PRECISION
    pub b: u128,          // Linear coefficient, scaled by CURVE_PRECISION
    pub b_positive: bool,
    pub c: u128,          // Constant term, scaled by CURVE_PRECISION
    pub c_positive: bool,
}

impl PiecewiseParams {
    pub fn validate(&self) -> MarketResult<()> {
        if self.max_supply == 0 {
            return Err(MarketError::InvalidCurveParams("max_supply must be > 0".into()));
        }
        if self.ido_amount > self.max_supply {
            return Err(MarketError::InvalidCurveParams(format!(
                "ido_amount {} exceeds max_supply {}",
                self.ido_amount, self.max_supply
            )));
        }
        Ok(())
    }

    /// Price of the unit at 0-based index `n`
    pub fn unit_price(&self, n: u64) -> MarketResult<u128> {
        if n < self.ido_amount {
            return Ok(self.ido_price);
        }

        let s = u128::from(n) + 1;
        let quadratic = overflow(self.a.checked_mul(overflow(s.checked_mul(s))?))?;
        let linear = overflow(self.b.checked_mul(s))?;

        let mut positive = quadratic;
        let mut negative = 0u128;
        if self.b_positive {
            positive = overflow(positive.checked_add(linear))?;
        } else {
            negative = linear;
        }
        if self.c_positive {
            positive = overflow(positive.checked_add(self.c))?;
        } else {
            negative = overflow(negative.checked_add(self.c))?;
        }

        let raw = positive
            .checked_sub(negative)
            .ok_or(MarketError::CurveUnderflow(n))?;
        Ok(raw / CURVE_PRECISION)
    }

    /// Sum of unit prices over `[from, from + count)`
    fn range_price(&self, from: u64, count: u64) -> MarketResult<u128> {
        let end = overflow(from.checked_add(count))?;

        // Flat units are summed in one step
        let flat_end = end.min(self.ido_amount);
        let flat_units = flat_end.saturating_sub(from);
        let mut total = overflow(self.ido_price.checked_mul(u128::from(flat_units)))?;

        for n in from.max(self.ido_amount)..end {
            total = overflow(total.checked_add(self.unit_price(n)?))?;
        }
        Ok(total)
    }

    /// Cost of minting `amount` units on top of `supply`
    pub fn buy_price(&self, supply: u64, amount: u64) -> MarketResult<u128> {
        if amount == 0 {
            return Ok(0);
        }
        let new_supply = u128::from(supply) + u128::from(amount);
        if new_supply > u128::from(self.max_supply) {
            return Err(MarketError::SupplyCapExceeded {
                max: self.max_supply,
                would_have: new_supply,
            });
        }
        self.range_price(supply, amount)
    }

    /// Value of burning the top `amount` units of `supply`
    pub fn sell_price(&self, supply: u64, amount: u64) -> MarketResult<u128> {
        if amount == 0 {
            return Ok(0);
        }
        if amount > supply {
            return Err(MarketError::InsufficientShares {
                supply,
                requested: amount,
            });
        }
        self.range_price(supply - amount, amount)
    }
}
