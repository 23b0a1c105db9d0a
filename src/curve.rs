//! Pricing interface shared by both pool modes

use crate::amm::AmmReserves;
use crate::bonding_curve::PiecewiseParams;
use crate::error::{MarketError, MarketResult};
use serde::{Deserialize, Serialize};

/// `amount in → price out` contract every pool mode implements
pub trait PricingCurve {
    /// Cost of minting `amount` units at `supply`, before fees
    fn buy_price(&self, supply: u64, amount: u64) -> MarketResult<u128>;

    /// Value of burning `amount` units at `supply`, before fees
    fn sell_price(&self, supply: u64, amount: u64) -> MarketResult<u128>;

    /// Curve state after a buy that cost `cost`
    fn after_buy(&self, amount: u64, cost: u128) -> MarketResult<Self>
    where
        Self: Sized;

    /// Curve state after a sell that returned `value`
    fn after_sell(&self, amount: u64, value: u128) -> MarketResult<Self>
    where
        Self: Sized;
}

/// Pool pricing mode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Curve {
    Piecewise(PiecewiseParams),
    Amm(AmmReserves),
}

impl Curve {
    pub fn validate(&self) -> MarketResult<()> {
        match self {
            Curve::Piecewise(params) => params.validate(),
            Curve::Amm(reserves) => reserves.validate(),
        }
    }

    pub fn mode_name(&self) -> &'static str {
        match self {
            Curve::Piecewise(_) => "piecewise",
            Curve::Amm(_) => "amm",
        }
    }
}

impl PricingCurve for Curve {
    fn buy_price(&self, supply: u64, amount: u64) -> MarketResult<u128> {
        match self {
            Curve::Piecewise(params) => params.buy_price(supply, amount),
            Curve::Amm(reserves) => reserves.buy_price(amount),
        }
    }

    fn sell_price(&self, supply: u64, amount: u64) -> MarketResult<u128> {
        match self {
            Curve::Piecewise(params) => params.sell_price(supply, amount),
            Curve::Amm(reserves) => {
                if amount > supply {
                    return Err(MarketError::InsufficientShares {
                        supply,
                        requested: amount,
                    });
                }
                reserves.sell_price(amount)
            }
        }
    }

    fn after_buy(&self, amount: u64, cost: u128) -> MarketResult<Self> {
        match self {
            // Piecewise prices depend on supply alone
            Curve::Piecewise(_) => Ok(self.clone()),
            Curve::Amm(reserves) => Ok(Curve::Amm(reserves.after_buy(amount, cost)?)),
        }
    }

    fn after_sell(&self, amount: u64, value: u128) -> MarketResult<Self> {
        match self {
            Curve::Piecewise(_) => Ok(self.clone()),
            Curve::Amm(reserves) => Ok(Curve::Amm(reserves.after_sell(amount, value)?)),
        }
    }
}
