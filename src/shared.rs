//! Thread-safe market handle
//!
//! Each call holds the market lock from validation to commit, so concurrent
//! callers observe operations in one linear order and never see a
//! half-applied trade.

use crate::curve::Curve;
use crate::custody::UnitCustody;
use crate::error::MarketResult;
use crate::funds::FundsChannel;
use crate::identity::IdentityResolver;
use crate::market::{ProfileMarket, TradeReceipt};
use crate::{Address, CreatorId, UnitId};
use parking_lot::Mutex;
use std::sync::Arc;

pub struct SharedMarket<C, I, F> {
    inner: Arc<Mutex<ProfileMarket<C, I, F>>>,
}

impl<C, I, F> Clone for SharedMarket<C, I, F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C, I, F> SharedMarket<C, I, F>
where
    C: UnitCustody,
    I: IdentityResolver,
    F: FundsChannel,
{
    pub fn new(market: ProfileMarket<C, I, F>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(market)),
        }
    }

    pub fn create_pool(&self, caller: Address, creator: CreatorId, curve: Curve) -> MarketResult<()> {
        self.inner.lock().create_pool(caller, creator, curve)
    }

    pub fn buy(&self, caller: Address, creator: CreatorId, amount: u64, payment: u128) -> MarketResult<TradeReceipt> {
        self.inner.lock().buy(caller, creator, amount, payment)
    }

    pub fn sell(&self, caller: Address, unit_ids: &[UnitId], min_proceeds: u128) -> MarketResult<TradeReceipt> {
        self.inner.lock().sell(caller, unit_ids, min_proceeds)
    }

    pub fn claim(&self, caller: Address, creator: CreatorId) -> MarketResult<u128> {
        self.inner.lock().claim(caller, creator)
    }

    pub fn get_buy_price(&self, creator: CreatorId, amount: u64) -> MarketResult<u128> {
        self.inner.lock().get_buy_price(creator, amount)
    }

    pub fn get_sell_price(&self, creator: CreatorId, amount: u64) -> MarketResult<u128> {
        self.inner.lock().get_sell_price(creator, amount)
    }

    /// Runs `f` with exclusive access to the market
    pub fn with<R>(&self, f: impl FnOnce(&mut ProfileMarket<C, I, F>) -> R) -> R {
        let mut market = self.inner.lock();
        f(&mut market)
    }
}
