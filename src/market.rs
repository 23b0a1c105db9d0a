//! Key Market
//!
//! Orchestrates pool creation, trading, fee claims and governance over the
//! market store and the three collaborators. Every mutating call runs in the
//! same order:
//! 1. validate and price against current state, computing the state after
//! 2. mint or burn units
//! 3. settle all payments in one batch
//! 4. commit pool and claim ledger changes
//!
//! A failed settlement undoes step 2, so a call either fully applies or
//! leaves nothing behind.

use crate::claims::ClaimLedger;
use crate::config::MarketConfig;
use crate::curve::{Curve, PricingCurve};
use crate::custody::UnitCustody;
use crate::error::{overflow, MarketError, MarketResult};
use crate::fees::{check_percent, FeeConfig, FeeSplit};
use crate::funds::{FundsChannel, Transfer, TransferReason};
use crate::identity::IdentityResolver;
use crate::registry::{Pool, PoolRegistry};
use crate::{Address, CreatorId, UnitId};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// State owned by the market: governance values, pools and claim balances
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketStore {
    pub owner: Address,
    pub open: bool,
    pub fees: FeeConfig,
    pub supply_floor: u64,
    pub registry: PoolRegistry,
    pub claims: ClaimLedger,
}

impl MarketStore {
    pub fn from_config(config: &MarketConfig) -> Self {
        Self {
            owner: config.owner,
            open: config.open,
            fees: config.fee_config(),
            supply_floor: config.supply_floor,
            registry: PoolRegistry::new(),
            claims: ClaimLedger::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeSide {
    Buy,
    Sell,
}

/// Outcome of a successful buy or sell
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeReceipt {
    pub side: TradeSide,
    pub trader: Address,
    pub creator: CreatorId,
    pub unit_ids: Vec<UnitId>,
    pub split: FeeSplit,
    /// Total paid on a buy, proceeds received on a sell
    pub settled: u128,
    pub supply_after: u64,
}

impl TradeReceipt {
    pub fn amount(&self) -> u64 {
        self.unit_ids.len() as u64
    }
}

/// Everything a trade changes, computed before any effect runs
struct TradePlan {
    pool_after: Pool,
    claim_after: u128,
    split: FeeSplit,
    settled: u128,
    transfers: Vec<Transfer>,
}

pub struct ProfileMarket<C, I, F> {
    store: MarketStore,
    custody: C,
    identity: I,
    funds: F,
}

impl<C, I, F> ProfileMarket<C, I, F>
where
    C: UnitCustody,
    I: IdentityResolver,
    F: FundsChannel,
{
    pub fn new(config: &MarketConfig, custody: C, identity: I, funds: F) -> Result<Self> {
        config.validate()?;
        info!(owner = %config.owner, open = config.open, "key market initialized");
        Ok(Self {
            store: MarketStore::from_config(config),
            custody,
            identity,
            funds,
        })
    }

    // ------------------------------------------------------------------
    // Pools
    // ------------------------------------------------------------------

    /// Opens an empty pool; only the creator's resolved owner may do so
    pub fn create_pool(&mut self, caller: Address, creator: CreatorId, curve: Curve) -> MarketResult<()> {
        self.check_create(caller, creator, &curve)?;
        let mode = curve.mode_name();
        self.store.registry.create(creator, curve, &self.identity)?;
        info!(creator = %creator, caller = %caller, mode, "pool created");
        Ok(())
    }

    /// Opens a pool and buys `amount` keys from it in one step
    pub fn create_pool_with_initial_buy(
        &mut self,
        caller: Address,
        creator: CreatorId,
        curve: Curve,
        amount: u64,
        payment: u128,
    ) -> MarketResult<TradeReceipt> {
        self.ensure_open()?;
        self.check_create(caller, creator, &curve)?;
        let mode = curve.mode_name();
        let pool = Pool {
            creator,
            supply: 0,
            curve,
        };
        let receipt = self.execute_buy(caller, pool, amount, payment, true)?;
        info!(creator = %creator, caller = %caller, mode, "pool created with initial buy");
        Ok(receipt)
    }

    fn check_create(&self, caller: Address, creator: CreatorId, curve: &Curve) -> MarketResult<()> {
        self.store.registry.check_create(creator, curve, &self.identity)?;
        if self.identity.resolve_owner(creator) != Some(caller) {
            return Err(MarketError::NotCreatorOwner(creator));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Trading
    // ------------------------------------------------------------------

    pub fn buy(
        &mut self,
        caller: Address,
        creator: CreatorId,
        amount: u64,
        payment: u128,
    ) -> MarketResult<TradeReceipt> {
        self.ensure_open()?;
        let pool = self.store.registry.get(creator)?.clone();
        self.execute_buy(caller, pool, amount, payment, false)
    }

    fn execute_buy(
        &mut self,
        caller: Address,
        pool: Pool,
        amount: u64,
        payment: u128,
        new_pool: bool,
    ) -> MarketResult<TradeReceipt> {
        let creator = pool.creator;
        let plan = self.plan_buy(caller, pool, amount, payment)?;

        let unit_ids = self
            .custody
            .mint(creator, &caller, amount)
            .map_err(MarketError::Custody)?;

        if let Err(err) = self.funds.settle(&plan.transfers) {
            warn!(creator = %creator, error = %err, "buy settlement failed, burning minted keys");
            if let Err(undo) = self.custody.burn(&unit_ids) {
                warn!(creator = %creator, error = %undo, "could not burn keys of failed buy");
            }
            return Err(MarketError::Settlement(err));
        }

        let receipt = TradeReceipt {
            side: TradeSide::Buy,
            trader: caller,
            creator,
            unit_ids,
            split: plan.split,
            settled: plan.settled,
            supply_after: plan.pool_after.supply,
        };
        if new_pool {
            self.store.registry.insert(plan.pool_after);
        } else {
            self.store.registry.replace(plan.pool_after)?;
        }
        self.store.claims.set_balance(creator, plan.claim_after);

        info!(
            creator = %creator,
            trader = %caller,
            amount,
            base = receipt.split.base,
            protocol_fee = receipt.split.protocol_fee,
            creator_fee = receipt.split.creator_fee,
            supply = receipt.supply_after,
            "keys bought"
        );
        Ok(receipt)
    }

    fn plan_buy(&self, caller: Address, pool: Pool, amount: u64, payment: u128) -> MarketResult<TradePlan> {
        if amount == 0 {
            return Err(MarketError::InvalidAmount("cannot buy zero keys".into()));
        }
        let fees = &self.store.fees;

        let base = pool.curve.buy_price(pool.supply, amount)?;
        let split = fees.split_buy(base)?;
        let total = split.buy_total()?;
        if payment < total {
            return Err(MarketError::InsufficientPayment {
                have: payment,
                need: total,
            });
        }

        let pool_after = Pool {
            creator: pool.creator,
            supply: overflow(pool.supply.checked_add(amount))?,
            curve: pool.curve.after_buy(amount, base)?,
        };
        let claim_after = self.store.claims.credited(pool.creator, split.creator_fee)?;

        let mut transfers = Vec::new();
        let refund = payment - total;
        if refund > 0 {
            transfers.push(Transfer::new(caller, refund, TransferReason::Refund));
        }
        if split.protocol_fee > 0 {
            transfers.push(Transfer::new(
                fees.fee_destination,
                split.protocol_fee,
                TransferReason::ProtocolFee,
            ));
        }

        Ok(TradePlan {
            pool_after,
            claim_after,
            split,
            settled: total,
            transfers,
        })
    }

    /// Sells keys of a single pool; `min_proceeds` bounds slippage
    pub fn sell(
        &mut self,
        caller: Address,
        unit_ids: &[UnitId],
        min_proceeds: u128,
    ) -> MarketResult<TradeReceipt> {
        self.ensure_open()?;
        let creator = self.check_sell_units(caller, unit_ids)?;
        let pool = self.store.registry.get(creator)?.clone();
        let plan = self.plan_sell(caller, pool, unit_ids.len() as u64, min_proceeds)?;

        let burned = self.custody.burn(unit_ids).map_err(MarketError::Custody)?;

        if let Err(err) = self.funds.settle(&plan.transfers) {
            warn!(creator = %creator, error = %err, "sell settlement failed, restoring burned keys");
            if let Err(undo) = self.custody.restore(&burned) {
                warn!(creator = %creator, error = %undo, "could not restore keys of failed sell");
            }
            return Err(MarketError::Settlement(err));
        }

        let receipt = TradeReceipt {
            side: TradeSide::Sell,
            trader: caller,
            creator,
            unit_ids: unit_ids.to_vec(),
            split: plan.split,
            settled: plan.settled,
            supply_after: plan.pool_after.supply,
        };
        self.store.registry.replace(plan.pool_after)?;
        self.store.claims.set_balance(creator, plan.claim_after);

        info!(
            creator = %creator,
            trader = %caller,
            amount = receipt.amount(),
            base = receipt.split.base,
            proceeds = receipt.settled,
            supply = receipt.supply_after,
            "keys sold"
        );
        Ok(receipt)
    }

    /// Validates the sell list and returns the pool it belongs to
    fn check_sell_units(&self, caller: Address, unit_ids: &[UnitId]) -> MarketResult<CreatorId> {
        let first = unit_ids.first().ok_or(MarketError::EmptySell)?;

        let mut seen = BTreeSet::new();
        let mut creator = None;
        for id in unit_ids {
            if !seen.insert(*id) {
                return Err(MarketError::DuplicateUnit(*id));
            }
            let pool = self
                .custody
                .pool_of(*id)
                .ok_or(MarketError::NotOwnerOrApproved(*id))?;
            if !self.custody.is_owner_or_approved(*id, &caller) {
                return Err(MarketError::NotOwnerOrApproved(*id));
            }
            match creator {
                None => creator = Some(pool),
                Some(expected) if expected != pool => {
                    return Err(MarketError::MixedPools(expected, pool));
                }
                Some(_) => {}
            }
        }
        creator.ok_or(MarketError::NotOwnerOrApproved(*first))
    }

    fn plan_sell(&self, caller: Address, pool: Pool, amount: u64, min_proceeds: u128) -> MarketResult<TradePlan> {
        let fees = &self.store.fees;
        let floor = self.store.supply_floor;

        if amount > pool.supply {
            return Err(MarketError::InsufficientShares {
                supply: pool.supply,
                requested: amount,
            });
        }
        if pool.supply - amount < floor {
            return Err(MarketError::SupplyFloor {
                supply: pool.supply,
                requested: amount,
                floor,
            });
        }

        let base = pool.curve.sell_price(pool.supply, amount)?;
        let split = fees.split_sell(base)?;
        let proceeds = split.sell_proceeds()?;
        if proceeds < min_proceeds {
            return Err(MarketError::PriceNotInRange {
                proceeds,
                min: min_proceeds,
            });
        }

        let pool_after = Pool {
            creator: pool.creator,
            supply: pool.supply - amount,
            curve: pool.curve.after_sell(amount, base)?,
        };
        let claim_after = self.store.claims.credited(pool.creator, split.creator_fee)?;

        let mut transfers = Vec::new();
        if proceeds > 0 {
            transfers.push(Transfer::new(caller, proceeds, TransferReason::Proceeds));
        }
        if split.protocol_fee > 0 {
            transfers.push(Transfer::new(
                fees.fee_destination,
                split.protocol_fee,
                TransferReason::ProtocolFee,
            ));
        }

        Ok(TradePlan {
            pool_after,
            claim_after,
            split,
            settled: proceeds,
            transfers,
        })
    }

    // ------------------------------------------------------------------
    // Claims
    // ------------------------------------------------------------------

    /// Pays out the full fee balance of `creator` to its owner
    pub fn claim(&mut self, caller: Address, creator: CreatorId) -> MarketResult<u128> {
        if self.identity.resolve_owner(creator) != Some(caller) {
            return Err(MarketError::NotCreatorOwner(creator));
        }
        let amount = self.store.claims.balance(creator);
        if amount == 0 {
            return Err(MarketError::ZeroClaimable);
        }

        self.funds
            .settle(&[Transfer::new(caller, amount, TransferReason::Claim)])
            .map_err(MarketError::Settlement)?;
        self.store.claims.take(creator);

        info!(creator = %creator, owner = %caller, amount, "creator fees claimed");
        Ok(amount)
    }

    /// Claims every balance whose creator resolves to `caller`
    pub fn claim_all(&mut self, caller: Address) -> MarketResult<u128> {
        let owned = self.owned_balances(caller);
        let mut total = 0u128;
        for (_, amount) in &owned {
            total = overflow(total.checked_add(*amount))?;
        }
        if total == 0 {
            return Err(MarketError::ZeroClaimable);
        }

        self.funds
            .settle(&[Transfer::new(caller, total, TransferReason::Claim)])
            .map_err(MarketError::Settlement)?;
        for (creator, _) in &owned {
            self.store.claims.take(*creator);
        }

        info!(owner = %caller, creators = owned.len(), amount = total, "creator fees claimed");
        Ok(total)
    }

    fn owned_balances(&self, owner: Address) -> Vec<(CreatorId, u128)> {
        self.store
            .claims
            .creators()
            .filter(|(creator, _)| self.identity.resolve_owner(*creator) == Some(owner))
            .collect()
    }

    /// Unclaimed fees across every creator owned by `owner`
    pub fn user_claimable(&self, owner: Address) -> MarketResult<u128> {
        let mut total = 0u128;
        for (_, amount) in self.owned_balances(owner) {
            total = overflow(total.checked_add(amount))?;
        }
        Ok(total)
    }

    pub fn claimable(&self, creator: CreatorId) -> u128 {
        self.store.claims.balance(creator)
    }

    // ------------------------------------------------------------------
    // Quotes
    // ------------------------------------------------------------------

    pub fn get_buy_price(&self, creator: CreatorId, amount: u64) -> MarketResult<u128> {
        let pool = self.store.registry.get(creator)?;
        let price = pool.curve.buy_price(pool.supply, amount)?;
        debug!(creator = %creator, amount, price, "buy quote");
        Ok(price)
    }

    pub fn get_sell_price(&self, creator: CreatorId, amount: u64) -> MarketResult<u128> {
        let pool = self.store.registry.get(creator)?;
        let price = pool.curve.sell_price(pool.supply, amount)?;
        debug!(creator = %creator, amount, price, "sell quote");
        Ok(price)
    }

    /// Payment a buy of `amount` requires, fees included
    pub fn get_buy_price_after_fee(&self, creator: CreatorId, amount: u64) -> MarketResult<u128> {
        let base = self.get_buy_price(creator, amount)?;
        self.store.fees.split_buy(base)?.buy_total()
    }

    /// Proceeds a sell of `amount` returns, fees deducted
    pub fn get_sell_price_after_fee(&self, creator: CreatorId, amount: u64) -> MarketResult<u128> {
        let base = self.get_sell_price(creator, amount)?;
        self.store.fees.split_sell(base)?.sell_proceeds()
    }

    // ------------------------------------------------------------------
    // Governance
    // ------------------------------------------------------------------

    fn only_owner(&self, caller: Address) -> MarketResult<()> {
        if caller != self.store.owner {
            return Err(MarketError::NotOwner);
        }
        Ok(())
    }

    fn ensure_open(&self) -> MarketResult<()> {
        if !self.store.open {
            return Err(MarketError::OpenNotInit);
        }
        Ok(())
    }

    pub fn set_protocol_buy_fee_percent(&mut self, caller: Address, percent: u128) -> MarketResult<()> {
        self.only_owner(caller)?;
        check_percent(percent)?;
        self.store.fees.protocol_buy_fee_percent = percent;
        info!(percent, "protocol buy fee updated");
        Ok(())
    }

    pub fn set_protocol_sell_fee_percent(&mut self, caller: Address, percent: u128) -> MarketResult<()> {
        self.only_owner(caller)?;
        check_percent(percent)?;
        self.store.fees.protocol_sell_fee_percent = percent;
        info!(percent, "protocol sell fee updated");
        Ok(())
    }

    pub fn set_creator_buy_fee_percent(&mut self, caller: Address, percent: u128) -> MarketResult<()> {
        self.only_owner(caller)?;
        check_percent(percent)?;
        self.store.fees.creator_buy_fee_percent = percent;
        info!(percent, "creator buy fee updated");
        Ok(())
    }

    pub fn set_creator_sell_fee_percent(&mut self, caller: Address, percent: u128) -> MarketResult<()> {
        self.only_owner(caller)?;
        check_percent(percent)?;
        self.store.fees.creator_sell_fee_percent = percent;
        info!(percent, "creator sell fee updated");
        Ok(())
    }

    pub fn set_fee_destination(&mut self, caller: Address, destination: Address) -> MarketResult<()> {
        self.only_owner(caller)?;
        self.store.fees.fee_destination = destination;
        info!(destination = %destination, "fee destination updated");
        Ok(())
    }

    pub fn set_open_init(&mut self, caller: Address, open: bool) -> MarketResult<()> {
        self.only_owner(caller)?;
        self.store.open = open;
        info!(open, "market open flag updated");
        Ok(())
    }

    pub fn transfer_ownership(&mut self, caller: Address, new_owner: Address) -> MarketResult<()> {
        self.only_owner(caller)?;
        if new_owner.is_zero() {
            return Err(MarketError::ZeroAddress("owner"));
        }
        self.store.owner = new_owner;
        info!(previous = %caller, owner = %new_owner, "ownership transferred");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn owner(&self) -> Address {
        self.store.owner
    }

    pub fn is_open(&self) -> bool {
        self.store.open
    }

    pub fn fee_config(&self) -> &FeeConfig {
        &self.store.fees
    }

    pub fn pool(&self, creator: CreatorId) -> MarketResult<&Pool> {
        self.store.registry.get(creator)
    }

    pub fn supply_of(&self, creator: CreatorId) -> MarketResult<u64> {
        Ok(self.store.registry.get(creator)?.supply)
    }

    pub fn store(&self) -> &MarketStore {
        &self.store
    }

    pub fn custody(&self) -> &C {
        &self.custody
    }

    pub fn custody_mut(&mut self) -> &mut C {
        &mut self.custody
    }

    pub fn identity_mut(&mut self) -> &mut I {
        &mut self.identity
    }

    pub fn funds(&self) -> &F {
        &self.funds
    }
}
