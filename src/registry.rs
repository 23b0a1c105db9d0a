//! Pool Registry
//!
//! Every creator profile may open exactly one key pool. The registry owns
//! all pool records; the market reads and replaces them through it.

use crate::curve::Curve;
use crate::error::{MarketError, MarketResult};
use crate::identity::IdentityResolver;
use crate::CreatorId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Pricing and supply state of one creator's keys
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    pub creator: CreatorId,
    pub supply: u64,
    pub curve: Curve,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PoolRegistry {
    pools: BTreeMap<CreatorId, Pool>,
}

impl PoolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks that `creator` may open a pool with `curve`, without inserting
    pub fn check_create(
        &self,
        creator: CreatorId,
        curve: &Curve,
        resolver: &dyn IdentityResolver,
    ) -> MarketResult<()> {
        if resolver.resolve_owner(creator).is_none() {
            return Err(MarketError::CreatorCanNotBeZero(creator));
        }
        if self.exists(creator) {
            return Err(MarketError::PoolCreated(creator));
        }
        curve.validate()
    }

    /// Opens an empty pool for `creator`
    pub fn create(
        &mut self,
        creator: CreatorId,
        curve: Curve,
        resolver: &dyn IdentityResolver,
    ) -> MarketResult<&Pool> {
        self.check_create(creator, &curve, resolver)?;
        Ok(self.pools.entry(creator).or_insert(Pool {
            creator,
            supply: 0,
            curve,
        }))
    }

    pub fn exists(&self, creator: CreatorId) -> bool {
        self.pools.contains_key(&creator)
    }

    pub fn get(&self, creator: CreatorId) -> MarketResult<&Pool> {
        self.pools
            .get(&creator)
            .ok_or(MarketError::PoolNotExist(creator))
    }

    /// Replaces an existing pool record
    pub fn replace(&mut self, pool: Pool) -> MarketResult<()> {
        match self.pools.get_mut(&pool.creator) {
            Some(slot) => {
                *slot = pool;
                Ok(())
            }
            None => Err(MarketError::PoolNotExist(pool.creator)),
        }
    }

    /// Inserts a pool that already passed `check_create`
    pub(crate) fn insert(&mut self, pool: Pool) {
        self.pools.insert(pool.creator, pool);
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pool> {
        self.pools.values()
    }
}
