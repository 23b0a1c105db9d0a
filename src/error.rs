//! Market errors
//!
//! Every failure aborts the whole operation; nothing is partially applied.

use crate::{CreatorId, UnitId};
use thiserror::Error;

/// Coarse classification of a [`MarketError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input: unknown creator, duplicate pool, malformed parameters
    Validation,
    /// Supplied payment does not cover the trade
    Payment,
    /// Sell proceeds fell below the caller's bound
    Range,
    /// Caller lacks the required ownership or approval
    Auth,
    /// Operation not allowed in the current market state
    State,
    /// Checked arithmetic failed or a curve left its valid range
    Arithmetic,
    /// A collaborator (custody, funds) failed
    External,
}

/// Error during market operations
#[derive(Error, Debug)]
pub enum MarketError {
    #[error("Creator can not be zero: {0} has no owner")]
    CreatorCanNotBeZero(CreatorId),

    #[error("Pool already created for creator {0}")]
    PoolCreated(CreatorId),

    #[error("Pool of creator {0} does not exist")]
    PoolNotExist(CreatorId),

    #[error("Invalid curve params: {0}")]
    InvalidCurveParams(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Zero address not allowed as {0}")]
    ZeroAddress(&'static str),

    #[error("Invalid fee percent: {0} exceeds 100%")]
    InvalidFeePercent(u128),

    #[error("Duplicate unit in sell: {0}")]
    DuplicateUnit(UnitId),

    #[error("Units belong to different pools: {0} and {1}")]
    MixedPools(CreatorId, CreatorId),

    #[error("Insufficient payment: have {have}, need {need}")]
    InsufficientPayment { have: u128, need: u128 },

    #[error("Price not in range: proceeds {proceeds} below minimum {min}")]
    PriceNotInRange { proceeds: u128, min: u128 },

    #[error("Caller is not the owner")]
    NotOwner,

    #[error("Caller is not owner or approved for unit {0}")]
    NotOwnerOrApproved(UnitId),

    #[error("Caller is not the owner of creator {0}")]
    NotCreatorOwner(CreatorId),

    #[error("Market is not open")]
    OpenNotInit,

    #[error("Zero claimable")]
    ZeroClaimable,

    #[error("Empty sell")]
    EmptySell,

    #[error("Insufficient shares: supply {supply}, requested {requested}")]
    InsufficientShares { supply: u64, requested: u64 },

    #[error("Supply floor reached: selling {requested} of {supply} would go below {floor}")]
    SupplyFloor { supply: u64, requested: u64, floor: u64 },

    #[error("Supply cap exceeded: max {max}, would have {would_have}")]
    SupplyCapExceeded { max: u64, would_have: u128 },

    #[error("Arithmetic overflow")]
    Overflow,

    #[error("Curve price below zero at supply {0}")]
    CurveUnderflow(u64),

    #[error("Custody failure: {0}")]
    Custody(anyhow::Error),

    #[error("Settlement failure: {0}")]
    Settlement(anyhow::Error),
}

impl MarketError {
    pub fn kind(&self) -> ErrorKind {
        use MarketError::*;
        match self {
            CreatorCanNotBeZero(_)
            | PoolCreated(_)
            | PoolNotExist(_)
            | InvalidCurveParams(_)
            | InvalidAmount(_)
            | ZeroAddress(_)
            | InvalidFeePercent(_)
            | DuplicateUnit(_)
            | MixedPools(..) => ErrorKind::Validation,
            InsufficientPayment { .. } => ErrorKind::Payment,
            PriceNotInRange { .. } => ErrorKind::Range,
            NotOwner | NotOwnerOrApproved(_) | NotCreatorOwner(_) => ErrorKind::Auth,
            OpenNotInit
            | ZeroClaimable
            | EmptySell
            | InsufficientShares { .. }
            | SupplyFloor { .. } => ErrorKind::State,
            SupplyCapExceeded { .. } | Overflow | CurveUnderflow(_) => ErrorKind::Arithmetic,
            Custody(_) | Settlement(_) => ErrorKind::External,
        }
    }
}

/// Result type for market operations
pub type MarketResult<T> = Result<T, MarketError>;

/// Converts a checked arithmetic result into a market result
pub fn overflow<T>(value: Option<T>) -> MarketResult<T> {
    value.ok_or(MarketError::Overflow)
}
