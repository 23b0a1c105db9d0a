//! Shared constants for the key market

// Fixed-point scales
pub const FEE_PRECISION: u128 = 1_000_000_000_000_000_000; // 1e18 = 100%
pub const CURVE_PRECISION: u128 = 100_000_000;              // 1e8 for a, b, c

// Fee defaults
pub const DEFAULT_FEE_PERCENT: u128 = 0;
pub const MAX_FEE_PERCENT: u128 = FEE_PRECISION;

// Supply
pub const DEFAULT_SUPPLY_FLOOR: u64 = 0;  // the last key may be sold
pub const FIRST_UNIT_ID: u64 = 0;
