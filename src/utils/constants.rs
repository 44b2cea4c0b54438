//! Protocol constants and magic numbers.
//!
//! All protocol-wide constants are defined here for easy auditing and modification.

// ═══════════════════════════════════════════════════════════════════════════════
// FIXED-POINT SCALES
// ═══════════════════════════════════════════════════════════════════════════════

/// WAD scale (10^18) for amounts, prices and ratios
pub const WAD: u128 = 1_000_000_000_000_000_000;

/// Basis points divisor (10000 = 100%)
pub const BPS_DIVISOR: u64 = 10_000;

/// One basis point expressed in WAD (10^14)
pub const WAD_PER_BPS: u128 = WAD / BPS_DIVISOR as u128;

// ═══════════════════════════════════════════════════════════════════════════════
// RISK PARAMETERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Maximum liquidation penalty - 20% (2000 basis points)
pub const MAX_LIQUIDATION_PENALTY_BPS: u64 = 2_000;

/// Health factor returned for accounts without debt
pub const HEALTH_FACTOR_MAX: u128 = u128::MAX;

// ═══════════════════════════════════════════════════════════════════════════════
// TIME CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Seconds in a 365-day year, the default accrual period
pub const SECONDS_PER_YEAR: u64 = 365 * 24 * 3600;

/// Accrual is skipped when less than this many seconds elapsed
pub const MIN_ACCRUAL_INTERVAL_SECS: u64 = 1;

// ═══════════════════════════════════════════════════════════════════════════════
// BOOKKEEPING
// ═══════════════════════════════════════════════════════════════════════════════

/// Default number of events kept in memory
pub const DEFAULT_MAX_EVENTS: usize = 1000;

/// Length of an address in bytes
pub const ADDRESS_LENGTH: usize = 20;
