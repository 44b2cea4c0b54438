//! Error types for the lendpool ledger.
//!
//! Every failure aborts the whole operation before any state is committed,
//! so each variant carries enough detail (asset, requested and available
//! figures) for a caller to decide whether to retry with other parameters.

use thiserror::Error;

use crate::utils::address::{Address, AssetId};

/// Result type alias for lendpool operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the lending ledger
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // ═══════════════════════════════════════════════════════════════════
    // Validation Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Amount is zero
    #[error("Amount must be greater than zero")]
    InvalidAmount,

    /// Asset has never been allowed by the administrator
    #[error("Asset {0} is not allowed")]
    TokenNotAllowed(AssetId),

    /// Price vector does not line up with the registry
    #[error("Invalid price vector length: expected {expected}, got {got}")]
    InvalidPriceVectorLength {
        /// Number of allowed assets
        expected: usize,
        /// Number of prices supplied
        got: usize,
    },

    /// The zero address was supplied where a real identity is required
    #[error("Invalid address: {0}")]
    InvalidAddress(Address),

    // ═══════════════════════════════════════════════════════════════════
    // Ledger Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Deposit would breach the supply cap
    #[error("Supply cap exceeded for {asset}: total after deposit {requested}, cap {cap}")]
    CapExceeded {
        /// Asset being deposited
        asset: AssetId,
        /// Total deposits after the operation
        requested: u128,
        /// Configured supply cap
        cap: u128,
    },

    /// Borrow would breach the borrow cap
    #[error("Borrow cap exceeded for {asset}: total after borrow {requested}, cap {cap}")]
    ExceedsBorrowCap {
        /// Asset being borrowed
        asset: AssetId,
        /// Total borrows after the operation
        requested: u128,
        /// Configured borrow cap
        cap: u128,
    },

    /// Account balance is below the requested amount
    #[error("Insufficient balance of {asset}: requested {requested}, available {available}")]
    InsufficientBalance {
        /// Asset being withdrawn or seized
        asset: AssetId,
        /// Requested amount
        requested: u128,
        /// Current balance
        available: u128,
    },

    /// Pool does not hold enough unborrowed funds
    #[error("Insufficient liquidity of {asset}: requested {requested}, available {available}")]
    InsufficientLiquidity {
        /// Asset being borrowed
        asset: AssetId,
        /// Requested amount
        requested: u128,
        /// Available liquidity
        available: u128,
    },

    /// Borrow would exceed the account's loan-to-value capacity
    #[error("Borrow exceeds collateral limit: requested value {requested_value}, remaining capacity {available_value}")]
    ExceedsCollateralLimit {
        /// USD value (WAD) of the requested borrow
        requested_value: u128,
        /// Remaining USD borrowing capacity (WAD)
        available_value: u128,
    },

    /// Account holds no debt in the asset
    #[error("Nothing to repay: {account} has no {asset} debt")]
    NothingToRepay {
        /// Asset being repaid
        asset: AssetId,
        /// Account without debt
        account: Address,
    },

    // ═══════════════════════════════════════════════════════════════════
    // Liquidation Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Position is solvent and cannot be liquidated
    #[error("Position of {account} is healthy (health factor {health_factor})")]
    HealthyPosition {
        /// Borrower
        account: Address,
        /// Current health factor (WAD)
        health_factor: u128,
    },

    /// Repay asset is not allowed
    #[error("Invalid repay token: {0}")]
    InvalidRepayToken(AssetId),

    /// Collateral asset is not allowed
    #[error("Invalid collateral token: {0}")]
    InvalidCollateralToken(AssetId),

    /// Price of zero supplied where a conversion needs it
    #[error("Price of {0} is zero")]
    ZeroPrice(AssetId),

    // ═══════════════════════════════════════════════════════════════════
    // Transfer Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Token backend rejected a transfer
    #[error("Transfer of {amount} {asset} from {from} to {to} failed: {reason}")]
    TransferFailed {
        /// Asset being moved
        asset: AssetId,
        /// Sender
        from: Address,
        /// Recipient
        to: Address,
        /// Amount
        amount: u128,
        /// Backend reason
        reason: String,
    },

    // ═══════════════════════════════════════════════════════════════════
    // Authorization Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Caller lacks the required role
    #[error("Not authorized: {0}")]
    Unauthorized(String),

    // ═══════════════════════════════════════════════════════════════════
    // Configuration Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Asset or rate configuration violates registry invariants
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Configuration file could not be read or written
    #[error("Config I/O error: {0}")]
    ConfigIo(String),

    // ═══════════════════════════════════════════════════════════════════
    // Arithmetic Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Overflow in calculation
    #[error("Arithmetic overflow in {operation}")]
    Overflow {
        /// Operation that overflowed
        operation: String,
    },

    /// Underflow in calculation
    #[error("Arithmetic underflow in {operation}")]
    Underflow {
        /// Operation that underflowed
        operation: String,
    },

    // ═══════════════════════════════════════════════════════════════════
    // Serialization Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Serialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization failed
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    // ═══════════════════════════════════════════════════════════════════
    // Internal Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Invariant violation detected
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
}

impl Error {
    /// Returns true if the caller may retry with adjusted parameters
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::CapExceeded { .. }
                | Error::ExceedsBorrowCap { .. }
                | Error::InsufficientBalance { .. }
                | Error::InsufficientLiquidity { .. }
                | Error::ExceedsCollateralLimit { .. }
                | Error::InvalidPriceVectorLength { .. }
                | Error::TransferFailed { .. }
        )
    }

    /// Returns true if this is a critical error requiring immediate attention
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            Error::InvariantViolation(_) | Error::Overflow { .. } | Error::Underflow { .. }
        )
    }

    /// Returns the error code for external systems
    pub fn code(&self) -> u32 {
        match self {
            // Validation errors: 1xxx
            Error::InvalidAmount => 1001,
            Error::TokenNotAllowed(_) => 1002,
            Error::InvalidPriceVectorLength { .. } => 1003,
            Error::InvalidAddress(_) => 1004,

            // Ledger errors: 2xxx
            Error::CapExceeded { .. } => 2001,
            Error::ExceedsBorrowCap { .. } => 2002,
            Error::InsufficientBalance { .. } => 2003,
            Error::InsufficientLiquidity { .. } => 2004,
            Error::ExceedsCollateralLimit { .. } => 2005,
            Error::NothingToRepay { .. } => 2006,
            Error::TransferFailed { .. } => 2007,

            // Liquidation errors: 3xxx
            Error::HealthyPosition { .. } => 3001,
            Error::InvalidRepayToken(_) => 3002,
            Error::InvalidCollateralToken(_) => 3003,
            Error::ZeroPrice(_) => 3004,

            // Authorization errors: 4xxx
            Error::Unauthorized(_) => 4001,

            // Configuration errors: 5xxx
            Error::InvalidConfig(_) => 5001,
            Error::ConfigIo(_) => 5002,

            // Arithmetic errors: 6xxx
            Error::Overflow { .. } => 6001,
            Error::Underflow { .. } => 6002,

            // Serialization errors: 7xxx
            Error::Serialization(_) => 7001,
            Error::Deserialization(_) => 7002,

            // Internal errors: 9xxx
            Error::InvariantViolation(_) => 9001,
        }
    }
}
