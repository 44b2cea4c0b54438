//! # lendpool
//!
//! Accounting core of a multi-asset, over-collateralized lending pool.
//! Accounts supply assets to earn interest, borrow other assets against
//! their supplied collateral, and undercollateralized positions can be
//! liquidated by third parties for a penalty bonus.
//!
//! ## Architecture
//!
//! The ledger consists of several core modules:
//!
//! - **Core**: Asset registry, rate model, share accounting and the pool
//! - **Liquidation**: Atomic repay-and-seize liquidation engine
//! - **Protocol**: Events emitted for every committed state change
//! - **Utils**: Addresses, WAD fixed-point math, clocks and constants
//!
//! Amounts and prices are WAD-scaled (`10^18`) integers; rates and risk
//! parameters are basis points. Prices are supplied by the caller on every
//! valuation as one entry per allowed asset, in registry order.
//!
//! ## Example
//!
//! ```rust,ignore
//! use lendpool::prelude::*;
//!
//! let mut pool = LedgerPool::from_config(&MarketConfig::default(), InMemoryTokens::new(), SystemClock)?;
//! pool.deposit(&alice, weth, 10 * WAD)?;
//! pool.borrow(&alice, usdc, 5_000 * WAD, &[3_000 * WAD, WAD])?;
//! let health = pool.health_factor(&alice, &[3_000 * WAD, WAD])?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    trivial_casts,
    unused_lifetimes,
    unused_qualifications
)]

pub mod core;
pub mod error;
pub mod liquidation;
pub mod protocol;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::core::{
        admin::AdminController,
        config::{AssetListing, MarketConfig},
        health::{AccountSummary, HealthFactor},
        ledger::{LedgerState, TokenState, UserPosition},
        pool::LedgerPool,
        rates::{InterestRateModel, RateParams},
        registry::{AssetConfig, AssetRegistry},
        shares::SharePool,
        token::{InMemoryTokens, TokenTransfer},
    };
    pub use crate::error::{Error, Result};
    pub use crate::liquidation::engine::{LiquidationEngine, LiquidationRequest};
    pub use crate::protocol::events::{EventLog, ProtocolEvent};
    pub use crate::utils::{
        address::{Address, AssetId},
        constants::{BPS_DIVISOR, HEALTH_FACTOR_MAX, WAD},
        time::{Clock, ManualClock, SystemClock},
    };
}

/// Ledger version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Ledger name
pub const PROTOCOL_NAME: &str = "lendpool";
