//! Utility modules for the lendpool ledger.
//!
//! This module contains shared utilities used across the ledger:
//! - Account and asset identities
//! - Fixed-point arithmetic
//! - Time sources
//! - Constants

pub mod address;
pub mod constants;
pub mod math;
pub mod time;

pub use address::{Address, AssetId};
pub use constants::*;
pub use math::*;
pub use time::{Clock, ManualClock, SystemClock};
