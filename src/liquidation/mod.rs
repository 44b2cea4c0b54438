//! Liquidation module for the lending ledger.
//!
//! This module handles liquidations of undercollateralized accounts:
//! - Discovery of accounts below a health factor of 1.0
//! - Atomic repay-and-seize execution with a penalty bonus
//! - Liquidation statistics and history

pub mod engine;

pub use engine::*;
