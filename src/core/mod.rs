//! Core modules for the lending ledger.
//!
//! This module contains the fundamental building blocks:
//! - Administrator capability, asset registry and market configuration
//! - Interest rate model and share-based accounting
//! - Ledger state, health factors and the lending pool
//! - Token transfer backend

pub mod admin;
pub mod config;
pub mod health;
pub mod ledger;
pub mod pool;
pub mod rates;
pub mod registry;
pub mod shares;
pub mod token;

pub use admin::*;
pub use config::*;
pub use health::*;
pub use ledger::*;
pub use pool::*;
pub use rates::*;
pub use registry::*;
pub use shares::*;
pub use token::*;
