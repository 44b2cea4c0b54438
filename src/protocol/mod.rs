//! Protocol module - event notifications emitted by the ledger.

pub mod events;

pub use events::*;
