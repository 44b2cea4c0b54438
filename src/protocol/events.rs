//! Ledger events for state change notifications.
//!
//! Events are emitted for every committed state change so that clients can
//! follow balances without re-reading the ledger. Events raised inside a
//! failed atomic operation are never published.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::core::rates::RateParams;
use crate::core::registry::AssetConfig;
use crate::utils::address::{Address, AssetId};
use crate::utils::constants::DEFAULT_MAX_EVENTS;

// ═══════════════════════════════════════════════════════════════════════════════
// EVENT TYPES
// ═══════════════════════════════════════════════════════════════════════════════

/// All ledger event types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProtocolEvent {
    // Account Events
    /// Funds supplied
    Deposit(BalanceEvent),
    /// Funds withdrawn
    Withdraw(BalanceEvent),
    /// Funds borrowed
    Borrow(BalanceEvent),
    /// Debt repaid
    Repay(RepayEvent),
    /// Undercollateralized position liquidated
    LiquidationExecuted(LiquidationExecutedEvent),

    // Administration Events
    /// Asset added to the allowed list
    AssetListed(AssetListedEvent),
    /// Asset risk configuration changed
    AssetConfigured(AssetConfiguredEvent),
    /// Rate curve changed
    RateParamsUpdated(RateParamsUpdatedEvent),
    /// Liquidation engine identity changed
    LiquidationEngineSet(LiquidationEngineSetEvent),
}

impl ProtocolEvent {
    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Deposit(_) => "Deposit",
            Self::Withdraw(_) => "Withdraw",
            Self::Borrow(_) => "Borrow",
            Self::Repay(_) => "Repay",
            Self::LiquidationExecuted(_) => "LiquidationExecuted",
            Self::AssetListed(_) => "AssetListed",
            Self::AssetConfigured(_) => "AssetConfigured",
            Self::RateParamsUpdated(_) => "RateParamsUpdated",
            Self::LiquidationEngineSet(_) => "LiquidationEngineSet",
        }
    }

    /// Get the timestamp of the event
    pub fn timestamp(&self) -> u64 {
        match self {
            Self::Deposit(e) | Self::Withdraw(e) | Self::Borrow(e) => e.timestamp,
            Self::Repay(e) => e.timestamp,
            Self::LiquidationExecuted(e) => e.timestamp,
            Self::AssetListed(e) => e.timestamp,
            Self::AssetConfigured(e) => e.timestamp,
            Self::RateParamsUpdated(e) => e.timestamp,
            Self::LiquidationEngineSet(e) => e.timestamp,
        }
    }

    /// Whether the event concerns `account`
    pub fn involves(&self, account: &Address) -> bool {
        match self {
            Self::Deposit(e) | Self::Withdraw(e) | Self::Borrow(e) => e.account == *account,
            Self::Repay(e) => e.borrower == *account || e.payer == *account,
            Self::LiquidationExecuted(e) => {
                e.borrower == *account || e.liquidator == *account
            }
            _ => false,
        }
    }

    /// Compute event hash
    pub fn hash(&self) -> [u8; 32] {
        let data = bincode::serialize(self).unwrap_or_default();
        Sha256::digest(&data).into()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ACCOUNT EVENTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Deposit, withdrawal or borrow by an account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceEvent {
    /// Asset moved
    pub asset: AssetId,
    /// Account
    pub account: Address,
    /// Amount moved
    pub amount: u128,
    /// Timestamp
    pub timestamp: u64,
}

/// Event emitted when debt is repaid
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepayEvent {
    /// Asset repaid
    pub asset: AssetId,
    /// Account whose debt shrank
    pub borrower: Address,
    /// Account that supplied the funds
    pub payer: Address,
    /// Amount actually applied
    pub amount: u128,
    /// Timestamp
    pub timestamp: u64,
}

/// Event emitted when a position is liquidated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidationExecutedEvent {
    /// Liquidated account
    pub borrower: Address,
    /// Account that repaid and received collateral
    pub liquidator: Address,
    /// Asset repaid
    pub repay_asset: AssetId,
    /// Collateral seized
    pub collateral_asset: AssetId,
    /// Debt repaid
    pub repay_amount: u128,
    /// Collateral transferred to the liquidator
    pub seized_amount: u128,
    /// Health factor before liquidation (WAD)
    pub health_factor: u128,
    /// Timestamp
    pub timestamp: u64,
}

// ═══════════════════════════════════════════════════════════════════════════════
// ADMINISTRATION EVENTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Event emitted when an asset is allowed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetListedEvent {
    /// Asset
    pub asset: AssetId,
    /// Position in the price vector
    pub index: usize,
    /// Timestamp
    pub timestamp: u64,
}

/// Event emitted when an asset config is set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetConfiguredEvent {
    /// Asset
    pub asset: AssetId,
    /// New configuration
    pub config: AssetConfig,
    /// Timestamp
    pub timestamp: u64,
}

/// Event emitted when a rate curve is set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateParamsUpdatedEvent {
    /// Asset
    pub asset: AssetId,
    /// New curve
    pub params: RateParams,
    /// Timestamp
    pub timestamp: u64,
}

/// Event emitted when the liquidation engine changes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidationEngineSetEvent {
    /// Previous engine, if any
    pub previous: Option<Address>,
    /// New engine
    pub engine: Address,
    /// Timestamp
    pub timestamp: u64,
}

// ═══════════════════════════════════════════════════════════════════════════════
// EVENT LOG
// ═══════════════════════════════════════════════════════════════════════════════

/// Bounded log of published events, oldest pruned first
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLog {
    events: Vec<ProtocolEvent>,
    max_events: usize,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLog {
    /// Create a new empty event log
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_EVENTS)
    }

    /// Create a log keeping at most `max_events`
    pub fn with_capacity(max_events: usize) -> Self {
        Self {
            events: Vec::new(),
            max_events: max_events.max(1),
        }
    }

    /// Add an event (with pruning)
    pub fn push(&mut self, event: ProtocolEvent) {
        self.events.push(event);

        if self.events.len() > self.max_events {
            self.events.drain(0..self.events.len() - self.max_events);
        }
    }

    /// Get all events
    pub fn events(&self) -> &[ProtocolEvent] {
        &self.events
    }

    /// Get events of a specific type
    pub fn filter_by_type(&self, event_type: &str) -> Vec<&ProtocolEvent> {
        self.events
            .iter()
            .filter(|e| e.event_type() == event_type)
            .collect()
    }

    /// Get events concerning an account
    pub fn for_account(&self, account: &Address) -> Vec<&ProtocolEvent> {
        self.events.iter().filter(|e| e.involves(account)).collect()
    }

    /// Get the number of events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Maximum number of events kept
    pub fn capacity(&self) -> usize {
        self.max_events
    }

    /// Take all events out of the log
    pub fn drain(&mut self) -> Vec<ProtocolEvent> {
        std::mem::take(&mut self.events)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn deposit(amount: u128, timestamp: u64) -> ProtocolEvent {
        ProtocolEvent::Deposit(BalanceEvent {
            asset: Address::from_low_u64(10),
            account: Address::from_low_u64(1),
            amount,
            timestamp,
        })
    }

    #[test]
    fn test_event_types() {
        let event = deposit(5, 1234567890);
        assert_eq!(event.event_type(), "Deposit");
        assert_eq!(event.timestamp(), 1234567890);
        assert!(event.involves(&Address::from_low_u64(1)));
        assert!(!event.involves(&Address::from_low_u64(2)));
    }

    #[test]
    fn test_event_log_pruning() {
        let mut log = EventLog::with_capacity(3);
        for i in 0..5 {
            log.push(deposit(i, i as u64));
        }

        assert_eq!(log.len(), 3);
        assert_eq!(log.events()[0].timestamp(), 2);
    }

    #[test]
    fn test_event_log_filters() {
        let mut log = EventLog::new();
        log.push(deposit(1, 1));
        log.push(ProtocolEvent::Repay(RepayEvent {
            asset: Address::from_low_u64(10),
            borrower: Address::from_low_u64(3),
            payer: Address::from_low_u64(4),
            amount: 1,
            timestamp: 2,
        }));

        assert_eq!(log.filter_by_type("Repay").len(), 1);
        assert_eq!(log.for_account(&Address::from_low_u64(4)).len(), 1);

        let drained = log.drain();
        assert_eq!(drained.len(), 2);
        assert!(log.is_empty());
    }

    #[test]
    fn test_event_hash() {
        let event = deposit(5, 1);
        assert_eq!(event.hash(), event.hash());
        assert_ne!(event.hash(), deposit(6, 1).hash());
    }
}
