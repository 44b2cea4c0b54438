//! Ledger state.
//!
//! Per-asset market totals and per-account share positions. This is the
//! state that gets checkpointed, snapshotted and hashed; configuration lives
//! in the registry and the rate model.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

use crate::core::rates::utilization;
use crate::core::shares::SharePool;
use crate::error::{Error, Result};
use crate::utils::address::{Address, AssetId};
use crate::utils::constants::{BPS_DIVISOR, MIN_ACCRUAL_INTERVAL_SECS};
use crate::utils::math::mul_div;

// ═══════════════════════════════════════════════════════════════════════════════
// TOKEN STATE
// ═══════════════════════════════════════════════════════════════════════════════

/// Market totals of one asset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenState {
    /// Supplied principal and supply shares
    pub supply: SharePool,
    /// Borrowed principal and borrow shares
    pub borrow: SharePool,
    /// Last supply-side accrual (unix seconds)
    pub last_supply_accrue_time: u64,
    /// Last borrow-side accrual (unix seconds)
    pub last_borrow_accrue_time: u64,
}

impl TokenState {
    /// Fresh market whose accrual clocks start at `now`
    pub fn new(now: u64) -> Self {
        Self {
            last_supply_accrue_time: now,
            last_borrow_accrue_time: now,
            ..Self::default()
        }
    }

    /// Total deposits including accrued interest
    pub fn total_deposits(&self) -> u128 {
        self.supply.principal()
    }

    /// Total supply shares
    pub fn total_supply_shares(&self) -> u128 {
        self.supply.shares()
    }

    /// Total borrows including accrued interest
    pub fn total_borrows(&self) -> u128 {
        self.borrow.principal()
    }

    /// Total borrow shares
    pub fn total_borrow_shares(&self) -> u128 {
        self.borrow.shares()
    }

    /// Deposits not currently lent out
    pub fn available_liquidity(&self) -> u128 {
        self.total_deposits().saturating_sub(self.total_borrows())
    }

    /// Current utilization (bps)
    pub fn utilization(&self) -> u64 {
        utilization(self.total_borrows(), self.total_deposits())
    }

    /// Apply supply interest at `rate_bps` up to `now`; returns the interest added
    pub fn accrue_supply(&mut self, rate_bps: u64, now: u64, seconds_per_year: u64) -> u128 {
        let elapsed = now.saturating_sub(self.last_supply_accrue_time);
        self.last_supply_accrue_time = self.last_supply_accrue_time.max(now);
        if elapsed < MIN_ACCRUAL_INTERVAL_SECS {
            return 0;
        }
        let interest = simple_interest(self.supply.principal(), rate_bps, elapsed, seconds_per_year);
        self.supply.accrue(interest);
        interest
    }

    /// Apply borrow interest at `rate_bps` up to `now`; returns the interest added
    pub fn accrue_borrow(&mut self, rate_bps: u64, now: u64, seconds_per_year: u64) -> u128 {
        let elapsed = now.saturating_sub(self.last_borrow_accrue_time);
        self.last_borrow_accrue_time = self.last_borrow_accrue_time.max(now);
        if elapsed < MIN_ACCRUAL_INTERVAL_SECS {
            return 0;
        }
        let interest = simple_interest(self.borrow.principal(), rate_bps, elapsed, seconds_per_year);
        self.borrow.accrue(interest);
        interest
    }
}

/// `principal * rate * elapsed / (10000 * year)`; zero if it cannot be computed
fn simple_interest(principal: u128, rate_bps: u64, elapsed: u64, seconds_per_year: u64) -> u128 {
    if principal == 0 || rate_bps == 0 {
        return 0;
    }
    let numerator = rate_bps as u128 * elapsed as u128;
    let denominator = BPS_DIVISOR as u128 * seconds_per_year.max(1) as u128;
    mul_div(principal, numerator, denominator).unwrap_or(0)
}

// ═══════════════════════════════════════════════════════════════════════════════
// USER POSITION
// ═══════════════════════════════════════════════════════════════════════════════

/// Shares an account holds in one asset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPosition {
    /// Supply shares
    pub supply_shares: u128,
    /// Borrow shares
    pub borrow_shares: u128,
}

impl UserPosition {
    /// Whether the position holds nothing
    pub fn is_empty(&self) -> bool {
        self.supply_shares == 0 && self.borrow_shares == 0
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// LEDGER STATE
// ═══════════════════════════════════════════════════════════════════════════════

/// Mutable state of the whole ledger
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerState {
    /// Market totals by asset
    tokens: HashMap<AssetId, TokenState>,
    /// Positions by account then asset
    positions: HashMap<Address, HashMap<AssetId, UserPosition>>,
}

impl LedgerState {
    /// Create empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Market totals of an asset
    pub fn token(&self, asset: &AssetId) -> Option<&TokenState> {
        self.tokens.get(asset)
    }

    /// Replace the market totals of an asset
    pub fn put_token(&mut self, asset: AssetId, token: TokenState) {
        self.tokens.insert(asset, token);
    }

    /// Initialize a market at `now` if it does not exist yet
    pub fn init_token(&mut self, asset: AssetId, now: u64) -> bool {
        if self.tokens.contains_key(&asset) {
            return false;
        }
        self.tokens.insert(asset, TokenState::new(now));
        true
    }

    /// Position of an account in an asset (empty if none)
    pub fn position(&self, user: &Address, asset: &AssetId) -> UserPosition {
        self.positions
            .get(user)
            .and_then(|p| p.get(asset))
            .copied()
            .unwrap_or_default()
    }

    /// Replace a position; records are kept once shares reach zero
    pub fn set_position(&mut self, user: Address, asset: AssetId, position: UserPosition) {
        self.positions.entry(user).or_default().insert(asset, position);
    }

    /// Accounts that have ever held a position
    pub fn accounts(&self) -> impl Iterator<Item = &Address> {
        self.positions.keys()
    }

    /// Number of accounts that have ever held a position
    pub fn account_count(&self) -> usize {
        self.positions.len()
    }

    /// Supply balance of an account, rounded down
    pub fn balance_of(&self, asset: &AssetId, user: &Address) -> u128 {
        match self.token(asset) {
            Some(token) => token
                .supply
                .principal_for_shares(self.position(user, asset).supply_shares),
            None => 0,
        }
    }

    /// Debt of an account, rounded down
    pub fn debt_of(&self, asset: &AssetId, user: &Address) -> u128 {
        match self.token(asset) {
            Some(token) => token
                .borrow
                .principal_for_shares(self.position(user, asset).borrow_shares),
            None => 0,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // INVARIANTS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Check share conservation for every market
    pub fn verify_invariants(&self) -> Result<()> {
        let mut supply_sums: HashMap<AssetId, u128> = HashMap::new();
        let mut borrow_sums: HashMap<AssetId, u128> = HashMap::new();

        for positions in self.positions.values() {
            for (asset, position) in positions {
                let supply = supply_sums.entry(*asset).or_default();
                *supply = supply.saturating_add(position.supply_shares);
                let borrow = borrow_sums.entry(*asset).or_default();
                *borrow = borrow.saturating_add(position.borrow_shares);
            }
        }

        for (asset, token) in &self.tokens {
            let supply = supply_sums.remove(asset).unwrap_or(0);
            if supply != token.total_supply_shares() {
                return Err(Error::InvariantViolation(format!(
                    "{}: supply shares held {} != total {}",
                    asset,
                    supply,
                    token.total_supply_shares()
                )));
            }
            let borrow = borrow_sums.remove(asset).unwrap_or(0);
            if borrow != token.total_borrow_shares() {
                return Err(Error::InvariantViolation(format!(
                    "{}: borrow shares held {} != total {}",
                    asset,
                    borrow,
                    token.total_borrow_shares()
                )));
            }
        }

        let orphaned = supply_sums
            .iter()
            .chain(borrow_sums.iter())
            .find(|(_, shares)| **shares > 0);
        if let Some((asset, _)) = orphaned {
            return Err(Error::InvariantViolation(format!(
                "positions held in unknown market {}",
                asset
            )));
        }

        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // SERIALIZATION
    // ═══════════════════════════════════════════════════════════════════════════

    /// Serialize to bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(|e| Error::Deserialization(e.to_string()))
    }

    /// SHA-256 over markets and positions in sorted order
    pub fn state_hash(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();

        let mut tokens: Vec<_> = self.tokens.iter().collect();
        tokens.sort_by_key(|(asset, _)| **asset);
        for (asset, token) in tokens {
            hasher.update(asset.as_bytes());
            hasher.update(token.total_deposits().to_be_bytes());
            hasher.update(token.total_supply_shares().to_be_bytes());
            hasher.update(token.total_borrows().to_be_bytes());
            hasher.update(token.total_borrow_shares().to_be_bytes());
            hasher.update(token.last_supply_accrue_time.to_be_bytes());
            hasher.update(token.last_borrow_accrue_time.to_be_bytes());
        }

        let mut positions: Vec<_> = self
            .positions
            .iter()
            .flat_map(|(user, p)| p.iter().map(move |(asset, pos)| (*user, *asset, *pos)))
            .collect();
        positions.sort_by_key(|(user, asset, _)| (*user, *asset));
        for (user, asset, position) in positions {
            hasher.update(user.as_bytes());
            hasher.update(asset.as_bytes());
            hasher.update(position.supply_shares.to_be_bytes());
            hasher.update(position.borrow_shares.to_be_bytes());
        }

        hasher.finalize().into()
    }
}
