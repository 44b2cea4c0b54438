//! Share-based accounting.
//!
//! Both the supply side and the borrow side of a market are a pool of
//! principal divided into shares. Interest grows the principal without
//! minting shares, so every holder's claim grows proportionally.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::utils::constants::WAD;
use crate::utils::math::{mul_div, mul_div_up, safe_add, safe_sub};

/// Principal and outstanding shares of one side of a market
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharePool {
    /// Total underlying amount, interest included
    principal: u128,
    /// Total shares outstanding
    shares: u128,
}

impl SharePool {
    /// Create an empty pool
    pub fn new() -> Self {
        Self::default()
    }

    /// Total underlying amount
    pub fn principal(&self) -> u128 {
        self.principal
    }

    /// Total shares outstanding
    pub fn shares(&self) -> u128 {
        self.shares
    }

    /// Whether no shares are outstanding
    pub fn is_empty(&self) -> bool {
        self.shares == 0
    }

    /// Underlying per share (WAD); one while the pool is empty
    pub fn exchange_rate(&self) -> u128 {
        if self.shares == 0 {
            return WAD;
        }
        mul_div(self.principal, WAD, self.shares).unwrap_or(u128::MAX)
    }

    /// Shares issued for adding `amount` (1:1 into an empty pool)
    pub fn deposit_for_shares(&self, amount: u128) -> Result<u128> {
        if self.shares == 0 || self.principal == 0 {
            return Ok(amount);
        }
        mul_div(amount, self.shares, self.principal)
    }

    /// Shares retired for removing `amount`, rounded down
    pub fn shares_for_principal(&self, amount: u128) -> Result<u128> {
        if self.principal == 0 {
            return Ok(0);
        }
        mul_div(amount, self.shares, self.principal)
    }

    /// Shares retired for removing `amount`, rounded up
    pub fn shares_for_principal_up(&self, amount: u128) -> Result<u128> {
        if self.principal == 0 {
            return Ok(0);
        }
        mul_div_up(amount, self.shares, self.principal)
    }

    /// Underlying claim of `shares`, rounded down
    pub fn principal_for_shares(&self, shares: u128) -> u128 {
        if self.shares == 0 {
            return 0;
        }
        mul_div(shares, self.principal, self.shares).unwrap_or(0)
    }

    /// Add `amount` of principal and issue shares for it
    pub fn mint(&mut self, amount: u128) -> Result<u128> {
        let shares = self.deposit_for_shares(amount)?;
        if shares == 0 {
            return Err(Error::InvalidAmount);
        }
        self.principal = safe_add(self.principal, amount)?;
        self.shares = safe_add(self.shares, shares)?;
        Ok(shares)
    }

    /// Remove `amount` of principal and retire `shares`
    pub fn burn(&mut self, amount: u128, shares: u128) -> Result<()> {
        let principal = safe_sub(self.principal, amount)?;
        let remaining = safe_sub(self.shares, shares)?;
        self.principal = principal;
        self.shares = remaining;
        Ok(())
    }

    /// Grow principal by accrued interest
    pub fn accrue(&mut self, interest: u128) {
        self.principal = self.principal.saturating_add(interest);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_mint_is_one_to_one() {
        let mut pool = SharePool::new();
        assert_eq!(pool.mint(100 * WAD).unwrap(), 100 * WAD);
        assert_eq!(pool.exchange_rate(), WAD);
    }

    #[test]
    fn test_interest_grows_claims() {
        let mut pool = SharePool::new();
        let alice = pool.mint(100).unwrap();
        pool.accrue(10);
        let bob = pool.mint(110).unwrap();

        assert_eq!(bob, 100);
        assert_eq!(pool.principal_for_shares(alice), 110);
        assert_eq!(pool.principal_for_shares(bob), 110);
    }

    #[test]
    fn test_principal_without_shares_resets_rate() {
        let mut pool = SharePool::new();
        pool.accrue(50);
        assert_eq!(pool.mint(10).unwrap(), 10);
    }

    #[test]
    fn test_dust_mint_rejected() {
        let mut pool = SharePool::new();
        pool.mint(1).unwrap();
        pool.accrue(1_000);
        assert_eq!(pool.mint(1), Err(Error::InvalidAmount));
    }

    #[test]
    fn test_burn() {
        let mut pool = SharePool::new();
        let shares = pool.mint(100).unwrap();
        let half = pool.shares_for_principal(50).unwrap();
        pool.burn(50, half).unwrap();

        assert_eq!(pool.principal(), 50);
        assert_eq!(pool.shares(), shares - half);
        assert!(pool.burn(51, 0).is_err());
    }

    #[test]
    fn test_rounding_directions() {
        let mut pool = SharePool::new();
        pool.mint(200).unwrap();
        pool.accrue(50);

        // 1 unit is 0.8 shares at a 1.25 rate
        assert_eq!(pool.shares_for_principal(1).unwrap(), 0);
        assert_eq!(pool.shares_for_principal_up(1).unwrap(), 1);
        assert_eq!(pool.shares_for_principal_up(5).unwrap(), 4);
    }
}
