//! Token transfer backend.
//!
//! The ledger never owns token balances itself. It moves funds through a
//! [`TokenTransfer`] implementation:
//! - `transfer_from` pulls funds a caller approved to the pool
//! - `transfer` pays out of the pool custody account
//! - `approve` and `allowance` manage spending rights
//!
//! [`InMemoryTokens`] is the reference backend used by tests, the CLI demo
//! and benchmarks.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::utils::address::{Address, AssetId};

// ═══════════════════════════════════════════════════════════════════════════════
// TRANSFER INTERFACE
// ═══════════════════════════════════════════════════════════════════════════════

/// Fungible-token operations the ledger depends on
pub trait TokenTransfer {
    /// Move `amount` of `asset` owned by `from` to `to`
    fn transfer(&mut self, asset: &AssetId, from: &Address, to: &Address, amount: u128)
        -> Result<()>;

    /// Move `amount` from `from` to `to`, spending `spender`'s allowance
    fn transfer_from(
        &mut self,
        asset: &AssetId,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: u128,
    ) -> Result<()>;

    /// Set `spender`'s allowance over `owner`'s funds
    fn approve(
        &mut self,
        asset: &AssetId,
        owner: &Address,
        spender: &Address,
        amount: u128,
    ) -> Result<()>;

    /// Balance held by `owner`
    fn balance_of(&self, asset: &AssetId, owner: &Address) -> u128;

    /// Remaining allowance of `spender` over `owner`'s funds
    fn allowance(&self, asset: &AssetId, owner: &Address, spender: &Address) -> u128;
}

// ═══════════════════════════════════════════════════════════════════════════════
// IN-MEMORY BACKEND
// ═══════════════════════════════════════════════════════════════════════════════

/// Multi-asset token ledger held in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryTokens {
    /// Balances by asset then owner
    balances: HashMap<AssetId, HashMap<Address, u128>>,
    /// Allowances by (asset, owner, spender)
    allowances: HashMap<(AssetId, Address, Address), u128>,
    /// Total minted supply by asset
    total_supply: HashMap<AssetId, u128>,
}

impl InMemoryTokens {
    /// Create an empty backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Create new tokens out of thin air
    pub fn mint(&mut self, asset: &AssetId, to: &Address, amount: u128) -> Result<()> {
        if amount == 0 {
            return Err(Error::InvalidAmount);
        }
        let supply = self.total_supply.entry(*asset).or_default();
        *supply = supply.checked_add(amount).ok_or(Error::Overflow {
            operation: "mint total supply".into(),
        })?;
        self.credit(asset, to, amount)
    }

    /// Total minted supply of an asset
    pub fn total_supply(&self, asset: &AssetId) -> u128 {
        self.total_supply.get(asset).copied().unwrap_or(0)
    }

    /// Check that balances sum to the minted supply for every asset
    pub fn verify_supply_invariant(&self) -> bool {
        self.total_supply.iter().all(|(asset, supply)| {
            let sum = self
                .balances
                .get(asset)
                .map(|b| b.values().fold(0u128, |acc, v| acc.saturating_add(*v)))
                .unwrap_or(0);
            sum == *supply
        })
    }

    fn credit(&mut self, asset: &AssetId, to: &Address, amount: u128) -> Result<()> {
        let balance = self.balances.entry(*asset).or_default().entry(*to).or_default();
        *balance = balance.checked_add(amount).ok_or(Error::Overflow {
            operation: "credit balance".into(),
        })?;
        Ok(())
    }

    fn failure(asset: &AssetId, from: &Address, to: &Address, amount: u128, reason: String) -> Error {
        Error::TransferFailed {
            asset: *asset,
            from: *from,
            to: *to,
            amount,
            reason,
        }
    }
}

impl TokenTransfer for InMemoryTokens {
    fn transfer(
        &mut self,
        asset: &AssetId,
        from: &Address,
        to: &Address,
        amount: u128,
    ) -> Result<()> {
        let available = self.balance_of(asset, from);
        if available < amount {
            return Err(Self::failure(
                asset,
                from,
                to,
                amount,
                format!("insufficient balance ({} available)", available),
            ));
        }
        if from == to || amount == 0 {
            return Ok(());
        }

        if let Some(balances) = self.balances.get_mut(asset) {
            let remaining = available - amount;
            if remaining == 0 {
                balances.remove(from);
            } else {
                balances.insert(*from, remaining);
            }
        }
        self.credit(asset, to, amount)
    }

    fn transfer_from(
        &mut self,
        asset: &AssetId,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: u128,
    ) -> Result<()> {
        let allowed = self.allowance(asset, from, spender);
        if allowed < amount {
            return Err(Self::failure(
                asset,
                from,
                to,
                amount,
                format!("insufficient allowance ({} approved to {})", allowed, spender),
            ));
        }
        self.transfer(asset, from, to, amount)?;
        self.allowances
            .insert((*asset, *from, *spender), allowed - amount);
        Ok(())
    }

    fn approve(
        &mut self,
        asset: &AssetId,
        owner: &Address,
        spender: &Address,
        amount: u128,
    ) -> Result<()> {
        if amount == 0 {
            self.allowances.remove(&(*asset, *owner, *spender));
        } else {
            self.allowances.insert((*asset, *owner, *spender), amount);
        }
        Ok(())
    }

    fn balance_of(&self, asset: &AssetId, owner: &Address) -> u128 {
        self.balances
            .get(asset)
            .and_then(|b| b.get(owner))
            .copied()
            .unwrap_or(0)
    }

    fn allowance(&self, asset: &AssetId, owner: &Address, spender: &Address) -> u128 {
        self.allowances
            .get(&(*asset, *owner, *spender))
            .copied()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset() -> AssetId {
        Address::from_low_u64(0xa55e7)
    }

    fn alice() -> Address {
        Address::from_low_u64(1)
    }

    fn bob() -> Address {
        Address::from_low_u64(2)
    }

    #[test]
    fn test_mint() {
        let mut tokens = InMemoryTokens::new();
        tokens.mint(&asset(), &alice(), 1_000).unwrap();

        assert_eq!(tokens.balance_of(&asset(), &alice()), 1_000);
        assert_eq!(tokens.total_supply(&asset()), 1_000);
        assert!(tokens.mint(&asset(), &alice(), 0).is_err());
    }

    #[test]
    fn test_transfer() {
        let mut tokens = InMemoryTokens::new();
        tokens.mint(&asset(), &alice(), 1_000).unwrap();
        tokens.transfer(&asset(), &alice(), &bob(), 400).unwrap();

        assert_eq!(tokens.balance_of(&asset(), &alice()), 600);
        assert_eq!(tokens.balance_of(&asset(), &bob()), 400);
        assert!(tokens.verify_supply_invariant());
    }

    #[test]
    fn test_transfer_insufficient_balance() {
        let mut tokens = InMemoryTokens::new();
        tokens.mint(&asset(), &alice(), 100).unwrap();

        let result = tokens.transfer(&asset(), &alice(), &bob(), 101);
        assert!(matches!(result, Err(Error::TransferFailed { amount: 101, .. })));
        assert_eq!(tokens.balance_of(&asset(), &alice()), 100);
    }

    #[test]
    fn test_transfer_from_spends_allowance() {
        let mut tokens = InMemoryTokens::new();
        let pool = Address::from_low_u64(100);
        tokens.mint(&asset(), &alice(), 1_000).unwrap();

        assert!(tokens
            .transfer_from(&asset(), &pool, &alice(), &pool, 10)
            .is_err());

        tokens.approve(&asset(), &alice(), &pool, 500).unwrap();
        tokens
            .transfer_from(&asset(), &pool, &alice(), &pool, 300)
            .unwrap();

        assert_eq!(tokens.allowance(&asset(), &alice(), &pool), 200);
        assert_eq!(tokens.balance_of(&asset(), &pool), 300);
    }

    #[test]
    fn test_failed_transfer_from_keeps_allowance() {
        let mut tokens = InMemoryTokens::new();
        let pool = Address::from_low_u64(100);
        tokens.mint(&asset(), &alice(), 10).unwrap();
        tokens.approve(&asset(), &alice(), &pool, 500).unwrap();

        assert!(tokens
            .transfer_from(&asset(), &pool, &alice(), &pool, 50)
            .is_err());
        assert_eq!(tokens.allowance(&asset(), &alice(), &pool), 500);
    }
}
