//! Asset registry.
//!
//! Holds the per-asset risk configuration and the ordered list of allowed
//! assets. The order of that list is the order of every price vector the
//! ledger accepts, so price index `i` always belongs to `assets()[i]`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::core::admin::AdminController;
use crate::error::{Error, Result};
use crate::utils::address::{Address, AssetId};
use crate::utils::constants::{BPS_DIVISOR, MAX_LIQUIDATION_PENALTY_BPS};

// ═══════════════════════════════════════════════════════════════════════════════
// ASSET CONFIG
// ═══════════════════════════════════════════════════════════════════════════════

/// Risk configuration of a single asset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetConfig {
    /// Maximum total deposits (WAD)
    pub supply_cap: u128,
    /// Maximum total borrows (WAD)
    pub borrow_cap: u128,
    /// Share of collateral value that may be borrowed against (bps)
    pub max_ltv_bps: u64,
    /// Share of collateral value counted towards the health factor (bps)
    pub liquidation_threshold_bps: u64,
    /// Bonus paid to liquidators on seized collateral (bps)
    pub liquidation_penalty_bps: u64,
}

impl AssetConfig {
    /// Create a config, validating the registry invariants
    pub fn new(
        supply_cap: u128,
        borrow_cap: u128,
        max_ltv_bps: u64,
        liquidation_threshold_bps: u64,
        liquidation_penalty_bps: u64,
    ) -> Result<Self> {
        let config = Self {
            supply_cap,
            borrow_cap,
            max_ltv_bps,
            liquidation_threshold_bps,
            liquidation_penalty_bps,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check `max_ltv <= liquidation_threshold <= 100%` and the penalty bound
    pub fn validate(&self) -> Result<()> {
        if self.max_ltv_bps > self.liquidation_threshold_bps {
            return Err(Error::InvalidConfig(format!(
                "max LTV {} bps exceeds liquidation threshold {} bps",
                self.max_ltv_bps, self.liquidation_threshold_bps
            )));
        }
        if self.liquidation_threshold_bps > BPS_DIVISOR {
            return Err(Error::InvalidConfig(format!(
                "liquidation threshold {} bps exceeds 100%",
                self.liquidation_threshold_bps
            )));
        }
        if self.liquidation_penalty_bps > MAX_LIQUIDATION_PENALTY_BPS {
            return Err(Error::InvalidConfig(format!(
                "liquidation penalty {} bps exceeds maximum {} bps",
                self.liquidation_penalty_bps, MAX_LIQUIDATION_PENALTY_BPS
            )));
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ASSET REGISTRY
// ═══════════════════════════════════════════════════════════════════════════════

/// Registry of allowed assets and their configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetRegistry {
    /// Administrator capability
    admin: AdminController,
    /// Allowed assets, in price-vector order
    assets: Vec<AssetId>,
    /// Position of each allowed asset in `assets`
    index: HashMap<AssetId, usize>,
    /// Configuration by asset (may exist before the asset is allowed)
    configs: HashMap<AssetId, AssetConfig>,
}

impl AssetRegistry {
    /// Create an empty registry
    pub fn new(admin: AdminController) -> Self {
        Self {
            admin,
            assets: Vec::new(),
            index: HashMap::new(),
            configs: HashMap::new(),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // ADMINISTRATION
    // ═══════════════════════════════════════════════════════════════════════════

    /// Set or replace the configuration of an asset
    pub fn set_asset_config(
        &mut self,
        caller: &Address,
        asset: AssetId,
        config: AssetConfig,
    ) -> Result<()> {
        self.admin.authorize(caller, "set_asset_config")?;
        if asset.is_zero() {
            return Err(Error::InvalidAddress(asset));
        }
        config.validate()?;
        self.configs.insert(asset, config);
        Ok(())
    }

    /// Allow an asset. Returns `false` if it was already allowed.
    pub fn add_allowed_asset(&mut self, caller: &Address, asset: AssetId) -> Result<bool> {
        self.admin.authorize(caller, "add_allowed_asset")?;
        if asset.is_zero() {
            return Err(Error::InvalidAddress(asset));
        }
        if self.index.contains_key(&asset) {
            return Ok(false);
        }
        self.index.insert(asset, self.assets.len());
        self.assets.push(asset);
        Ok(true)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // QUERIES
    // ═══════════════════════════════════════════════════════════════════════════

    /// Whether the asset has been allowed
    pub fn is_allowed(&self, asset: &AssetId) -> bool {
        self.index.contains_key(asset)
    }

    /// Configuration of an asset (all zero if never configured)
    pub fn config(&self, asset: &AssetId) -> AssetConfig {
        self.configs.get(asset).copied().unwrap_or_default()
    }

    /// Allowed assets in price-vector order
    pub fn assets(&self) -> &[AssetId] {
        &self.assets
    }

    /// Number of allowed assets
    pub fn len(&self) -> usize {
        self.assets.len()
    }

    /// Whether no asset is allowed yet
    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    /// Price-vector index of an allowed asset
    pub fn index_of(&self, asset: &AssetId) -> Option<usize> {
        self.index.get(asset).copied()
    }

    /// Fail unless `prices` has exactly one entry per allowed asset
    pub fn check_prices(&self, prices: &[u128]) -> Result<()> {
        if prices.len() != self.assets.len() {
            return Err(Error::InvalidPriceVectorLength {
                expected: self.assets.len(),
                got: prices.len(),
            });
        }
        Ok(())
    }

    /// Pair every allowed asset with its price
    pub fn priced<'a>(
        &'a self,
        prices: &'a [u128],
    ) -> Result<impl Iterator<Item = (&'a AssetId, u128)> + 'a> {
        self.check_prices(prices)?;
        Ok(self.assets.iter().zip(prices.iter().copied()))
    }

    /// Price of a single asset from a price vector
    pub fn price_of(&self, prices: &[u128], asset: &AssetId) -> Result<u128> {
        self.check_prices(prices)?;
        self.index_of(asset)
            .map(|i| prices[i])
            .ok_or(Error::TokenNotAllowed(*asset))
    }

    /// The administrator capability
    pub fn admin(&self) -> &AdminController {
        &self.admin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admin() -> Address {
        Address::from_low_u64(1)
    }

    fn registry() -> AssetRegistry {
        AssetRegistry::new(AdminController::new(admin()).unwrap())
    }

    fn config(ltv: u64, threshold: u64, penalty: u64) -> AssetConfig {
        AssetConfig {
            supply_cap: 1_000,
            borrow_cap: 1_000,
            max_ltv_bps: ltv,
            liquidation_threshold_bps: threshold,
            liquidation_penalty_bps: penalty,
        }
    }

    #[test]
    fn test_ltv_above_threshold_rejected() {
        let mut registry = registry();
        let result = registry.set_asset_config(&admin(), Address::from_low_u64(10), config(9_000, 8_000, 500));
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_penalty_bound() {
        let mut registry = registry();
        let asset = Address::from_low_u64(10);

        let result = registry.set_asset_config(&admin(), asset, config(7_500, 8_000, 2_001));
        assert!(matches!(result, Err(Error::InvalidConfig(_))));

        registry
            .set_asset_config(&admin(), asset, config(7_500, 8_000, 2_000))
            .unwrap();
        assert_eq!(registry.config(&asset).liquidation_penalty_bps, 2_000);
    }

    #[test]
    fn test_threshold_above_hundred_percent_rejected() {
        assert!(AssetConfig::new(0, 0, 9_000, 10_001, 0).is_err());
        assert!(AssetConfig::new(0, 0, 9_000, 10_000, 0).is_ok());
    }

    #[test]
    fn test_non_admin_rejected() {
        let mut registry = registry();
        let intruder = Address::from_low_u64(99);
        let asset = Address::from_low_u64(10);

        assert!(matches!(
            registry.set_asset_config(&intruder, asset, config(1, 1, 0)),
            Err(Error::Unauthorized(_))
        ));
        assert!(matches!(
            registry.add_allowed_asset(&intruder, asset),
            Err(Error::Unauthorized(_))
        ));
        assert!(!registry.is_allowed(&asset));
    }

    #[test]
    fn test_allowed_order_and_idempotence() {
        let mut registry = registry();
        let a = Address::from_low_u64(10);
        let b = Address::from_low_u64(11);

        assert!(registry.add_allowed_asset(&admin(), a).unwrap());
        assert!(registry.add_allowed_asset(&admin(), b).unwrap());
        assert!(!registry.add_allowed_asset(&admin(), a).unwrap());

        assert_eq!(registry.assets(), &[a, b]);
        assert_eq!(registry.index_of(&b), Some(1));
        assert!(registry.add_allowed_asset(&admin(), Address::ZERO).is_err());
    }

    #[test]
    fn test_price_vector_alignment() {
        let mut registry = registry();
        let a = Address::from_low_u64(10);
        let b = Address::from_low_u64(11);
        registry.add_allowed_asset(&admin(), a).unwrap();
        registry.add_allowed_asset(&admin(), b).unwrap();

        assert_eq!(
            registry.check_prices(&[1]),
            Err(Error::InvalidPriceVectorLength { expected: 2, got: 1 })
        );
        assert_eq!(registry.price_of(&[5, 7], &b).unwrap(), 7);
        assert!(matches!(
            registry.price_of(&[5, 7], &Address::from_low_u64(12)),
            Err(Error::TokenNotAllowed(_))
        ));

        let pairs: Vec<_> = registry.priced(&[5, 7]).unwrap().collect();
        assert_eq!(pairs, vec![(&a, 5), (&b, 7)]);
    }

    #[test]
    fn test_unconfigured_asset_defaults_to_zero() {
        let registry = registry();
        let asset = Address::from_low_u64(10);
        assert_eq!(registry.config(&asset), AssetConfig::default());
    }
}
