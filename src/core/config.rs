//! Market configuration.
//!
//! A `MarketConfig` describes everything needed to bootstrap a ledger:
//! - Administrator, pool custody and liquidation engine identities
//! - Accrual parameters (length of a year, event log size)
//! - The ordered list of listed assets with their risk config and rate curve
//!
//! Configs are stored as JSON and can be overridden from the environment.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::core::rates::RateParams;
use crate::core::registry::AssetConfig;
use crate::error::{Error, Result};
use crate::utils::address::{Address, AssetId};
use crate::utils::constants::{DEFAULT_MAX_EVENTS, SECONDS_PER_YEAR, WAD};

/// Environment variable naming the config file
pub const ENV_CONFIG_PATH: &str = "LENDPOOL_CONFIG";
/// Environment override for the length of a year
pub const ENV_SECONDS_PER_YEAR: &str = "LENDPOOL_SECONDS_PER_YEAR";
/// Environment override for the event log size
pub const ENV_MAX_EVENTS: &str = "LENDPOOL_MAX_EVENTS";

// ═══════════════════════════════════════════════════════════════════════════════
// ASSET LISTING
// ═══════════════════════════════════════════════════════════════════════════════

/// One listed asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetListing {
    /// Token address
    pub asset: AssetId,
    /// Display symbol
    pub symbol: String,
    /// Risk configuration
    pub config: AssetConfig,
    /// Rate curve
    pub rates: RateParams,
}

// ═══════════════════════════════════════════════════════════════════════════════
// MARKET CONFIG
// ═══════════════════════════════════════════════════════════════════════════════

/// Bootstrap configuration of a ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketConfig {
    /// Administrator identity
    pub admin: Address,
    /// Pool custody account
    pub pool_address: Address,
    /// Liquidation engine allowed to seize collateral
    pub liquidation_engine: Option<Address>,
    /// Length of a year for accrual
    #[serde(default = "default_seconds_per_year")]
    pub seconds_per_year: u64,
    /// Events kept in memory
    #[serde(default = "default_max_events")]
    pub max_events: usize,
    /// Listed assets, in price-vector order
    pub assets: Vec<AssetListing>,
}

fn default_seconds_per_year() -> u64 {
    SECONDS_PER_YEAR
}

fn default_max_events() -> usize {
    DEFAULT_MAX_EVENTS
}

impl Default for MarketConfig {
    /// Two-asset demo market: a volatile collateral and a stablecoin
    fn default() -> Self {
        Self {
            admin: Address::from_low_u64(0xad),
            pool_address: Address::from_low_u64(0x9001),
            liquidation_engine: Some(Address::from_low_u64(0x11c0)),
            seconds_per_year: SECONDS_PER_YEAR,
            max_events: DEFAULT_MAX_EVENTS,
            assets: vec![
                AssetListing {
                    asset: Address::from_low_u64(0xe7),
                    symbol: "WETH".into(),
                    config: AssetConfig {
                        supply_cap: 1_000_000 * WAD,
                        borrow_cap: 500_000 * WAD,
                        max_ltv_bps: 7_500,
                        liquidation_threshold_bps: 8_000,
                        liquidation_penalty_bps: 500,
                    },
                    rates: RateParams {
                        base_rate_bps: 100,
                        slope1_bps: 400,
                        slope2_bps: 30_000,
                        kink_bps: 8_000,
                        reserve_factor_bps: 1_000,
                    },
                },
                AssetListing {
                    asset: Address::from_low_u64(0x05dc),
                    symbol: "USDC".into(),
                    config: AssetConfig {
                        supply_cap: 100_000_000 * WAD,
                        borrow_cap: 80_000_000 * WAD,
                        max_ltv_bps: 8_500,
                        liquidation_threshold_bps: 9_000,
                        liquidation_penalty_bps: 400,
                    },
                    rates: RateParams {
                        base_rate_bps: 0,
                        slope1_bps: 600,
                        slope2_bps: 6_000,
                        kink_bps: 9_000,
                        reserve_factor_bps: 1_000,
                    },
                },
            ],
        }
    }
}

impl MarketConfig {
    /// Load from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigIo(format!("{}: {}", path.display(), e)))?;

        serde_json::from_str(&content).map_err(|e| Error::Deserialization(e.to_string()))
    }

    /// Save to a JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Serialization(e.to_string()))?;

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| Error::ConfigIo(format!("{}: {}", parent.display(), e)))?;
            }
        }

        std::fs::write(path, content)
            .map_err(|e| Error::ConfigIo(format!("{}: {}", path.display(), e)))
    }

    /// Apply environment overrides on top of `self`
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Ok(value) = std::env::var(ENV_SECONDS_PER_YEAR) {
            self.seconds_per_year = value.parse().map_err(|_| {
                Error::InvalidConfig(format!("{} is not a number: {}", ENV_SECONDS_PER_YEAR, value))
            })?;
        }

        if let Ok(value) = std::env::var(ENV_MAX_EVENTS) {
            self.max_events = value.parse().map_err(|_| {
                Error::InvalidConfig(format!("{} is not a number: {}", ENV_MAX_EVENTS, value))
            })?;
        }

        Ok(self)
    }

    /// Load the file named by `LENDPOOL_CONFIG` (or the default config) with
    /// environment overrides applied
    pub fn from_env() -> Result<Self> {
        let base = match std::env::var(ENV_CONFIG_PATH) {
            Ok(path) => Self::load(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        base.with_env_overrides()
    }

    /// Look up a listing by symbol (case-insensitive)
    pub fn listing(&self, symbol: &str) -> Option<&AssetListing> {
        self.assets
            .iter()
            .find(|l| l.symbol.eq_ignore_ascii_case(symbol))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.admin.is_zero() {
            return Err(Error::InvalidConfig("admin address cannot be zero".into()));
        }
        if self.pool_address.is_zero() {
            return Err(Error::InvalidConfig("pool address cannot be zero".into()));
        }
        if self.pool_address == self.admin {
            return Err(Error::InvalidConfig(
                "pool custody must differ from the admin".into(),
            ));
        }
        if let Some(engine) = self.liquidation_engine {
            if engine.is_zero() || engine == self.pool_address {
                return Err(Error::InvalidConfig(format!(
                    "invalid liquidation engine address {}",
                    engine
                )));
            }
        }
        if self.seconds_per_year == 0 {
            return Err(Error::InvalidConfig("seconds_per_year must be greater than 0".into()));
        }
        if self.max_events == 0 {
            return Err(Error::InvalidConfig("max_events must be greater than 0".into()));
        }

        let mut seen = HashSet::new();
        for listing in &self.assets {
            if listing.asset.is_zero() {
                return Err(Error::InvalidConfig(format!(
                    "asset {} has a zero address",
                    listing.symbol
                )));
            }
            if !seen.insert(listing.asset) {
                return Err(Error::InvalidConfig(format!(
                    "asset {} listed twice",
                    listing.asset
                )));
            }
            listing.config.validate()?;
            listing.rates.validate()?;
        }

        Ok(())
    }
}
