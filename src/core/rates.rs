//! Interest rate model.
//!
//! Borrow rates follow a two-slope ("kink") curve over utilization:
//!
//! ```text
//! u <= kink : base + slope1 * u
//! u >  kink : base + slope1 * kink + slope2 * (u - kink)
//! ```
//!
//! Suppliers earn the borrow rate scaled by utilization, minus the reserve
//! factor. All rates are annual and expressed in basis points.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::core::admin::AdminController;
use crate::error::{Error, Result};
use crate::utils::address::{Address, AssetId};
use crate::utils::constants::{BPS_DIVISOR, SECONDS_PER_YEAR, WAD, WAD_PER_BPS};
use crate::utils::math::wad_pow;

// ═══════════════════════════════════════════════════════════════════════════════
// RATE PARAMETERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Kinked rate curve of one asset (all in bps)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateParams {
    /// Rate at zero utilization
    pub base_rate_bps: u64,
    /// Slope below the kink
    pub slope1_bps: u64,
    /// Slope above the kink
    pub slope2_bps: u64,
    /// Utilization where the slope changes
    pub kink_bps: u64,
    /// Share of interest withheld from suppliers
    pub reserve_factor_bps: u64,
}

impl RateParams {
    /// Check `kink <= 100%` and `reserve_factor <= 100%`
    pub fn validate(&self) -> Result<()> {
        if self.kink_bps > BPS_DIVISOR {
            return Err(Error::InvalidConfig(format!(
                "kink {} bps exceeds 100%",
                self.kink_bps
            )));
        }
        if self.reserve_factor_bps > BPS_DIVISOR {
            return Err(Error::InvalidConfig(format!(
                "reserve factor {} bps exceeds 100%",
                self.reserve_factor_bps
            )));
        }
        Ok(())
    }

    /// Annual borrow rate at `utilization_bps`
    pub fn borrow_rate(&self, utilization_bps: u64) -> u64 {
        let u = utilization_bps as u128;
        let kink = self.kink_bps as u128;
        let bps = BPS_DIVISOR as u128;

        let rate = if u <= kink {
            self.base_rate_bps as u128 + self.slope1_bps as u128 * u / bps
        } else {
            self.base_rate_bps as u128
                + self.slope1_bps as u128 * kink / bps
                + self.slope2_bps as u128 * (u - kink) / bps
        };
        u64::try_from(rate).unwrap_or(u64::MAX)
    }

    /// Annual supply rate at `utilization_bps`
    pub fn supply_rate(&self, utilization_bps: u64) -> u64 {
        let bps = BPS_DIVISOR as u128;
        let kept = bps.saturating_sub(self.reserve_factor_bps as u128);
        let rate = self.borrow_rate(utilization_bps) as u128 * utilization_bps as u128 * kept
            / (bps * bps);
        u64::try_from(rate).unwrap_or(u64::MAX)
    }
}

/// Utilization of a market in bps (`borrows / deposits`), 0 when empty.
///
/// Not clamped: supply-side rounding can push it marginally above 100%.
pub fn utilization(total_borrows: u128, total_deposits: u128) -> u64 {
    if total_deposits == 0 {
        return 0;
    }
    let bps = BPS_DIVISOR as u128;
    let util = match total_borrows.checked_mul(bps) {
        Some(scaled) => scaled / total_deposits,
        None => total_borrows / (total_deposits / bps).max(1),
    };
    u64::try_from(util).unwrap_or(u64::MAX)
}

/// Per-second compounded annual yield of a simple annual rate.
///
/// Never below `rate_bps`; saturates on overflow.
pub fn rate_to_apy(rate_bps: u64, seconds_per_year: u64) -> u64 {
    if rate_bps == 0 || seconds_per_year == 0 {
        return rate_bps;
    }
    let per_second = rate_bps as u128 * WAD_PER_BPS / seconds_per_year as u128;
    let apy = wad_pow(WAD + per_second, seconds_per_year)
        .map(|factor| (factor - WAD) / WAD_PER_BPS)
        .map(|bps| u64::try_from(bps).unwrap_or(u64::MAX))
        .unwrap_or(u64::MAX);
    apy.max(rate_bps)
}

// ═══════════════════════════════════════════════════════════════════════════════
// INTEREST RATE MODEL
// ═══════════════════════════════════════════════════════════════════════════════

/// Per-asset rate curves with administrator-gated updates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterestRateModel {
    /// Administrator capability
    admin: AdminController,
    /// Curves by asset; missing entries mean zero rates
    params: HashMap<AssetId, RateParams>,
    /// Length of a year used for accrual and APY
    seconds_per_year: u64,
}

impl InterestRateModel {
    /// Create a model with no curves
    pub fn new(admin: AdminController) -> Self {
        Self {
            admin,
            params: HashMap::new(),
            seconds_per_year: SECONDS_PER_YEAR,
        }
    }

    /// Override the length of a year
    pub fn with_seconds_per_year(mut self, seconds_per_year: u64) -> Self {
        self.seconds_per_year = seconds_per_year.max(1);
        self
    }

    /// Length of a year in seconds
    pub fn seconds_per_year(&self) -> u64 {
        self.seconds_per_year
    }

    /// Set the curve of an asset
    pub fn set_params(
        &mut self,
        caller: &Address,
        asset: AssetId,
        params: RateParams,
    ) -> Result<()> {
        self.admin.authorize(caller, "set_rate_params")?;
        params.validate()?;
        self.params.insert(asset, params);
        Ok(())
    }

    /// Curve of an asset (zero rates if never set)
    pub fn params(&self, asset: &AssetId) -> RateParams {
        self.params.get(asset).copied().unwrap_or_default()
    }

    /// Annual borrow rate (bps)
    pub fn borrow_rate(&self, asset: &AssetId, utilization_bps: u64) -> u64 {
        self.params(asset).borrow_rate(utilization_bps)
    }

    /// Annual supply rate (bps)
    pub fn supply_rate(&self, asset: &AssetId, utilization_bps: u64) -> u64 {
        self.params(asset).supply_rate(utilization_bps)
    }

    /// Compounded borrow APY (bps)
    pub fn borrow_apy(&self, asset: &AssetId, utilization_bps: u64) -> u64 {
        rate_to_apy(self.borrow_rate(asset, utilization_bps), self.seconds_per_year)
    }

    /// Compounded supply APY (bps)
    pub fn supply_apy(&self, asset: &AssetId, utilization_bps: u64) -> u64 {
        rate_to_apy(self.supply_rate(asset, utilization_bps), self.seconds_per_year)
    }
}
