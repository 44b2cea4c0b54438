//! Health factor and account valuation.
//!
//! Values are accumulated as `amount * price` in 256 bits (WAD^2 scale) and
//! only narrowed at the end, so large balances cannot overflow mid-sweep.

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::utils::constants::{HEALTH_FACTOR_MAX, WAD};
use crate::utils::math::{format_wad, saturating_narrow};

// ═══════════════════════════════════════════════════════════════════════════════
// HEALTH FACTOR
// ═══════════════════════════════════════════════════════════════════════════════

/// Liquidation-threshold-weighted collateral over debt, WAD-scaled
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HealthFactor(u128);

impl HealthFactor {
    /// Health of an account without debt
    pub const MAX: Self = Self(HEALTH_FACTOR_MAX);

    /// The liquidation boundary (1.0)
    pub const ONE: Self = Self(WAD);

    /// Wrap a raw WAD value
    pub const fn from_raw(raw: u128) -> Self {
        Self(raw)
    }

    /// Compute from weighted collateral and debt values (both WAD^2)
    pub fn from_values(weighted_collateral: U256, debt: U256) -> Self {
        if debt.is_zero() {
            return Self::MAX;
        }
        let wad = U256::from(WAD);
        let ratio = match weighted_collateral.checked_mul(wad) {
            Some(scaled) => scaled / debt,
            None => (weighted_collateral / debt).saturating_mul(wad),
        };
        Self(saturating_narrow(ratio))
    }

    /// Raw WAD value
    pub fn raw(&self) -> u128 {
        self.0
    }

    /// Below 1.0
    pub fn is_liquidatable(&self) -> bool {
        self.0 < WAD
    }

    /// No debt
    pub fn is_max(&self) -> bool {
        self.0 == HEALTH_FACTOR_MAX
    }
}

impl fmt::Display for HealthFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_max() {
            write!(f, "∞")
        } else {
            write!(f, "{}", format_wad(self.0))
        }
    }
}

impl fmt::Debug for HealthFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HealthFactor({})", self)
    }
}

impl From<HealthFactor> for u128 {
    fn from(hf: HealthFactor) -> Self {
        hf.0
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ACCOUNT VALUES
// ═══════════════════════════════════════════════════════════════════════════════

/// Raw sweep totals over every allowed asset (WAD^2 scale)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccountValues {
    /// Collateral weighted by max LTV
    pub borrow_capacity: U256,
    /// Collateral weighted by liquidation threshold
    pub liquidation_value: U256,
    /// Unweighted collateral
    pub collateral_value: U256,
    /// Debt
    pub debt_value: U256,
}

impl AccountValues {
    /// Health factor of these totals
    pub fn health_factor(&self) -> HealthFactor {
        HealthFactor::from_values(self.liquidation_value, self.debt_value)
    }

    /// Borrowing capacity left after existing debt
    pub fn remaining_capacity(&self) -> U256 {
        self.borrow_capacity.saturating_sub(self.debt_value)
    }
}

/// USD view of an account (WAD)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSummary {
    /// Value of all supplied assets
    pub collateral_value: u128,
    /// Collateral value counted by liquidation thresholds
    pub liquidation_value: u128,
    /// Value of all debt
    pub debt_value: u128,
    /// Additional value that could still be borrowed
    pub available_to_borrow: u128,
    /// Current health factor
    pub health_factor: HealthFactor,
}

impl From<AccountValues> for AccountSummary {
    fn from(values: AccountValues) -> Self {
        let wad = U256::from(WAD);
        Self {
            collateral_value: saturating_narrow(values.collateral_value / wad),
            liquidation_value: saturating_narrow(values.liquidation_value / wad),
            debt_value: saturating_narrow(values.debt_value / wad),
            available_to_borrow: saturating_narrow(values.remaining_capacity() / wad),
            health_factor: values.health_factor(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::math::value_of;

    #[test]
    fn test_no_debt_is_max() {
        let hf = HealthFactor::from_values(value_of(WAD, WAD), U256::ZERO);
        assert!(hf.is_max());
        assert!(!hf.is_liquidatable());
        assert_eq!(hf.to_string(), "∞");
    }

    #[test]
    fn test_ratio() {
        // 80 weighted collateral against 100 debt
        let hf = HealthFactor::from_values(value_of(80 * WAD, WAD), value_of(100 * WAD, WAD));
        assert_eq!(hf.raw(), 8 * WAD / 10);
        assert!(hf.is_liquidatable());
        assert_eq!(hf.to_string(), "0.8");
    }

    #[test]
    fn test_huge_values_do_not_overflow() {
        let collateral = U256::MAX / U256::from(2u8);
        let hf = HealthFactor::from_values(collateral, U256::from(1u8));
        assert!(hf.is_max());
    }

    #[test]
    fn test_boundary_is_healthy() {
        assert!(!HealthFactor::ONE.is_liquidatable());
        assert!(HealthFactor::from_raw(WAD - 1).is_liquidatable());
    }

    #[test]
    fn test_summary_from_values() {
        let values = AccountValues {
            borrow_capacity: value_of(75 * WAD, WAD),
            liquidation_value: value_of(80 * WAD, WAD),
            collateral_value: value_of(100 * WAD, WAD),
            debt_value: value_of(50 * WAD, WAD),
        };
        let summary = AccountSummary::from(values);
        assert_eq!(summary.collateral_value, 100 * WAD);
        assert_eq!(summary.available_to_borrow, 25 * WAD);
        assert_eq!(summary.health_factor.raw(), 16 * WAD / 10);
    }
}
