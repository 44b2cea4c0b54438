//! Liquidation Engine for the lending ledger.
//!
//! This module handles the liquidation of undercollateralized accounts:
//! - Detection of liquidatable accounts, lowest health factor first
//! - Repayment of the borrower's debt with the liquidator's funds
//! - Seizure of collateral plus a penalty bonus for the liquidator
//!
//! A liquidation runs inside one atomic pool section: if seizing or
//! forwarding collateral fails, the repayment is undone as well.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

use crate::core::health::HealthFactor;
use crate::core::pool::LedgerPool;
use crate::core::token::TokenTransfer;
use crate::error::{Error, Result};
use crate::protocol::events::{LiquidationExecutedEvent, ProtocolEvent};
use crate::utils::address::{Address, AssetId};
use crate::utils::constants::{DEFAULT_MAX_EVENTS, WAD, WAD_PER_BPS};
use crate::utils::math::mul_div;

// ═══════════════════════════════════════════════════════════════════════════════
// LIQUIDATION REQUEST
// ═══════════════════════════════════════════════════════════════════════════════

/// Parameters of a single liquidation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidationRequest {
    /// Account repaying debt and receiving collateral
    pub liquidator: Address,
    /// Undercollateralized account
    pub borrower: Address,
    /// Asset of the debt being repaid
    pub repay_asset: AssetId,
    /// Maximum amount to repay
    pub repay_amount: u128,
    /// Asset of the collateral to seize
    pub collateral_asset: AssetId,
}

// ═══════════════════════════════════════════════════════════════════════════════
// LIQUIDATION ENGINE
// ═══════════════════════════════════════════════════════════════════════════════

/// Engine for liquidating undercollateralized accounts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidationEngine {
    /// Identity registered with the pool as liquidation engine
    address: Address,
    /// Events history
    events: Vec<LiquidationExecutedEvent>,
    /// Maximum events to keep
    max_events: usize,
    /// Total liquidations performed
    total_liquidations: u64,
    /// Total debt repaid by asset
    total_repaid: HashMap<AssetId, u128>,
    /// Total collateral seized by asset
    total_seized: HashMap<AssetId, u128>,
}

impl LiquidationEngine {
    /// Create an engine acting as `address`
    pub fn new(address: Address) -> Result<Self> {
        if address.is_zero() {
            return Err(Error::InvalidAddress(address));
        }
        Ok(Self {
            address,
            events: Vec::new(),
            max_events: DEFAULT_MAX_EVENTS,
            total_liquidations: 0,
            total_repaid: HashMap::new(),
            total_seized: HashMap::new(),
        })
    }

    /// Engine identity
    pub fn address(&self) -> Address {
        self.address
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // LIQUIDATION DETECTION
    // ═══════════════════════════════════════════════════════════════════════════

    /// Every account with health factor below 1.0, lowest first
    pub fn find_liquidatable<T: TokenTransfer>(
        &self,
        pool: &LedgerPool<T>,
        prices: &[u128],
    ) -> Result<Vec<(Address, HealthFactor)>> {
        let mut liquidatable = Vec::new();
        for account in pool.accounts() {
            let health = pool.health_factor(&account, prices)?;
            if health.is_liquidatable() {
                liquidatable.push((account, health));
            }
        }

        // Sort by health (ascending - lowest health = highest priority)
        liquidatable.sort_by_key(|(_, health)| *health);
        Ok(liquidatable)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // LIQUIDATION EXECUTION
    // ═══════════════════════════════════════════════════════════════════════════

    /// Repay up to `repay_amount` of `borrower`'s debt and hand the liquidator
    /// the equivalent collateral plus penalty.
    ///
    /// The liquidator must have approved the pool for the repay asset.
    #[allow(clippy::too_many_arguments)]
    pub fn liquidate<T: TokenTransfer>(
        &mut self,
        pool: &mut LedgerPool<T>,
        liquidator: &Address,
        borrower: &Address,
        repay_asset: AssetId,
        repay_amount: u128,
        collateral_asset: AssetId,
        prices: &[u128],
    ) -> Result<LiquidationExecutedEvent> {
        self.execute(
            pool,
            LiquidationRequest {
                liquidator: *liquidator,
                borrower: *borrower,
                repay_asset,
                repay_amount,
                collateral_asset,
            },
            prices,
        )
    }

    /// Execute a liquidation request
    pub fn execute<T: TokenTransfer>(
        &mut self,
        pool: &mut LedgerPool<T>,
        request: LiquidationRequest,
        prices: &[u128],
    ) -> Result<LiquidationExecutedEvent> {
        let LiquidationRequest {
            liquidator,
            borrower,
            repay_asset,
            repay_amount,
            collateral_asset,
        } = request;

        if repay_amount == 0 {
            return Err(Error::InvalidAmount);
        }
        if !pool.registry().is_allowed(&repay_asset) {
            return Err(Error::InvalidRepayToken(repay_asset));
        }
        if !pool.registry().is_allowed(&collateral_asset) {
            return Err(Error::InvalidCollateralToken(collateral_asset));
        }

        let health = pool.health_factor(&borrower, prices)?;
        if !health.is_liquidatable() {
            return Err(Error::HealthyPosition {
                account: borrower,
                health_factor: health.raw(),
            });
        }

        let penalty_bps = pool.registry().config(&collateral_asset).liquidation_penalty_bps;
        let repay_price = pool.registry().price_of(prices, &repay_asset)?;
        let collateral_price = pool.registry().price_of(prices, &collateral_asset)?;
        let engine = self.address;

        let event = pool.atomic(|pool| {
            let repaid = pool.repay_for(&liquidator, &borrower, repay_asset, repay_amount)?;
            let seized = Self::collateral_for(
                repaid,
                repay_price,
                collateral_price,
                penalty_bps,
                &collateral_asset,
            )?;
            pool.seize_collateral(&engine, collateral_asset, &borrower, seized)?;
            pool.forward(&collateral_asset, &engine, &liquidator, seized)?;

            let event = LiquidationExecutedEvent {
                borrower,
                liquidator,
                repay_asset,
                collateral_asset,
                repay_amount: repaid,
                seized_amount: seized,
                health_factor: health.raw(),
                timestamp: pool.now(),
            };
            pool.emit(ProtocolEvent::LiquidationExecuted(event.clone()));
            Ok(event)
        })?;

        info!(
            "Liquidated {}: {} repaid {} of {}, seized {} of {} (health {})",
            borrower, liquidator, event.repay_amount, repay_asset, event.seized_amount, collateral_asset, health
        );

        self.total_liquidations += 1;
        let repaid = self.total_repaid.entry(repay_asset).or_default();
        *repaid = repaid.saturating_add(event.repay_amount);
        let seized = self.total_seized.entry(collateral_asset).or_default();
        *seized = seized.saturating_add(event.seized_amount);
        self.add_event(event.clone());

        Ok(event)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // INCENTIVE CALCULATIONS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Collateral owed for `repaid`: `repaid * (WAD + penalty * 1e14) / WAD`
    pub fn seize_amount(repaid: u128, penalty_bps: u64) -> Result<u128> {
        let multiplier = WAD + penalty_bps as u128 * WAD_PER_BPS;
        mul_div(repaid, multiplier, WAD)
    }

    /// Convert `repaid` into collateral units at the given prices, then add
    /// the penalty. Equal prices reduce to [`Self::seize_amount`].
    fn collateral_for(
        repaid: u128,
        repay_price: u128,
        collateral_price: u128,
        penalty_bps: u64,
        collateral_asset: &AssetId,
    ) -> Result<u128> {
        if repay_price == collateral_price {
            return Self::seize_amount(repaid, penalty_bps);
        }
        if collateral_price == 0 {
            return Err(Error::ZeroPrice(*collateral_asset));
        }
        let equivalent = mul_div(repaid, repay_price, collateral_price)?;
        Self::seize_amount(equivalent, penalty_bps)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // QUERIES
    // ═══════════════════════════════════════════════════════════════════════════

    /// Get total liquidations
    pub fn total_liquidations(&self) -> u64 {
        self.total_liquidations
    }

    /// Get total debt repaid in `asset`
    pub fn total_repaid(&self, asset: &AssetId) -> u128 {
        self.total_repaid.get(asset).copied().unwrap_or(0)
    }

    /// Get total collateral seized in `asset`
    pub fn total_seized(&self, asset: &AssetId) -> u128 {
        self.total_seized.get(asset).copied().unwrap_or(0)
    }

    /// Get recent events
    pub fn recent_events(&self) -> &[LiquidationExecutedEvent] {
        &self.events
    }

    /// Get statistics
    pub fn statistics(&self) -> LiquidationStats {
        let average_health_factor = if !self.events.is_empty() {
            let sum = self
                .events
                .iter()
                .fold(0u128, |acc, e| acc.saturating_add(e.health_factor));
            sum / self.events.len() as u128
        } else {
            0
        };

        let mut liquidators: Vec<_> = self.events.iter().map(|e| e.liquidator).collect();
        liquidators.sort();
        liquidators.dedup();

        LiquidationStats {
            total_liquidations: self.total_liquidations,
            average_health_factor,
            unique_liquidators: liquidators.len() as u64,
            assets_seized: self.total_seized.len() as u64,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // INTERNAL
    // ═══════════════════════════════════════════════════════════════════════════

    /// Add an event (with pruning)
    fn add_event(&mut self, event: LiquidationExecutedEvent) {
        self.events.push(event);

        if self.events.len() > self.max_events {
            self.events.drain(0..self.events.len() - self.max_events);
        }
    }

    /// Serialize to bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(|e| Error::Deserialization(e.to_string()))
    }
}

/// Liquidation statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidationStats {
    /// Liquidations performed
    pub total_liquidations: u64,
    /// Mean health factor at liquidation over recent events (WAD)
    pub average_health_factor: u128,
    /// Distinct liquidators in recent events
    pub unique_liquidators: u64,
    /// Collateral assets ever seized
    pub assets_seized: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::admin::AdminController;
    use crate::core::rates::InterestRateModel;
    use crate::core::registry::AssetConfig;
    use crate::core::token::InMemoryTokens;
    use crate::utils::time::ManualClock;

    fn admin() -> Address {
        Address::from_low_u64(1)
    }

    fn borrower() -> Address {
        Address::from_low_u64(2)
    }

    fn liquidator() -> Address {
        Address::from_low_u64(3)
    }

    fn asset() -> AssetId {
        Address::from_low_u64(100)
    }

    fn engine_address() -> Address {
        Address::from_low_u64(0x11c0)
    }

    /// Single-asset market where `borrower` supplied 100 and borrowed 75
    fn setup(penalty_bps: u64) -> (LedgerPool<InMemoryTokens>, LiquidationEngine) {
        let controller = AdminController::new(admin()).unwrap();
        let mut pool = LedgerPool::new(
            Address::from_low_u64(0x9001),
            controller,
            InterestRateModel::new(controller),
            InMemoryTokens::new(),
            ManualClock::new(0),
        )
        .unwrap();
        let config = AssetConfig {
            supply_cap: 1_000 * WAD,
            borrow_cap: 1_000 * WAD,
            max_ltv_bps: 7_500,
            liquidation_threshold_bps: 8_000,
            liquidation_penalty_bps: penalty_bps,
        };
        pool.set_asset_config(&admin(), asset(), config).unwrap();
        pool.add_allowed_asset(&admin(), asset()).unwrap();
        pool.set_liquidation_contract(&admin(), engine_address()).unwrap();

        let custody = pool.address();
        for (user, amount) in [(borrower(), 100 * WAD), (liquidator(), 100 * WAD)] {
            pool.tokens_mut().mint(&asset(), &user, amount).unwrap();
            pool.tokens_mut().approve(&asset(), &user, &custody, u128::MAX).unwrap();
        }
        pool.deposit(&borrower(), asset(), 100 * WAD).unwrap();
        pool.borrow(&borrower(), asset(), 75 * WAD, &[WAD]).unwrap();

        (pool, LiquidationEngine::new(engine_address()).unwrap())
    }

    #[test]
    fn test_seize_amount_penalties() {
        let repaid = 100 * WAD;
        assert_eq!(LiquidationEngine::seize_amount(repaid, 500).unwrap(), 105 * WAD);
        assert_eq!(LiquidationEngine::seize_amount(repaid, 2_000).unwrap(), 120 * WAD);
        assert_eq!(LiquidationEngine::seize_amount(repaid, 0).unwrap(), repaid);
    }

    #[test]
    fn test_cross_price_conversion() {
        let asset = Address::from_low_u64(7);
        // 100 units at $1 repaid against collateral at $2: 50 units + 5%
        let seized = LiquidationEngine::collateral_for(100 * WAD, WAD, 2 * WAD, 500, &asset).unwrap();
        assert_eq!(seized, 52_500 * WAD / 1_000);
        assert_eq!(
            LiquidationEngine::collateral_for(WAD, WAD, 0, 500, &asset),
            Err(Error::ZeroPrice(asset))
        );
    }

    #[test]
    fn test_equal_prices_skip_conversion() {
        let asset = Address::from_low_u64(7);
        // Any equal price, not just one dollar
        let seized = LiquidationEngine::collateral_for(100 * WAD, 3 * WAD, 3 * WAD, 500, &asset).unwrap();
        assert_eq!(seized, LiquidationEngine::seize_amount(100 * WAD, 500).unwrap());
        assert_eq!(seized, 105 * WAD);
    }

    #[test]
    fn test_cannot_liquidate_healthy_position() {
        let (mut pool, mut engine) = setup(500);
        let result = engine.liquidate(&mut pool, &liquidator(), &borrower(), asset(), WAD, asset(), &[WAD]);
        assert!(matches!(result, Err(Error::HealthyPosition { .. })));
    }

    #[test]
    fn test_rejects_unlisted_assets() {
        let (mut pool, mut engine) = setup(500);
        let unknown = Address::from_low_u64(999);

        let result = engine.liquidate(&mut pool, &liquidator(), &borrower(), unknown, WAD, asset(), &[WAD]);
        assert_eq!(result, Err(Error::InvalidRepayToken(unknown)));

        let result = engine.liquidate(&mut pool, &liquidator(), &borrower(), asset(), WAD, unknown, &[WAD]);
        assert_eq!(result, Err(Error::InvalidCollateralToken(unknown)));

        let result = engine.liquidate(&mut pool, &liquidator(), &borrower(), asset(), 0, asset(), &[WAD]);
        assert_eq!(result, Err(Error::InvalidAmount));
    }

    #[test]
    fn test_liquidate_with_price_drop() {
        let (mut pool, mut engine) = setup(500);
        // Collateral and debt are the same asset, so lower the threshold instead
        let risky = AssetConfig {
            supply_cap: 1_000 * WAD,
            borrow_cap: 1_000 * WAD,
            max_ltv_bps: 7_000,
            liquidation_threshold_bps: 7_000,
            liquidation_penalty_bps: 500,
        };
        pool.set_asset_config(&admin(), asset(), risky).unwrap();
        assert!(pool.health_factor(&borrower(), &[WAD]).unwrap().is_liquidatable());

        let found = engine.find_liquidatable(&pool, &[WAD]).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0, borrower());

        let event = engine
            .liquidate(&mut pool, &liquidator(), &borrower(), asset(), 10 * WAD, asset(), &[WAD])
            .unwrap();

        assert_eq!(event.repay_amount, 10 * WAD);
        assert_eq!(event.seized_amount, 10_500 * WAD / 1_000);
        assert_eq!(pool.debt_of(&asset(), &borrower()), 65 * WAD);
        assert_eq!(pool.balance_of(&asset(), &borrower()), 100 * WAD - event.seized_amount);
        assert_eq!(
            pool.tokens().balance_of(&asset(), &liquidator()),
            100 * WAD - 10 * WAD + event.seized_amount
        );
        assert_eq!(pool.tokens().balance_of(&asset(), &engine_address()), 0);
        assert_eq!(engine.total_liquidations(), 1);
        assert_eq!(engine.total_seized(&asset()), event.seized_amount);
        pool.verify_invariants().unwrap();
    }

    #[test]
    fn test_failed_seizure_rolls_back_repayment() {
        let (mut pool, mut engine) = setup(2_000);
        // Withdrawals are not health-checked: drain the free liquidity
        pool.withdraw(&borrower(), asset(), 25 * WAD).unwrap();
        assert!(pool.health_factor(&borrower(), &[WAD]).unwrap().is_liquidatable());

        // Repaying all 75 would seize 90 but only 75 remains supplied
        let before = pool.state_hash();
        let result = engine.liquidate(&mut pool, &liquidator(), &borrower(), asset(), 75 * WAD, asset(), &[WAD]);

        assert!(matches!(result, Err(Error::InsufficientBalance { .. })));
        assert_eq!(pool.state_hash(), before);
        assert_eq!(pool.tokens().balance_of(&asset(), &liquidator()), 100 * WAD);
        assert_eq!(pool.tokens().allowance(&asset(), &liquidator(), &pool.address()), u128::MAX);
        assert_eq!(pool.debt_of(&asset(), &borrower()), 75 * WAD);
        assert_eq!(engine.total_liquidations(), 0);
        assert!(pool.events().filter_by_type("LiquidationExecuted").is_empty());
        assert!(pool.events().filter_by_type("Repay").is_empty());
    }

    #[test]
    fn test_engine_serialization() {
        let engine = LiquidationEngine::new(engine_address()).unwrap();
        let restored = LiquidationEngine::from_bytes(&engine.to_bytes().unwrap()).unwrap();
        assert_eq!(restored.address(), engine.address());
        assert_eq!(restored.statistics(), engine.statistics());
    }
}
