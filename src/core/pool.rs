//! Lending ledger pool.
//!
//! The pool is the single entry point for account operations:
//! - Deposits and withdrawals against share-based supply accounting
//! - Borrows checked against loan-to-value capacity across all assets
//! - Repayments, including repayment on behalf of another account
//! - Collateral seizure, restricted to the configured liquidation engine
//!
//! Every operation is all-or-nothing. Single operations stage their
//! changes on copies and commit only after the token transfer succeeded;
//! multi-step flows run inside [`LedgerPool::atomic`], which restores the
//! ledger, reverses completed transfers and discards events on failure.

use alloy_primitives::U256;
use std::fmt;
use tracing::{debug, error, info, warn};

use crate::core::admin::AdminController;
use crate::core::config::MarketConfig;
use crate::core::health::{AccountSummary, AccountValues, HealthFactor};
use crate::core::ledger::{LedgerState, TokenState, UserPosition};
use crate::core::rates::{InterestRateModel, RateParams};
use crate::core::registry::{AssetConfig, AssetRegistry};
use crate::core::shares::SharePool;
use crate::core::token::TokenTransfer;
use crate::error::{Error, Result};
use crate::protocol::events::*;
use crate::utils::address::{Address, AssetId};
use crate::utils::constants::WAD;
use crate::utils::math::{apply_bps, safe_add, safe_sub, saturating_narrow, value_of};
use crate::utils::time::Clock;

// ═══════════════════════════════════════════════════════════════════════════════
// ATOMIC JOURNAL
// ═══════════════════════════════════════════════════════════════════════════════

/// Token movement completed inside an atomic section
#[derive(Debug, Clone)]
struct TransferRecord {
    asset: AssetId,
    from: Address,
    to: Address,
    amount: u128,
    /// Spender and allowance before a `transfer_from`
    allowance: Option<(Address, u128)>,
}

/// Work done inside the current atomic section
#[derive(Debug, Default)]
struct Journal {
    transfers: Vec<TransferRecord>,
    events: Vec<ProtocolEvent>,
}

/// Hypothetical debt change applied during a valuation sweep
#[derive(Debug, Clone, Copy)]
enum DebtDelta {
    Increase(u128),
    Decrease(u128),
}

impl DebtDelta {
    fn apply(self, debt: u128) -> u128 {
        match self {
            DebtDelta::Increase(amount) => debt.saturating_add(amount),
            DebtDelta::Decrease(amount) => debt.saturating_sub(amount),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// LEDGER POOL
// ═══════════════════════════════════════════════════════════════════════════════

/// Multi-asset lending ledger
pub struct LedgerPool<T: TokenTransfer> {
    /// Custody account holding all supplied funds
    address: Address,
    /// Administrator capability
    admin: AdminController,
    /// Allowed assets and risk configuration
    registry: AssetRegistry,
    /// Rate curves
    rates: InterestRateModel,
    /// Market totals and positions
    state: LedgerState,
    /// Token backend
    tokens: T,
    /// Time source for accrual
    clock: Box<dyn Clock>,
    /// Only identity allowed to seize collateral
    liquidation_engine: Option<Address>,
    /// Published events
    events: EventLog,
    /// Active atomic section, if any
    journal: Option<Journal>,
}

impl<T: TokenTransfer> fmt::Debug for LedgerPool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LedgerPool")
            .field("address", &self.address)
            .field("admin", &self.admin.admin())
            .field("assets", &self.registry.assets())
            .field("accounts", &self.state.account_count())
            .field("liquidation_engine", &self.liquidation_engine)
            .finish()
    }
}

impl<T: TokenTransfer> LedgerPool<T> {
    /// Create an empty pool with custody account `address`
    pub fn new(
        address: Address,
        admin: AdminController,
        rates: InterestRateModel,
        tokens: T,
        clock: impl Clock + 'static,
    ) -> Result<Self> {
        if address.is_zero() {
            return Err(Error::InvalidAddress(address));
        }
        Ok(Self {
            address,
            admin,
            registry: AssetRegistry::new(admin),
            rates,
            state: LedgerState::new(),
            tokens,
            clock: Box::new(clock),
            liquidation_engine: None,
            events: EventLog::new(),
            journal: None,
        })
    }

    /// Build a pool from a market config through the admin surface
    pub fn from_config(config: &MarketConfig, tokens: T, clock: impl Clock + 'static) -> Result<Self> {
        config.validate()?;
        let admin = AdminController::new(config.admin)?;
        let rates = InterestRateModel::new(admin).with_seconds_per_year(config.seconds_per_year);
        let mut pool =
            Self::new(config.pool_address, admin, rates, tokens, clock)?.with_max_events(config.max_events);

        for listing in &config.assets {
            pool.set_asset_config(&config.admin, listing.asset, listing.config)?;
            pool.set_rate_params(&config.admin, listing.asset, listing.rates)?;
            pool.add_allowed_asset(&config.admin, listing.asset)?;
        }
        if let Some(engine) = config.liquidation_engine {
            pool.set_liquidation_contract(&config.admin, engine)?;
        }

        info!(
            "Market bootstrapped: {} assets, pool {}",
            config.assets.len(),
            config.pool_address
        );
        Ok(pool)
    }

    /// Keep at most `max_events` published events
    pub fn with_max_events(mut self, max_events: usize) -> Self {
        let mut log = EventLog::with_capacity(max_events);
        for event in self.events.drain() {
            log.push(event);
        }
        self.events = log;
        self
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // ADMINISTRATION
    // ═══════════════════════════════════════════════════════════════════════════

    /// Allow an asset; its market clocks start now. No-op if already allowed.
    pub fn add_allowed_asset(&mut self, caller: &Address, asset: AssetId) -> Result<()> {
        if !self.registry.add_allowed_asset(caller, asset)? {
            return Ok(());
        }
        let now = self.clock.now();
        self.state.init_token(asset, now);
        let index = self.registry.len() - 1;

        info!("Asset {} allowed at price index {}", asset, index);
        self.emit(ProtocolEvent::AssetListed(AssetListedEvent {
            asset,
            index,
            timestamp: now,
        }));
        Ok(())
    }

    /// Set the risk configuration of an asset
    pub fn set_asset_config(
        &mut self,
        caller: &Address,
        asset: AssetId,
        config: AssetConfig,
    ) -> Result<()> {
        self.registry.set_asset_config(caller, asset, config)?;
        let now = self.clock.now();
        self.state.init_token(asset, now);

        info!(
            "Asset {} configured: ltv {} bps, threshold {} bps, penalty {} bps",
            asset, config.max_ltv_bps, config.liquidation_threshold_bps, config.liquidation_penalty_bps
        );
        self.emit(ProtocolEvent::AssetConfigured(AssetConfiguredEvent {
            asset,
            config,
            timestamp: now,
        }));
        Ok(())
    }

    /// Set the rate curve of an asset; interest up to now accrues at the old curve
    pub fn set_rate_params(
        &mut self,
        caller: &Address,
        asset: AssetId,
        params: RateParams,
    ) -> Result<()> {
        self.admin.authorize(caller, "set_rate_params")?;
        params.validate()?;
        self.accrue_interest(&asset);
        self.accrue_borrow_interest(&asset);
        self.rates.set_params(caller, asset, params)?;

        info!(
            "Rate curve for {} set: base {} bps, kink {} bps",
            asset, params.base_rate_bps, params.kink_bps
        );
        let timestamp = self.clock.now();
        self.emit(ProtocolEvent::RateParamsUpdated(RateParamsUpdatedEvent {
            asset,
            params,
            timestamp,
        }));
        Ok(())
    }

    /// Set the only identity allowed to seize collateral
    pub fn set_liquidation_contract(&mut self, caller: &Address, engine: Address) -> Result<()> {
        self.admin.authorize(caller, "set_liquidation_contract")?;
        if engine.is_zero() {
            return Err(Error::InvalidAddress(engine));
        }
        let previous = self.liquidation_engine.replace(engine);

        info!("Liquidation engine set to {}", engine);
        let timestamp = self.clock.now();
        self.emit(ProtocolEvent::LiquidationEngineSet(LiquidationEngineSetEvent {
            previous,
            engine,
            timestamp,
        }));
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // INTEREST ACCRUAL
    // ═══════════════════════════════════════════════════════════════════════════

    /// Accrue supply-side interest of an asset up to now
    pub fn accrue_interest(&mut self, asset: &AssetId) {
        let now = self.clock.now();
        if let Some(mut token) = self.state.token(asset).copied() {
            self.accrue_supply_into(asset, &mut token, now);
            self.state.put_token(*asset, token);
        }
    }

    /// Accrue borrow-side interest of an asset up to now
    pub fn accrue_borrow_interest(&mut self, asset: &AssetId) {
        let now = self.clock.now();
        if let Some(mut token) = self.state.token(asset).copied() {
            self.accrue_borrow_into(asset, &mut token, now);
            self.state.put_token(*asset, token);
        }
    }

    fn accrue_supply_into(&self, asset: &AssetId, token: &mut TokenState, now: u64) {
        let rate = self.rates.supply_rate(asset, token.utilization());
        let interest = token.accrue_supply(rate, now, self.rates.seconds_per_year());
        if interest > 0 {
            debug!("Supply interest on {}: {} at {} bps", asset, interest, rate);
        }
    }

    fn accrue_borrow_into(&self, asset: &AssetId, token: &mut TokenState, now: u64) {
        let rate = self.rates.borrow_rate(asset, token.utilization());
        let interest = token.accrue_borrow(rate, now, self.rates.seconds_per_year());
        if interest > 0 {
            debug!("Borrow interest on {}: {} at {} bps", asset, interest, rate);
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // ACCOUNT OPERATIONS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Supply `amount` of `asset`; the caller must have approved the pool
    pub fn deposit(&mut self, caller: &Address, asset: AssetId, amount: u128) -> Result<()> {
        if !self.registry.is_allowed(&asset) {
            return Err(Error::TokenNotAllowed(asset));
        }
        if amount == 0 {
            return Err(Error::InvalidAmount);
        }

        let now = self.clock.now();
        let mut token = self.staged_token(&asset)?;
        self.accrue_supply_into(&asset, &mut token, now);

        let cap = self.registry.config(&asset).supply_cap;
        let total = safe_add(token.total_deposits(), amount)?;
        if total > cap {
            return Err(Error::CapExceeded {
                asset,
                requested: total,
                cap,
            });
        }

        let shares = token.supply.mint(amount)?;
        let mut position = self.state.position(caller, &asset);
        position.supply_shares = safe_add(position.supply_shares, shares)?;

        self.pull(&asset, caller, amount)?;
        self.commit(asset, token, *caller, position);

        debug!("Deposit: {} supplied {} of {} ({} shares)", caller, amount, asset, shares);
        self.emit(ProtocolEvent::Deposit(BalanceEvent {
            asset,
            account: *caller,
            amount,
            timestamp: now,
        }));
        Ok(())
    }

    /// Withdraw `amount` of the caller's supplied `asset`.
    ///
    /// Withdrawals are not checked against outstanding debt.
    pub fn withdraw(&mut self, caller: &Address, asset: AssetId, amount: u128) -> Result<()> {
        if amount == 0 {
            return Err(Error::InvalidAmount);
        }

        let now = self.clock.now();
        let mut token = self.staged_token(&asset)?;
        self.accrue_supply_into(&asset, &mut token, now);

        let mut position = self.state.position(caller, &asset);
        let balance = token.supply.principal_for_shares(position.supply_shares);
        if amount > balance {
            return Err(Error::InsufficientBalance {
                asset,
                requested: amount,
                available: balance,
            });
        }
        let liquidity = token.available_liquidity();
        if amount > liquidity {
            return Err(Error::InsufficientLiquidity {
                asset,
                requested: amount,
                available: liquidity,
            });
        }

        let shares = Self::shares_to_retire(&token.supply, amount, balance, position.supply_shares)?;
        token.supply.burn(amount, shares)?;
        position.supply_shares = safe_sub(position.supply_shares, shares)?;

        self.push(&asset, caller, amount)?;
        self.commit(asset, token, *caller, position);

        debug!("Withdraw: {} took {} of {} ({} shares)", caller, amount, asset, shares);
        self.emit(ProtocolEvent::Withdraw(BalanceEvent {
            asset,
            account: *caller,
            amount,
            timestamp: now,
        }));
        Ok(())
    }

    /// Borrow `amount` of `asset` against the caller's collateral
    pub fn borrow(
        &mut self,
        caller: &Address,
        asset: AssetId,
        amount: u128,
        prices: &[u128],
    ) -> Result<()> {
        if !self.registry.is_allowed(&asset) {
            return Err(Error::TokenNotAllowed(asset));
        }
        if amount == 0 {
            return Err(Error::InvalidAmount);
        }

        let now = self.clock.now();
        let mut token = self.staged_token(&asset)?;
        self.accrue_borrow_into(&asset, &mut token, now);

        let cap = self.registry.config(&asset).borrow_cap;
        let total = safe_add(token.total_borrows(), amount)?;
        if total > cap {
            return Err(Error::ExceedsBorrowCap {
                asset,
                requested: total,
                cap,
            });
        }
        let liquidity = token.available_liquidity();
        if amount > liquidity {
            return Err(Error::InsufficientLiquidity {
                asset,
                requested: amount,
                available: liquidity,
            });
        }

        let price = self.registry.price_of(prices, &asset)?;
        let values = self.sweep(caller, prices, Some((&asset, &token)), None)?;
        let requested = value_of(amount, price);
        let remaining = values.remaining_capacity();
        if requested > remaining {
            let wad = U256::from(WAD);
            return Err(Error::ExceedsCollateralLimit {
                requested_value: saturating_narrow(requested / wad),
                available_value: saturating_narrow(remaining / wad),
            });
        }

        let shares = token.borrow.mint(amount)?;
        let mut position = self.state.position(caller, &asset);
        position.borrow_shares = safe_add(position.borrow_shares, shares)?;

        self.push(&asset, caller, amount)?;
        self.commit(asset, token, *caller, position);

        debug!("Borrow: {} took {} of {} ({} shares)", caller, amount, asset, shares);
        self.emit(ProtocolEvent::Borrow(BalanceEvent {
            asset,
            account: *caller,
            amount,
            timestamp: now,
        }));
        Ok(())
    }

    /// Repay up to `amount` of the caller's debt; returns the amount applied
    pub fn repay(&mut self, caller: &Address, asset: AssetId, amount: u128) -> Result<u128> {
        self.repay_for(caller, caller, asset, amount)
    }

    /// Repay up to `amount` of `borrower`'s debt with funds pulled from `payer`.
    ///
    /// A partial repayment is charged the value of the whole borrow shares it
    /// retires, which may be a few wei below `amount`.
    pub fn repay_for(
        &mut self,
        payer: &Address,
        borrower: &Address,
        asset: AssetId,
        amount: u128,
    ) -> Result<u128> {
        if amount == 0 {
            return Err(Error::InvalidAmount);
        }

        let now = self.clock.now();
        let mut token = self.staged_token(&asset)?;
        self.accrue_borrow_into(&asset, &mut token, now);

        let mut position = self.state.position(borrower, &asset);
        if position.borrow_shares == 0 {
            return Err(Error::NothingToRepay {
                asset,
                account: *borrower,
            });
        }

        let debt = token.borrow.principal_for_shares(position.borrow_shares);
        let (repaid, shares) = Self::debt_to_retire(&token.borrow, amount, debt, position.borrow_shares)?;
        token.borrow.burn(repaid, shares)?;
        position.borrow_shares = safe_sub(position.borrow_shares, shares)?;

        if repaid > 0 {
            self.pull(&asset, payer, repaid)?;
        }
        self.commit(asset, token, *borrower, position);

        debug!(
            "Repay: {} repaid {} of {}'s {} debt ({} shares)",
            payer, repaid, borrower, asset, shares
        );
        self.emit(ProtocolEvent::Repay(RepayEvent {
            asset,
            borrower: *borrower,
            payer: *payer,
            amount: repaid,
            timestamp: now,
        }));
        Ok(repaid)
    }

    /// Move `amount` of `user`'s supplied `asset` to the liquidation engine
    pub fn seize_collateral(
        &mut self,
        caller: &Address,
        asset: AssetId,
        user: &Address,
        amount: u128,
    ) -> Result<()> {
        if self.liquidation_engine != Some(*caller) {
            return Err(Error::Unauthorized(format!(
                "{} is not the liquidation engine",
                caller
            )));
        }
        if amount == 0 {
            return Err(Error::InvalidAmount);
        }

        let now = self.clock.now();
        let mut token = self.staged_token(&asset)?;
        self.accrue_supply_into(&asset, &mut token, now);

        let mut position = self.state.position(user, &asset);
        let balance = token.supply.principal_for_shares(position.supply_shares);
        if amount > balance {
            return Err(Error::InsufficientBalance {
                asset,
                requested: amount,
                available: balance,
            });
        }

        let shares = Self::shares_to_retire(&token.supply, amount, balance, position.supply_shares)?;
        token.supply.burn(amount, shares)?;
        position.supply_shares = safe_sub(position.supply_shares, shares)?;

        self.push(&asset, caller, amount)?;
        self.commit(asset, token, *user, position);

        debug!("Seized {} of {} from {}", amount, asset, user);
        Ok(())
    }

    /// Run `f` all-or-nothing.
    ///
    /// On error the ledger is restored, completed transfers are reversed and
    /// events raised inside `f` are dropped. Nested calls join the outer section.
    pub fn atomic<R>(&mut self, f: impl FnOnce(&mut Self) -> Result<R>) -> Result<R> {
        if self.journal.is_some() {
            return f(self);
        }

        let checkpoint = self.state.clone();
        self.journal = Some(Journal::default());
        let result = f(self);
        let journal = self.journal.take().unwrap_or_default();

        match result {
            Ok(value) => {
                for event in journal.events {
                    self.events.push(event);
                }
                Ok(value)
            }
            Err(e) => {
                warn!(
                    "Atomic operation failed, rolling back {} transfers: {}",
                    journal.transfers.len(),
                    e
                );
                self.state = checkpoint;
                self.unwind(journal.transfers);
                Err(e)
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // QUERIES
    // ═══════════════════════════════════════════════════════════════════════════

    /// Supply balance of `user`, rounded down
    pub fn balance_of(&self, asset: &AssetId, user: &Address) -> u128 {
        self.state.balance_of(asset, user)
    }

    /// Debt of `user`, rounded down
    pub fn debt_of(&self, asset: &AssetId, user: &Address) -> u128 {
        self.state.debt_of(asset, user)
    }

    /// Share position of `user`
    pub fn position(&self, user: &Address, asset: &AssetId) -> UserPosition {
        self.state.position(user, asset)
    }

    /// Health factor of `user` at `prices`
    pub fn health_factor(&self, user: &Address, prices: &[u128]) -> Result<HealthFactor> {
        Ok(self.sweep(user, prices, None, None)?.health_factor())
    }

    /// Health factor if `user` borrowed `amount` more of `asset`
    pub fn preview_health_factor_after_borrow(
        &self,
        user: &Address,
        asset: &AssetId,
        amount: u128,
        prices: &[u128],
    ) -> Result<HealthFactor> {
        if !self.registry.is_allowed(asset) {
            return Err(Error::TokenNotAllowed(*asset));
        }
        let delta = Some((asset, DebtDelta::Increase(amount)));
        Ok(self.sweep(user, prices, None, delta)?.health_factor())
    }

    /// Health factor if `user` repaid `amount` of `asset`
    pub fn preview_health_factor_after_repay(
        &self,
        user: &Address,
        asset: &AssetId,
        amount: u128,
        prices: &[u128],
    ) -> Result<HealthFactor> {
        if !self.registry.is_allowed(asset) {
            return Err(Error::TokenNotAllowed(*asset));
        }
        let delta = Some((asset, DebtDelta::Decrease(amount)));
        Ok(self.sweep(user, prices, None, delta)?.health_factor())
    }

    /// USD view of `user` at `prices`
    pub fn account_summary(&self, user: &Address, prices: &[u128]) -> Result<AccountSummary> {
        Ok(self.sweep(user, prices, None, None)?.into())
    }

    /// Deposits of `asset` not currently lent out
    pub fn available_liquidity(&self, asset: &AssetId) -> u128 {
        self.state
            .token(asset)
            .map(|t| t.available_liquidity())
            .unwrap_or(0)
    }

    /// Utilization of `asset` (bps)
    pub fn utilization(&self, asset: &AssetId) -> u64 {
        self.state.token(asset).map(|t| t.utilization()).unwrap_or(0)
    }

    /// Current annual borrow rate of `asset` (bps)
    pub fn borrow_rate(&self, asset: &AssetId) -> u64 {
        self.rates.borrow_rate(asset, self.utilization(asset))
    }

    /// Current annual supply rate of `asset` (bps)
    pub fn supply_rate(&self, asset: &AssetId) -> u64 {
        self.rates.supply_rate(asset, self.utilization(asset))
    }

    /// Current compounded borrow APY of `asset` (bps)
    pub fn borrow_apy(&self, asset: &AssetId) -> u64 {
        self.rates.borrow_apy(asset, self.utilization(asset))
    }

    /// Current compounded supply APY of `asset` (bps)
    pub fn supply_apy(&self, asset: &AssetId) -> u64 {
        self.rates.supply_apy(asset, self.utilization(asset))
    }

    /// Market totals of `asset`
    pub fn token_state(&self, asset: &AssetId) -> Option<&TokenState> {
        self.state.token(asset)
    }

    /// Accounts holding any position
    pub fn accounts(&self) -> Vec<Address> {
        let mut accounts: Vec<_> = self.state.accounts().copied().collect();
        accounts.sort();
        accounts
    }

    /// Custody account
    pub fn address(&self) -> Address {
        self.address
    }

    /// Administrator identity
    pub fn admin(&self) -> Address {
        self.admin.admin()
    }

    /// Configured liquidation engine
    pub fn liquidation_engine(&self) -> Option<Address> {
        self.liquidation_engine
    }

    /// Asset registry
    pub fn registry(&self) -> &AssetRegistry {
        &self.registry
    }

    /// Rate model
    pub fn rates(&self) -> &InterestRateModel {
        &self.rates
    }

    /// Token backend
    pub fn tokens(&self) -> &T {
        &self.tokens
    }

    /// Token backend, for funding and approvals outside the ledger
    pub fn tokens_mut(&mut self) -> &mut T {
        &mut self.tokens
    }

    /// Current time of the pool clock
    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    /// Published events
    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Take all published events
    pub fn drain_events(&mut self) -> Vec<ProtocolEvent> {
        self.events.drain()
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // STATE
    // ═══════════════════════════════════════════════════════════════════════════

    /// Ledger state
    pub fn state(&self) -> &LedgerState {
        &self.state
    }

    /// Check share conservation
    pub fn verify_invariants(&self) -> Result<()> {
        self.state.verify_invariants()
    }

    /// Serialize the ledger state
    pub fn snapshot(&self) -> Result<Vec<u8>> {
        self.state.to_bytes()
    }

    /// Replace the ledger state with a snapshot
    pub fn restore_snapshot(&mut self, bytes: &[u8]) -> Result<()> {
        let state = LedgerState::from_bytes(bytes)?;
        state.verify_invariants()?;
        self.state = state;
        Ok(())
    }

    /// Hash of the ledger state
    pub fn state_hash(&self) -> [u8; 32] {
        self.state.state_hash()
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // INTERNAL
    // ═══════════════════════════════════════════════════════════════════════════

    /// Copy of a market's totals to stage changes on
    fn staged_token(&self, asset: &AssetId) -> Result<TokenState> {
        self.state
            .token(asset)
            .copied()
            .ok_or(Error::TokenNotAllowed(*asset))
    }

    fn commit(&mut self, asset: AssetId, token: TokenState, user: Address, position: UserPosition) {
        self.state.put_token(asset, token);
        self.state.set_position(user, asset, position);
    }

    /// Supply shares to retire when removing `amount` of a holder's `claim`.
    ///
    /// Removing the whole claim retires every share so no dust remains.
    /// Partial removals round up, so the exchange rate never falls.
    fn shares_to_retire(
        pool: &SharePool,
        amount: u128,
        claim: u128,
        held: u128,
    ) -> Result<u128> {
        if amount == claim {
            return Ok(held);
        }
        let shares = pool.shares_for_principal_up(amount)?.min(held);
        if shares == 0 {
            return Err(Error::InvalidAmount);
        }
        Ok(shares)
    }

    /// Debt applied and borrow shares retired when repaying `amount` of `debt`.
    ///
    /// Clearing the debt retires every share. A partial repayment retires
    /// whole shares rounded down and is charged their value rounded down.
    fn debt_to_retire(
        pool: &SharePool,
        amount: u128,
        debt: u128,
        held: u128,
    ) -> Result<(u128, u128)> {
        if amount >= debt {
            return Ok((debt, held));
        }
        let shares = pool.shares_for_principal(amount)?.min(held);
        if shares == 0 {
            return Err(Error::InvalidAmount);
        }
        Ok((pool.principal_for_shares(shares), shares))
    }

    /// Value every allowed asset of `user`, optionally with a staged market
    /// and a hypothetical debt change
    fn sweep(
        &self,
        user: &Address,
        prices: &[u128],
        staged: Option<(&AssetId, &TokenState)>,
        debt_delta: Option<(&AssetId, DebtDelta)>,
    ) -> Result<AccountValues> {
        let mut values = AccountValues::default();

        for (asset, price) in self.registry.priced(prices)? {
            let token = match staged {
                Some((staged_asset, token)) if staged_asset == asset => *token,
                _ => match self.state.token(asset) {
                    Some(token) => *token,
                    None => continue,
                },
            };
            let position = self.state.position(user, asset);
            let config = self.registry.config(asset);

            let balance = token.supply.principal_for_shares(position.supply_shares);
            let mut debt = token.borrow.principal_for_shares(position.borrow_shares);
            if let Some((delta_asset, delta)) = debt_delta {
                if delta_asset == asset {
                    debt = delta.apply(debt);
                }
            }

            if balance > 0 {
                let value = value_of(balance, price);
                values.collateral_value = values.collateral_value.saturating_add(value);
                values.borrow_capacity = values
                    .borrow_capacity
                    .saturating_add(apply_bps(value, config.max_ltv_bps)?);
                values.liquidation_value = values
                    .liquidation_value
                    .saturating_add(apply_bps(value, config.liquidation_threshold_bps)?);
            }
            if debt > 0 {
                values.debt_value = values.debt_value.saturating_add(value_of(debt, price));
            }
        }

        Ok(values)
    }

    /// Pull `amount` from `from` into custody using the pool's allowance
    pub(crate) fn pull(&mut self, asset: &AssetId, from: &Address, amount: u128) -> Result<()> {
        let custody = self.address;
        let before = self.tokens.allowance(asset, from, &custody);
        self.tokens.transfer_from(asset, &custody, from, &custody, amount)?;
        self.record(TransferRecord {
            asset: *asset,
            from: *from,
            to: custody,
            amount,
            allowance: Some((custody, before)),
        });
        Ok(())
    }

    /// Pay `amount` out of custody to `to`
    pub(crate) fn push(&mut self, asset: &AssetId, to: &Address, amount: u128) -> Result<()> {
        let custody = self.address;
        self.forward(asset, &custody, to, amount)
    }

    /// Move `amount` between two accounts, journaled inside atomic sections
    pub(crate) fn forward(
        &mut self,
        asset: &AssetId,
        from: &Address,
        to: &Address,
        amount: u128,
    ) -> Result<()> {
        self.tokens.transfer(asset, from, to, amount)?;
        self.record(TransferRecord {
            asset: *asset,
            from: *from,
            to: *to,
            amount,
            allowance: None,
        });
        Ok(())
    }

    fn record(&mut self, record: TransferRecord) {
        if let Some(journal) = self.journal.as_mut() {
            journal.transfers.push(record);
        }
    }

    /// Publish an event, or buffer it inside an atomic section
    pub(crate) fn emit(&mut self, event: ProtocolEvent) {
        match self.journal.as_mut() {
            Some(journal) => journal.events.push(event),
            None => self.events.push(event),
        }
    }

    /// Reverse completed transfers, newest first
    fn unwind(&mut self, transfers: Vec<TransferRecord>) {
        for record in transfers.into_iter().rev() {
            if let Err(e) = self
                .tokens
                .transfer(&record.asset, &record.to, &record.from, record.amount)
            {
                error!(
                    "Failed to reverse transfer of {} {} from {} to {}: {}",
                    record.amount, record.asset, record.from, record.to, e
                );
                continue;
            }
            if let Some((spender, before)) = record.allowance {
                if let Err(e) = self
                    .tokens
                    .approve(&record.asset, &record.from, &spender, before)
                {
                    error!("Failed to restore allowance of {} for {}: {}", spender, record.from, e);
                }
            }
        }
    }
}
