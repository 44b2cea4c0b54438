//! lendpool CLI
//!
//! Operator tooling for the lendpool ledger: market config management, rate
//! curve inspection and a scripted walkthrough against in-memory tokens.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use console::{style, Term};

use lendpool::core::admin::AdminController;
use lendpool::core::config::MarketConfig;
use lendpool::core::pool::LedgerPool;
use lendpool::core::rates::InterestRateModel;
use lendpool::core::token::{InMemoryTokens, TokenTransfer};
use lendpool::liquidation::engine::LiquidationEngine;
use lendpool::utils::address::Address;
use lendpool::utils::constants::{BPS_DIVISOR, WAD};
use lendpool::utils::math::{format_bps, format_wad};
use lendpool::utils::time::ManualClock;

/// lendpool CLI - multi-asset collateralized lending ledger
#[derive(Parser)]
#[command(name = "lendpool")]
#[command(version = lendpool::VERSION)]
#[command(about = "Operator tooling for the lendpool lending ledger", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to the market config file
    #[arg(short, long, env = "LENDPOOL_CONFIG", default_value = "lendpool.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default two-asset market config
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Load and validate the market config
    Validate,

    /// Print the rate curve of a listed asset
    Rates {
        /// Asset symbol (e.g. WETH)
        #[arg(short, long)]
        asset: String,

        /// Utilization step in basis points
        #[arg(short, long, default_value = "1000")]
        step: u64,
    },

    /// Run a deposit / borrow / price shock / liquidation walkthrough
    Demo {
        /// Collateral price drop in percent
        #[arg(short, long, default_value = "15")]
        shock: u64,

        /// Days of interest to accrue before the shock
        #[arg(short, long, default_value = "30")]
        days: u64,
    },
}

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    let term = Term::stdout();

    if let Err(e) = run_command(&cli, &term) {
        eprintln!("{} {}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }
}

fn run_command(cli: &Cli, term: &Term) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Init { force } => cmd_init(&cli.config, *force, term),
        Commands::Validate => cmd_validate(&cli.config, term),
        Commands::Rates { asset, step } => cmd_rates(&cli.config, asset, *step, term),
        Commands::Demo { shock, days } => cmd_demo(*shock, *days, term),
    }
}

/// Load the config file, falling back to the default market if it is absent
fn load_config(path: &Path) -> anyhow::Result<MarketConfig> {
    let config = if path.exists() {
        MarketConfig::load(path)?
    } else {
        MarketConfig::default()
    };
    Ok(config.with_env_overrides()?)
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMMAND HANDLERS
// ═══════════════════════════════════════════════════════════════════════════════

fn cmd_init(path: &Path, force: bool, term: &Term) -> anyhow::Result<()> {
    term.write_line(&format!(
        "{} Writing default market config...",
        style("→").cyan()
    ))?;

    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }

    let config = MarketConfig::default();
    config.save(path)?;

    term.write_line(&format!(
        "{} Config written to {}",
        style("✓").green(),
        style(path.display()).yellow()
    ))?;
    for listing in &config.assets {
        term.write_line(&format!("  {:<6} {}", listing.symbol, listing.asset))?;
    }
    Ok(())
}

fn cmd_validate(path: &Path, term: &Term) -> anyhow::Result<()> {
    let config = MarketConfig::load(path)?.with_env_overrides()?;
    config.validate()?;

    term.write_line(&format!(
        "{} {} is valid",
        style("✓").green(),
        path.display()
    ))?;
    term.write_line(&format!("  Admin:              {}", config.admin))?;
    term.write_line(&format!("  Pool custody:       {}", config.pool_address))?;
    match config.liquidation_engine {
        Some(engine) => term.write_line(&format!("  Liquidation engine: {}", engine))?,
        None => term.write_line(&format!(
            "  Liquidation engine: {}",
            style("not set").yellow()
        ))?,
    }
    term.write_line(&format!("  Seconds per year:   {}", config.seconds_per_year))?;
    for (index, listing) in config.assets.iter().enumerate() {
        term.write_line(&format!(
            "  [{}] {:<6} LTV {:>6}  threshold {:>6}  penalty {:>5}",
            index,
            listing.symbol,
            format_bps(listing.config.max_ltv_bps),
            format_bps(listing.config.liquidation_threshold_bps),
            format_bps(listing.config.liquidation_penalty_bps),
        ))?;
    }
    Ok(())
}

fn cmd_rates(path: &Path, symbol: &str, step: u64, term: &Term) -> anyhow::Result<()> {
    let config = load_config(path)?;
    let listing = config
        .listing(symbol)
        .ok_or_else(|| anyhow::anyhow!("asset {} is not listed", symbol))?;

    let admin = AdminController::new(config.admin)?;
    let mut model = InterestRateModel::new(admin).with_seconds_per_year(config.seconds_per_year);
    model.set_params(&config.admin, listing.asset, listing.rates)?;

    term.write_line(&format!(
        "{} Rate curve for {} (kink at {})",
        style("ℹ").blue(),
        style(&listing.symbol).yellow(),
        format_bps(listing.rates.kink_bps)
    ))?;
    term.write_line(&format!(
        "  {:>11}  {:>10}  {:>10}  {:>10}  {:>10}",
        "utilization", "borrow", "borrow APY", "supply", "supply APY"
    ))?;

    let step = step.max(1);
    let mut utilization = 0;
    while utilization <= BPS_DIVISOR {
        term.write_line(&format!(
            "  {:>11}  {:>10}  {:>10}  {:>10}  {:>10}",
            format_bps(utilization),
            format_bps(model.borrow_rate(&listing.asset, utilization)),
            format_bps(model.borrow_apy(&listing.asset, utilization)),
            format_bps(model.supply_rate(&listing.asset, utilization)),
            format_bps(model.supply_apy(&listing.asset, utilization)),
        ))?;
        utilization += step;
    }
    Ok(())
}

fn cmd_demo(shock: u64, days: u64, term: &Term) -> anyhow::Result<()> {
    if shock >= 100 {
        anyhow::bail!("price shock must be below 100%");
    }

    let config = MarketConfig::default();
    let clock = ManualClock::new(chrono::Utc::now().timestamp().max(0) as u64);
    let mut pool = LedgerPool::from_config(&config, InMemoryTokens::new(), clock.clone())?;
    let engine_address = config
        .liquidation_engine
        .ok_or_else(|| anyhow::anyhow!("default config has no liquidation engine"))?;
    let mut engine = LiquidationEngine::new(engine_address)?;

    let weth = config.assets[0].asset;
    let usdc = config.assets[1].asset;
    let custody = pool.address();

    let alice = Address::random();
    let bob = Address::random();
    let carol = Address::random();

    for (user, asset, amount) in [
        (alice, weth, 10 * WAD),
        (bob, usdc, 50_000 * WAD),
        (carol, usdc, 10_000 * WAD),
    ] {
        pool.tokens_mut().mint(&asset, &user, amount)?;
        pool.tokens_mut().approve(&asset, &user, &custody, u128::MAX)?;
    }

    let mut prices = vec![2_000 * WAD, WAD];

    term.write_line(&format!("{} Supplying liquidity", style("→").cyan()))?;
    pool.deposit(&alice, weth, 10 * WAD)?;
    pool.deposit(&bob, usdc, 50_000 * WAD)?;
    term.write_line(&format!("  alice supplied 10 WETH at $2000, bob supplied 50000 USDC"))?;

    term.write_line(&format!("{} Borrowing", style("→").cyan()))?;
    pool.borrow(&alice, usdc, 14_000 * WAD, &prices)?;
    let health = pool.health_factor(&alice, &prices)?;
    term.write_line(&format!(
        "  alice borrowed 14000 USDC, health factor {}",
        style(health).green()
    ))?;
    term.write_line(&format!(
        "  USDC utilization {}, borrow APY {}, supply APY {}",
        format_bps(pool.utilization(&usdc)),
        format_bps(pool.borrow_apy(&usdc)),
        format_bps(pool.supply_apy(&usdc)),
    ))?;

    clock.advance(days * 24 * 3600);
    pool.accrue_borrow_interest(&usdc);
    pool.accrue_interest(&usdc);
    term.write_line(&format!(
        "{} {} days later alice owes {} USDC",
        style("ℹ").blue(),
        days,
        format_wad(pool.debt_of(&usdc, &alice))
    ))?;

    prices[0] = prices[0] * (100 - shock as u128) / 100;
    let health = pool.health_factor(&alice, &prices)?;
    term.write_line(&format!(
        "{} WETH drops {}% to ${}: health factor {}",
        style("⚠").yellow(),
        shock,
        format_wad(prices[0]),
        if health.is_liquidatable() {
            style(health).red()
        } else {
            style(health).green()
        }
    ))?;

    let candidates = engine.find_liquidatable(&pool, &prices)?;
    if candidates.is_empty() {
        term.write_line(&format!(
            "{} No liquidatable accounts; try a larger --shock",
            style("✓").green()
        ))?;
        return Ok(());
    }

    let repay = pool.debt_of(&usdc, &alice).min(5_000 * WAD);
    let event = engine.liquidate(&mut pool, &carol, &alice, usdc, repay, weth, &prices)?;
    term.write_line(&format!(
        "{} carol repaid {} USDC and seized {} WETH",
        style("✓").green(),
        format_wad(event.repay_amount),
        format_wad(event.seized_amount)
    ))?;
    term.write_line(&format!(
        "  alice health factor now {}",
        pool.health_factor(&alice, &prices)?
    ))?;
    term.write_line(&format!(
        "  carol holds {} WETH",
        format_wad(pool.tokens().balance_of(&weth, &carol))
    ))?;

    pool.verify_invariants()?;
    term.write_line(&format!(
        "{} Ledger invariants hold, state hash {}",
        style("✓").green(),
        hex::encode(pool.state_hash())
    ))?;
    Ok(())
}
