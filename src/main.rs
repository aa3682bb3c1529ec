use alerter::{run_alerter_service, TelegramAlerter};
use anyhow::Context;
use api_client::{BinanceClient, MarketDataSource};
use chrono::{TimeZone, Utc};
use clap::{Parser, Subcommand};
use comfy_table::Table;
use configuration::{Config, ConfigArgs, LoggingSettings, SettingsRiskProvider};
use core_types::{Signal, SignalResult};
use database::{FallbackStore, JsonStore, PgStore, SignalStore};
use engine::{MonitorOutcome, ScanOrchestrator, ScanOutcome, ScanServices, Scheduler, SignalMonitor};
use events::EngineEvent;
use std::sync::Arc;
use std::time::Duration;
use strategies::SupplyDemandZone;
use tokio::sync::broadcast;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

type Store = FallbackStore<PgStore, JsonStore>;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// The main entry point for the Tradewind signal scanner.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine; real environment variables still apply.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = configuration::load_config_from(&cli.config.config)
        .with_context(|| format!("loading {}", cli.config.config.display()))?;
    let _log_guard = init_tracing(&config.logging);

    match cli.command {
        Commands::Run => handle_run(&cli.config, &config).await,
        Commands::Scan(args) => handle_scan(args, &cli.config, &config).await,
        Commands::Monitor => handle_monitor(&config).await,
        Commands::Signals(args) => handle_signals(args, &config).await,
        Commands::Close(args) => handle_close(args, &config).await,
        Commands::Zones(args) => handle_zones(args, &config).await,
    }
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// Scans markets for supply/demand, key-level and breakout setups and tracks
/// the resulting signals.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scheduler, the signal monitor and the alerter until Ctrl-C.
    Run,
    /// Run a single scan.
    Scan(ScanArgs),
    /// Run a single monitor pass over the active signals.
    Monitor,
    /// List stored signals.
    Signals(SignalsArgs),
    /// Close an active signal by hand.
    Close(CloseArgs),
    /// Print the supply/demand zones currently intact for a symbol.
    Zones(ZonesArgs),
}

#[derive(Parser)]
struct ScanArgs {
    /// Scan even if the next scan is not due yet.
    #[arg(long)]
    force: bool,
}

#[derive(Parser)]
struct SignalsArgs {
    /// Only show signals that are still active.
    #[arg(long)]
    active: bool,
}

#[derive(Parser)]
struct CloseArgs {
    /// The signal id.
    #[arg(long)]
    id: String,

    /// WIN, LOSS, BREAK_EVEN or EXPIRED.
    #[arg(long)]
    result: SignalResult,
}

#[derive(Parser)]
struct ZonesArgs {
    /// The symbol to analyse (e.g., "EURUSD").
    #[arg(long)]
    symbol: String,

    /// The candle interval (e.g., "1h", "4h").
    #[arg(long, default_value = "1h")]
    interval: String,

    /// Number of candles to fetch.
    #[arg(long, default_value_t = 500)]
    limit: usize,

    /// Print the zones as JSON instead of a table.
    #[arg(long)]
    json: bool,
}

// ==============================================================================
// Wiring
// ==============================================================================

/// Stdout plus a daily-rolling file. The returned guard flushes the file
/// writer on drop and must live until exit.
fn init_tracing(settings: &LoggingSettings) -> WorkerGuard {
    let file_appender =
        tracing_appender::rolling::daily(&settings.directory, &settings.file_prefix);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stdout).with_target(false).compact())
        .with(fmt::layer().with_writer(file_writer).with_ansi(false))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    guard
}

/// PostgreSQL when `DATABASE_URL` is set and reachable, always mirrored into
/// the JSON store under the data directory.
async fn open_store(config: &Config) -> anyhow::Result<Arc<Store>> {
    let json = JsonStore::open(&config.store.data_dir)
        .await
        .with_context(|| format!("opening data directory {}", config.store.data_dir))?;

    let primary = if std::env::var("DATABASE_URL").is_ok() {
        match PgStore::connect_and_migrate().await {
            Ok(pg) => {
                tracing::info!("Using PostgreSQL with JSON fallback.");
                Some(pg)
            }
            Err(e) => {
                tracing::warn!(error = %e, "PostgreSQL unavailable, using the JSON store only.");
                None
            }
        }
    } else {
        tracing::info!("DATABASE_URL not set, using the JSON store only.");
        None
    };

    Ok(Arc::new(FallbackStore::new(primary, json)))
}

fn market_data(config: &Config) -> anyhow::Result<Arc<dyn MarketDataSource>> {
    let client = BinanceClient::new(&config.market_data).context("building market data client")?;
    Ok(Arc::new(client))
}

fn orchestrator(
    config: &Config,
    args: &ConfigArgs,
    market_data: Arc<dyn MarketDataSource>,
    store: Arc<Store>,
    events: broadcast::Sender<EngineEvent>,
) -> anyhow::Result<ScanOrchestrator> {
    let services = ScanServices {
        market_data,
        signals: store.clone(),
        scan_state: store,
        risk: Arc::new(SettingsRiskProvider::new(&args.config)),
        events,
    };
    ScanOrchestrator::from_config(config, services).context("building strategies")
}

// ==============================================================================
// Command Handlers
// ==============================================================================

async fn handle_run(args: &ConfigArgs, config: &Config) -> anyhow::Result<()> {
    let market_data = market_data(config)?;
    let store = open_store(config).await?;
    let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

    match TelegramAlerter::new(&config.telegram) {
        Some(alerter) => {
            tokio::spawn(run_alerter_service(alerter, events.subscribe()));
        }
        None => tracing::info!("Telegram alerts disabled."),
    }

    let scanner = orchestrator(config, args, market_data.clone(), store.clone(), events.clone())?;
    let monitor = SignalMonitor::new(market_data, store, events, config.monitor.clone());
    let scheduler = Scheduler::new(
        Arc::new(scanner),
        Arc::new(monitor),
        Duration::from_secs(config.scanner.tick_secs),
        Duration::from_secs(config.monitor.interval_secs),
    );

    scheduler
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl-C.");
            }
        })
        .await;
    Ok(())
}

async fn handle_scan(scan: ScanArgs, args: &ConfigArgs, config: &Config) -> anyhow::Result<()> {
    let market_data = market_data(config)?;
    let store = open_store(config).await?;
    let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
    let scanner = orchestrator(config, args, market_data, store, events)?;

    let now = Utc::now();
    let outcome = if scan.force {
        scanner.scan(now).await
    } else {
        scanner.tick(now).await
    };

    match outcome {
        ScanOutcome::Busy => println!("A scan is already running."),
        ScanOutcome::NotDue { next_scan_at } => {
            println!("Next scan is due at {next_scan_at}. Use --force to scan now.")
        }
        ScanOutcome::LimitReached { today, limit } => {
            println!("Daily limit reached ({today}/{limit}).")
        }
        ScanOutcome::Emitted { signal, strategy } => {
            println!("New signal from {strategy}:");
            println!("{}", signals_table(std::slice::from_ref(&signal)));
        }
        ScanOutcome::NoSignal => println!("No signal found."),
    }
    Ok(())
}

async fn handle_monitor(config: &Config) -> anyhow::Result<()> {
    let market_data = market_data(config)?;
    let store = open_store(config).await?;
    let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
    let monitor = SignalMonitor::new(market_data, store, events, config.monitor.clone());

    match monitor.run_once(Utc::now()).await {
        MonitorOutcome::Busy => println!("A monitor pass is already running."),
        MonitorOutcome::Completed(report) => {
            println!("Checked {} active signal(s).", report.checked);
            for closure in &report.closed {
                println!("  {} {} {} -> {}", closure.id, closure.direction, closure.symbol, closure.result);
            }
            if !report.skipped_symbols.is_empty() {
                println!("No price for: {}", report.skipped_symbols.join(", "));
            }
        }
    }
    Ok(())
}

async fn handle_signals(args: SignalsArgs, config: &Config) -> anyhow::Result<()> {
    let store = open_store(config).await?;
    let signals = if args.active {
        store.list_active_signals().await?
    } else {
        store.list_signals().await?
    };

    if signals.is_empty() {
        println!("No signals.");
    } else {
        println!("{}", signals_table(&signals));
    }
    Ok(())
}

async fn handle_close(args: CloseArgs, config: &Config) -> anyhow::Result<()> {
    let store = open_store(config).await?;
    let changed = store
        .update_signal_resolution(&args.id, args.result, Utc::now())
        .await
        .with_context(|| format!("closing signal {}", args.id))?;

    if changed {
        tracing::info!(id = %args.id, result = %args.result, "Signal closed by operator.");
        println!("Signal {} closed as {}.", args.id, args.result);
    } else {
        println!("Signal {} is not active (or does not exist); nothing changed.", args.id);
    }
    Ok(())
}

async fn handle_zones(args: ZonesArgs, config: &Config) -> anyhow::Result<()> {
    let market_data = market_data(config)?;
    let candles = market_data
        .fetch_candles(&args.symbol, &args.interval, args.limit)
        .await
        .with_context(|| format!("fetching {} {} candles", args.symbol, args.interval))?;
    let zones = strategies::detect_zones(&candles);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&zones)?);
        return Ok(());
    }

    let Some(last) = candles.last() else {
        println!("No candles for {}.", args.symbol);
        return Ok(());
    };
    println!(
        "{} {}: {} candles, last close {:.5}, {} intact zone(s).",
        args.symbol,
        args.interval,
        candles.len(),
        last.close,
        zones.len()
    );
    if !zones.is_empty() {
        println!("{}", zones_table(&zones, last.close));
    }
    Ok(())
}

// ==============================================================================
// Rendering
// ==============================================================================

fn signals_table(signals: &[Signal]) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        "ID", "Created", "Market", "Symbol", "Type", "Entry", "Stop", "Target", "Conf", "Status", "Result",
    ]);
    for s in signals {
        table.add_row(vec![
            s.id.chars().take(8).collect::<String>(),
            s.created_at.format("%Y-%m-%d %H:%M").to_string(),
            s.market.to_string(),
            s.symbol.clone(),
            s.direction.to_string(),
            format!("{:.5}", s.entry),
            format!("{:.5}", s.stop_loss),
            s.take_profit.to_string(),
            s.confidence.map(|c| format!("{:.0}%", c * 100.0)).unwrap_or_default(),
            s.status.as_str().to_string(),
            s.result.map(|r| r.to_string()).unwrap_or_default(),
        ]);
    }
    table
}

fn zones_table(zones: &[SupplyDemandZone], price: f64) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        "Kind", "Low", "High", "Entry", "Stop", "Strength", "Since", "Liquidity", "Price inside",
    ]);
    for z in zones {
        let since = Utc
            .timestamp_millis_opt(z.valid_from)
            .single()
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| z.valid_from.to_string());
        let liquidity = z
            .liquidity
            .map(|l| format!("{:?} {:.5}", l.kind, l.level))
            .unwrap_or_default();
        table.add_row(vec![
            format!("{:?}", z.kind),
            format!("{:.5}", z.low),
            format!("{:.5}", z.high),
            format!("{:.5}", z.entry),
            format!("{:.5}", z.stop_loss),
            z.strength.to_string(),
            since,
            liquidity,
            if strategies::is_in_zone(price, z) { "yes" } else { "" }.to_string(),
        ]);
    }
    table
}
