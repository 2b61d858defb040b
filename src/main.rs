//! Broker Desk - Main Entry Point
//!
//! Builds the configured desk, resolves lot sizes and drives trade sessions,
//! against the trading service or an in-memory paper service.

use anyhow::{Context, Result};
use broker_desk::catalog::InstrumentCatalog;
use broker_desk::config::Config;
use broker_desk::desk::{
    AggregateConfigList, DeskConsole, LotSizeResolver, LotsInput, RowConfig, RowEdit, RowPhase,
};
use broker_desk::dispatch::{credentials_for, SessionRegistry, TradeDispatcher};
use broker_desk::service::{
    BrokerConnector, LotSizeSource, PaperTradingService, TradeActionResponse, TradeService,
    TradingServiceClient,
};
use clap::{Parser, Subcommand};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn, Level};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

/// Broker Desk CLI
#[derive(Parser)]
#[command(name = "broker-desk")]
#[command(version, about = "Multi-broker trading desk configuration")]
struct Cli {
    /// Use the in-memory paper service instead of the trading service
    #[arg(long, global = true)]
    paper: bool,

    /// Delay of every paper lot-size lookup, in milliseconds
    #[arg(long, global = true, default_value = "0")]
    paper_latency_ms: u64,

    /// Paper lot size override, e.g. "Nifty 50=50" (repeatable)
    #[arg(long, global = true, value_name = "NAME=SIZE")]
    paper_lot_size: Vec<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List supported instruments
    Instruments,

    /// Look up the lot size of one instrument
    LotSize {
        /// Ticker, e.g. NIFTY
        #[arg(short, long)]
        ticker: String,

        /// Broker name, e.g. Upstox
        #[arg(short, long)]
        broker: String,
    },

    /// Build the configured desk and show the resolved rows
    Desk {
        /// Type into a row's lots field, e.g. "0=3" (repeatable)
        #[arg(long, value_name = "ROW=LOTS")]
        lots: Vec<String>,
    },

    /// Start a trading session for a desk row
    Start {
        /// Row index in the configured desk
        #[arg(short, long)]
        row: usize,
    },

    /// Stop the trading session of a desk row
    Stop {
        #[arg(short, long)]
        row: usize,
    },

    /// Show the trading session status of a desk row
    Status {
        #[arg(short, long)]
        row: usize,
    },
}

#[derive(Debug, Clone, Copy)]
enum TradeAction {
    Start,
    Stop,
    Status,
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeAction::Start => write!(f, "start"),
            TradeAction::Stop => write!(f, "stop"),
            TradeAction::Status => write!(f, "status"),
        }
    }
}

/// Service implementations behind the desk.
struct Backend {
    lot_sizes: Arc<dyn LotSizeSource>,
    trades: Arc<dyn TradeService>,
    connector: Arc<dyn BrokerConnector>,
    paper: Option<Arc<PaperTradingService>>,
}

impl Backend {
    fn new(config: &Config, cli: &Cli) -> Result<Self> {
        if cli.paper {
            info!(latency_ms = cli.paper_latency_ms, "Using paper trading service");
            let mut service =
                PaperTradingService::new().with_latency(Duration::from_millis(cli.paper_latency_ms));
            for spec in &cli.paper_lot_size {
                let (name, size) = parse_assignment(spec)?;
                let size = size
                    .parse::<u32>()
                    .with_context(|| format!("Invalid lot size in {:?}", spec))?;
                service = service.with_lot_size(name, size);
            }

            let service = Arc::new(service);
            return Ok(Self {
                lot_sizes: service.clone(),
                trades: service.clone(),
                connector: service.clone(),
                paper: Some(service),
            });
        }

        info!(base_url = %config.service.base_url, "Using trading service");
        let client = Arc::new(TradingServiceClient::new(&config.service)?);
        Ok(Self {
            lot_sizes: client.clone(),
            trades: client.clone(),
            connector: client,
            paper: None,
        })
    }
}

/// Split `"key=value"`.
fn parse_assignment(spec: &str) -> Result<(&str, &str)> {
    spec.split_once('=')
        .map(|(key, value)| (key.trim(), value.trim()))
        .with_context(|| format!("Expected KEY=VALUE, got {:?}", spec))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging()?;

    let config = Config::load()?;
    config.validate().context("Invalid configuration")?;

    match &cli.command {
        Commands::Instruments => {
            show_instruments();
            Ok(())
        }
        Commands::LotSize { ticker, broker } => {
            let backend = Backend::new(&config, &cli)?;
            lookup_lot_size(&backend, ticker, broker).await
        }
        Commands::Desk { lots } => {
            let backend = Backend::new(&config, &cli)?;
            let mut console = build_desk(&config, &backend).await;
            edit_lots(&mut console, lots)?;
            console.settle().await;
            show_desk(&console);
            Ok(())
        }
        Commands::Start { row } => {
            let backend = Backend::new(&config, &cli)?;
            run_trade_action(&config, &backend, *row, TradeAction::Start).await
        }
        Commands::Stop { row } => {
            let backend = Backend::new(&config, &cli)?;
            run_trade_action(&config, &backend, *row, TradeAction::Stop).await
        }
        Commands::Status { row } => {
            let backend = Backend::new(&config, &cli)?;
            run_trade_action(&config, &backend, *row, TradeAction::Status).await
        }
    }
}

/// Initialize logging to stdout and an hourly rolling file.
fn init_logging() -> Result<()> {
    use tracing_subscriber::fmt::writer::MakeWriterExt;

    std::fs::create_dir_all("logs")?;

    let file_appender = tracing_appender::rolling::hourly("logs", "broker-desk.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    // Keep the writer alive for the program duration
    Box::leak(Box::new(guard));

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("broker_desk=debug".parse()?)
                .add_directive(Level::INFO.into()),
        )
        .with_writer(std::io::stdout.and(file_writer))
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .init();

    Ok(())
}

fn show_instruments() {
    println!("\n📋 Instruments");
    for entry in InstrumentCatalog::standard().entries() {
        let key = entry.instrument_key.unwrap_or("-");
        println!(
            "   ├─ {:<12} {:<20} {:?} ({})",
            entry.ticker, entry.display_name, entry.kind, key
        );
    }
}

async fn lookup_lot_size(backend: &Backend, ticker: &str, broker: &str) -> Result<()> {
    let resolver = LotSizeResolver::new(backend.lot_sizes.clone());
    match resolver.resolve(ticker, broker).await {
        Ok(lot_size) => println!("{} @ {}: lot size {}", ticker, broker, lot_size),
        Err(e) => println!("{} @ {}: unresolved ({})", ticker, broker, e),
    }
    Ok(())
}

/// Build the desk from configuration and wait for every lookup to land.
async fn build_desk(config: &Config, backend: &Backend) -> DeskConsole {
    let resolver = Arc::new(LotSizeResolver::new(backend.lot_sizes.clone()));
    let template = RowConfig::with_defaults(
        config.trading.default_lots,
        config.trading.default_interval_minutes,
    );
    let mut console = DeskConsole::new(resolver, AggregateConfigList::with_row_template(template));

    console.load_desk(&config.desk);
    console.settle().await;
    match &backend.paper {
        Some(paper) => info!(
            pushes = console.push_count(),
            lookups = paper.lookup_count(),
            "Desk settled"
        ),
        None => info!(pushes = console.push_count(), "Desk settled"),
    }
    console
}

/// Type each `ROW=LOTS` entry into the row's lots field, then leave the field.
fn edit_lots(console: &mut DeskConsole, entries: &[String]) -> Result<()> {
    for entry in entries {
        let (row, text) = parse_assignment(entry)?;
        let row: usize = row
            .parse()
            .with_context(|| format!("Invalid row index in {:?}", entry))?;

        let input = LotsInput::parse(text);
        if input == LotsInput::Empty {
            warn!(row, text, "Lots must be a whole number >= 1, keeping current value");
        }
        anyhow::ensure!(
            console.edit_row(row, RowEdit::Lots(input)),
            "Desk has no row {}",
            row
        );
        console.edit_row(row, RowEdit::LotsBlur);
    }
    Ok(())
}

fn show_desk(console: &DeskConsole) {
    println!(
        "\n🏦 Brokers ({} slots): {}",
        console.list().broker_count(),
        console.available_brokers().join(", ")
    );

    println!("\n📋 Rows");
    for (i, row) in console.list().rows().iter().enumerate() {
        let state = match console.store(i).map(|s| s.phase()) {
            Some(RowPhase::Resolved { lot_size }) => format!("lot size {}", lot_size),
            Some(RowPhase::Failed { error }) => format!("unresolved: {}", error),
            Some(RowPhase::Resolving { .. }) => "resolving".to_string(),
            Some(RowPhase::Idle) | None => "unset".to_string(),
        };
        println!(
            "   ├─ [{}] {} @ {}: {} lots, {} min, target {}% -> {} shares ({})",
            i,
            display_or_dash(&row.ticker),
            display_or_dash(&row.broker),
            row.lots,
            row.interval_minutes,
            row.target_percentage,
            row.total_shares,
            state
        );
    }

    let unresolved = (0..console.list().instrument_count())
        .filter(|&i| console.store(i).is_some_and(|s| s.is_unresolved()))
        .count();
    if unresolved > 0 {
        println!("\n⚠️  {} row(s) unresolved, total shares held at 0", unresolved);
    }
}

fn display_or_dash(value: &str) -> &str {
    if value.is_empty() {
        "-"
    } else {
        value
    }
}

async fn run_trade_action(
    config: &Config,
    backend: &Backend,
    row_index: usize,
    action: TradeAction,
) -> Result<()> {
    let console = build_desk(config, backend).await;
    let row = console
        .row(row_index)
        .cloned()
        .with_context(|| format!("Desk has no row {}", row_index))?;

    // Connection problems surface as "not authenticated" at dispatch
    let mut sessions = SessionRegistry::new();
    if !row.broker.is_empty() {
        match credentials_for(&row.broker, &config.credentials) {
            Ok(credentials) => {
                if let Err(e) = sessions.connect(backend.connector.as_ref(), &credentials).await {
                    warn!(broker = %row.broker, error = %e, "Could not connect broker");
                }
            }
            Err(e) => warn!(broker = %row.broker, error = %e, "No usable credentials"),
        }
    }
    info!(connected = ?sessions.connected(), "Broker sessions ready");
    if let Some(session) = sessions.session(&row.broker) {
        info!(
            broker = %row.broker,
            user = %session.status.user_name,
            connected_at = %session.connected_at,
            "Using broker session"
        );
    }

    let dispatcher = TradeDispatcher::new(backend.trades.clone(), config.trading.live_brokers.clone());
    let result = match action {
        TradeAction::Start => dispatcher.start_trade(&row, &sessions).await,
        TradeAction::Stop => dispatcher.stop_trade(&row, &sessions).await,
        TradeAction::Status => dispatcher.trade_status(&row, &sessions).await,
    };

    match result {
        Ok(response) => {
            show_response(&response);
            Ok(())
        }
        Err(e) => {
            println!("\n❌ Trade {} failed: {}", action, e);
            Err(e).with_context(|| format!("Trade {} failed for row {}", action, row_index))
        }
    }
}

fn show_response(response: &TradeActionResponse) {
    println!("\n✅ {}", response.message);
    println!("   ├─ Status:  {}", response.status.as_str());
    println!("   └─ Task:    {}", response.task_id.as_deref().unwrap_or("-"));
}
