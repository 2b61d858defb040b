//! In-memory paper trading service for offline runs and tests.

use crate::catalog::{InstrumentCatalog, InstrumentKind};
use crate::error::{LookupFailure, ServiceError};
use crate::service::traits::{BrokerConnector, LotSizeSource, TradeService};
use crate::service::types::*;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

const PAPER_USER_ID: &str = "paper_user";

/// Brokers whose adapters can run the strategy.
const TRADING_BROKERS: &[&str] = &["Upstox"];

/// Index lot sizes used by the strategy.
fn index_lot_size(ticker: &str) -> u32 {
    match ticker {
        "NIFTY" => 75,
        "BANKNIFTY" => 35,
        "FINNIFTY" => 65,
        _ => 120,
    }
}

/// Simulated service state.
#[derive(Debug, Default)]
pub struct PaperState {
    pub connections: HashMap<String, BrokerStatus>,
    /// Session key -> current status
    pub sessions: HashMap<String, TradeStatus>,
}

/// Paper implementation of the trading service.
pub struct PaperTradingService {
    state: Arc<RwLock<PaperState>>,
    overrides: HashMap<String, u32>,
    latency: Duration,
    lookup_count: AtomicU64,
}

impl PaperTradingService {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(PaperState::default())),
            overrides: HashMap::new(),
            latency: Duration::ZERO,
            lookup_count: AtomicU64::new(0),
        }
    }

    /// Override the lot size returned for an instrument name.
    pub fn with_lot_size(mut self, instrument_name: &str, lot_size: u32) -> Self {
        self.overrides.insert(instrument_name.to_string(), lot_size);
        self
    }

    /// Delay every lookup, simulating a slow instrument master download.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn lookup_count(&self) -> u64 {
        self.lookup_count.load(Ordering::SeqCst)
    }

    fn lot_size_for(&self, instrument_name: &str) -> u32 {
        if let Some(&size) = self.overrides.get(instrument_name) {
            return size;
        }

        let catalog = InstrumentCatalog::standard();
        let entry = catalog
            .by_display_name(instrument_name)
            .or_else(|| catalog.by_ticker(instrument_name));

        match entry {
            Some(e) if e.kind == InstrumentKind::IndexOption => index_lot_size(e.ticker),
            // Equities and unknown names fall back to a single share
            _ => 1,
        }
    }
}

impl Default for PaperTradingService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LotSizeSource for PaperTradingService {
    async fn lookup(&self, broker: &str, instrument_name: &str) -> Result<u32, LookupFailure> {
        self.lookup_count.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let lot_size = self.lot_size_for(instrument_name);
        debug!(%broker, %instrument_name, lot_size, "Paper lot size lookup");
        Ok(lot_size)
    }
}

#[async_trait]
impl TradeService for PaperTradingService {
    async fn start_trade(
        &self,
        request: &StartTradeRequest,
    ) -> Result<TradeActionResponse, ServiceError> {
        let mut state = self.state.write().await;
        let task_id = format!("{}:{}", PAPER_USER_ID, request.session_key());

        if state.sessions.get(&request.session_key()) == Some(&TradeStatus::Running) {
            return Err(ServiceError::Trade(format!(
                "A trading session for {} at {}-min interval is already running.",
                request.instrument_key_index, request.interval
            )));
        }

        if !state.connections.contains_key(&request.broker_name) {
            return Err(ServiceError::Trade(format!(
                "Broker {} not connected for user {}. Please connect first.",
                request.broker_name, PAPER_USER_ID
            )));
        }

        if !TRADING_BROKERS.contains(&request.broker_name.as_str()) {
            return Err(ServiceError::Trade(format!(
                "Broker '{}' does not support trading functionality.",
                request.broker_name
            )));
        }

        state
            .sessions
            .insert(request.session_key(), TradeStatus::Running);
        info!(%task_id, lots = request.lots, "Paper trading session started");

        Ok(TradeActionResponse {
            message: format!(
                "Trading session for {} started in the background.",
                request.instrument_key_index
            ),
            task_id: Some(task_id),
            status: TradeStatus::Running,
        })
    }

    async fn stop_trade(
        &self,
        request: &StartTradeRequest,
    ) -> Result<TradeActionResponse, ServiceError> {
        let mut state = self.state.write().await;
        let task_id = format!("{}:{}", PAPER_USER_ID, request.session_key());

        let Some(status) = state.sessions.get_mut(&request.session_key()) else {
            return Err(ServiceError::Trade(format!(
                "No running trading session found for {}.",
                task_id
            )));
        };

        if *status != TradeStatus::Running {
            return Ok(TradeActionResponse {
                message: format!(
                    "Trading session for {} was already {}.",
                    request.instrument_key_index,
                    status.as_str()
                ),
                task_id: Some(task_id),
                status: *status,
            });
        }

        *status = TradeStatus::Stopped;
        info!(%task_id, "Paper trading session stopped");
        Ok(TradeActionResponse {
            message: format!(
                "Trading session for {} stopped.",
                request.instrument_key_index
            ),
            task_id: Some(task_id),
            status: TradeStatus::Stopped,
        })
    }

    async fn trade_status(
        &self,
        request: &StartTradeRequest,
    ) -> Result<TradeActionResponse, ServiceError> {
        let state = self.state.read().await;
        let task_id = format!("{}:{}", PAPER_USER_ID, request.session_key());

        let response = match state.sessions.get(&request.session_key()) {
            Some(TradeStatus::Running) => TradeActionResponse {
                message: format!(
                    "Trading session for {} is running.",
                    request.instrument_key_index
                ),
                task_id: Some(task_id),
                status: TradeStatus::Running,
            },
            Some(&status) => TradeActionResponse {
                message: format!(
                    "Trading session for {} {}.",
                    request.instrument_key_index,
                    status.as_str()
                ),
                task_id: Some(task_id),
                status,
            },
            None => TradeActionResponse {
                message: format!(
                    "No active trading session found for {}.",
                    request.instrument_key_index
                ),
                task_id: Some(task_id),
                status: TradeStatus::NotRunning,
            },
        };
        Ok(response)
    }
}

#[async_trait]
impl BrokerConnector for PaperTradingService {
    async fn connect(&self, credentials: &BrokerCredentials) -> Result<BrokerStatus, ServiceError> {
        credentials
            .validate()
            .map_err(|e| ServiceError::Connection(e.to_string()))?;

        let broker_name = credentials.broker_name().to_string();
        let status = BrokerStatus {
            is_connected: true,
            broker_name: broker_name.clone(),
            user_id: PAPER_USER_ID.to_string(),
            user_name: "Paper Trader".to_string(),
            user_email: "paper@localhost".to_string(),
            total_balance: "₹ 10,00,000.00".to_string(),
            margin_used: "₹ 0.00".to_string(),
            available_balance: "₹ 10,00,000.00".to_string(),
        };

        self.state
            .write()
            .await
            .connections
            .insert(broker_name.clone(), status.clone());
        info!(broker = %broker_name, "Paper broker connected");

        Ok(status)
    }
}
