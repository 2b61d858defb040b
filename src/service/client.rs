//! HTTP client for the trading service REST API.

use crate::config::ServiceConfig;
use crate::error::{LookupFailure, ServiceError};
use crate::service::traits::{BrokerConnector, LotSizeSource, TradeService};
use crate::service::types::*;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Failure of a single HTTP exchange, before it is classified for the caller.
#[derive(Debug)]
enum CallError {
    Transport(reqwest::Error),
    Status { status: StatusCode, message: String },
    Decode(String),
}

impl CallError {
    fn message(&self) -> String {
        match self {
            CallError::Transport(e) => e.to_string(),
            CallError::Status { message, .. } => message.clone(),
            CallError::Decode(msg) => msg.clone(),
        }
    }

    fn status(&self) -> Option<StatusCode> {
        match self {
            CallError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// REST client for broker connection, instrument details and trade sessions.
#[derive(Debug, Clone)]
pub struct TradingServiceClient {
    http: Client,
    base_url: String,
    lookup_timeout: Duration,
}

impl TradingServiceClient {
    /// Create a new client from configuration.
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            lookup_timeout: Duration::from_secs(config.lookup_timeout_secs),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, CallError> {
        let response = request.send().await.map_err(CallError::Transport)?;
        let status = response.status();
        let body = response.text().await.map_err(CallError::Transport)?;

        if !status.is_success() {
            let message = match serde_json::from_str::<ErrorBody>(&body) {
                Ok(err) => err.message(),
                Err(_) if body.is_empty() => status.to_string(),
                Err(_) => format!("{}: {}", status, body),
            };
            return Err(CallError::Status { status, message });
        }

        serde_json::from_str(&body).map_err(|e| CallError::Decode(e.to_string()))
    }

    async fn trade_action(
        &self,
        path: &str,
        request: &StartTradeRequest,
    ) -> Result<TradeActionResponse, ServiceError> {
        let builder = self.http.post(self.url(path)).json(request);
        Self::send(builder).await.map_err(|e| {
            warn!(error = %e.message(), status = ?e.status(), path, "Trade request failed");
            ServiceError::Trade(e.message())
        })
    }
}

#[async_trait]
impl LotSizeSource for TradingServiceClient {
    #[instrument(skip(self), name = "lookup_lot_size")]
    async fn lookup(&self, broker: &str, instrument_name: &str) -> Result<u32, LookupFailure> {
        let body = InstrumentDetailsRequest {
            broker_name: broker.to_string(),
            stock_name_for_lookup: instrument_name.to_string(),
        };
        let builder = self
            .http
            .post(self.url("/instrument-details"))
            .timeout(self.lookup_timeout)
            .json(&body);

        match Self::send::<InstrumentDetailsResponse>(builder).await {
            Ok(details) => {
                debug!(lot_size = details.lot_size, instrument_key = ?details.instrument_key, "Instrument details received");
                Ok(details.lot_size)
            }
            Err(CallError::Transport(e)) if e.is_timeout() => Err(LookupFailure::Timeout),
            Err(CallError::Decode(msg)) => Err(LookupFailure::Malformed(msg)),
            Err(e) => Err(LookupFailure::Remote(e.message())),
        }
    }
}

#[async_trait]
impl TradeService for TradingServiceClient {
    #[instrument(skip(self, request), fields(session = %request.session_key()))]
    async fn start_trade(
        &self,
        request: &StartTradeRequest,
    ) -> Result<TradeActionResponse, ServiceError> {
        self.trade_action("/trade/start", request).await
    }

    #[instrument(skip(self, request), fields(session = %request.session_key()))]
    async fn stop_trade(
        &self,
        request: &StartTradeRequest,
    ) -> Result<TradeActionResponse, ServiceError> {
        self.trade_action("/trade/stop", request).await
    }

    #[instrument(skip(self, request), fields(session = %request.session_key()))]
    async fn trade_status(
        &self,
        request: &StartTradeRequest,
    ) -> Result<TradeActionResponse, ServiceError> {
        let url = self.url(&format!(
            "/trade/status/{}/{}/{}",
            urlencoding::encode(&request.broker_name),
            urlencoding::encode(&request.instrument_key_index),
            request.interval
        ));
        Self::send(self.http.get(url))
            .await
            .map_err(|e| ServiceError::Trade(e.message()))
    }
}

#[async_trait]
impl BrokerConnector for TradingServiceClient {
    #[instrument(skip(self, credentials), fields(broker = credentials.broker_name()))]
    async fn connect(&self, credentials: &BrokerCredentials) -> Result<BrokerStatus, ServiceError> {
        let builder = self
            .http
            .post(self.url("/connect"))
            .json(&credentials.to_request());

        Self::send(builder).await.map_err(|e| {
            warn!(error = %e.message(), status = ?e.status(), "Broker connection failed");
            ServiceError::Connection(e.message())
        })
    }
}
