//! Transport-agnostic traits for the trading service.
//!
//! The desk depends only on these contracts:
//! - [`LotSizeSource`]: instrument detail lookups behind lot-size resolution
//! - [`TradeService`]: trade session start/stop/status
//! - [`BrokerConnector`]: broker account connection

use crate::error::{LookupFailure, ServiceError};
use crate::service::types::{BrokerCredentials, BrokerStatus, StartTradeRequest, TradeActionResponse};
use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

/// Source of exchange lot sizes.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait LotSizeSource: Send + Sync {
    /// Look up the lot size for an instrument by its full display name.
    async fn lookup(&self, broker: &str, instrument_name: &str) -> Result<u32, LookupFailure>;
}

/// Trade session control on the strategy service.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TradeService: Send + Sync {
    async fn start_trade(
        &self,
        request: &StartTradeRequest,
    ) -> Result<TradeActionResponse, ServiceError>;

    async fn stop_trade(
        &self,
        request: &StartTradeRequest,
    ) -> Result<TradeActionResponse, ServiceError>;

    async fn trade_status(
        &self,
        request: &StartTradeRequest,
    ) -> Result<TradeActionResponse, ServiceError>;
}

/// Broker account connection.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait BrokerConnector: Send + Sync {
    async fn connect(&self, credentials: &BrokerCredentials) -> Result<BrokerStatus, ServiceError>;
}
