//! Trade actions for one configured row.

use crate::catalog::InstrumentCatalog;
use crate::desk::RowConfig;
use crate::dispatch::sessions::SessionRegistry;
use crate::error::{DispatchError, ValidationError};
use crate::service::{StartTradeRequest, TradeActionResponse, TradeService};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Validates a row and forwards it to the trade service.
///
/// One call is one attempt: no retries, no idempotency key.
pub struct TradeDispatcher {
    service: Arc<dyn TradeService>,
    catalog: &'static InstrumentCatalog,
    live_brokers: Vec<String>,
}

impl TradeDispatcher {
    /// `live_brokers` lists the brokers whose adapters support live execution.
    pub fn new(service: Arc<dyn TradeService>, live_brokers: Vec<String>) -> Self {
        Self {
            service,
            catalog: InstrumentCatalog::standard(),
            live_brokers,
        }
    }

    /// Validate `row` and derive the request payload. First failure wins.
    pub fn build_request(
        &self,
        row: &RowConfig,
        sessions: &SessionRegistry,
    ) -> Result<StartTradeRequest, ValidationError> {
        if !row.is_selected() {
            return Err(ValidationError::MissingSelection);
        }
        if row.lots < 1 {
            return Err(ValidationError::NonPositiveLots);
        }
        if row.interval_minutes < 1 {
            return Err(ValidationError::NonPositiveInterval);
        }
        let instrument_key = self
            .catalog
            .instrument_key(&row.ticker)
            .ok_or(ValidationError::UnsupportedInstrument)?;
        if !self.live_brokers.iter().any(|b| *b == row.broker) {
            return Err(ValidationError::UnsupportedBrokerForTrading);
        }
        if !sessions.is_authenticated(&row.broker) {
            return Err(ValidationError::NotAuthenticated);
        }

        Ok(StartTradeRequest {
            broker_name: row.broker.clone(),
            instrument_key_index: instrument_key.to_string(),
            index_name: row.ticker.clone(),
            interval: row.interval_minutes,
            lots: row.lots,
        })
    }

    #[instrument(skip(self, row, sessions), fields(ticker = %row.ticker, broker = %row.broker))]
    pub async fn start_trade(
        &self,
        row: &RowConfig,
        sessions: &SessionRegistry,
    ) -> Result<TradeActionResponse, DispatchError> {
        let request = self.validated(row, sessions)?;
        let response = self
            .service
            .start_trade(&request)
            .await
            .inspect_err(|e| warn!(error = %e, "Trade start rejected"))?;

        info!(
            session = %request.session_key(),
            lots = request.lots,
            status = response.status.as_str(),
            "Trade started"
        );
        Ok(response)
    }

    #[instrument(skip(self, row, sessions), fields(ticker = %row.ticker, broker = %row.broker))]
    pub async fn stop_trade(
        &self,
        row: &RowConfig,
        sessions: &SessionRegistry,
    ) -> Result<TradeActionResponse, DispatchError> {
        let request = self.validated(row, sessions)?;
        let response = self
            .service
            .stop_trade(&request)
            .await
            .inspect_err(|e| warn!(error = %e, "Trade stop rejected"))?;

        info!(
            session = %request.session_key(),
            status = response.status.as_str(),
            "Trade stop requested"
        );
        Ok(response)
    }

    #[instrument(skip(self, row, sessions), fields(ticker = %row.ticker, broker = %row.broker))]
    pub async fn trade_status(
        &self,
        row: &RowConfig,
        sessions: &SessionRegistry,
    ) -> Result<TradeActionResponse, DispatchError> {
        let request = self.validated(row, sessions)?;
        let response = self.service.trade_status(&request).await?;
        info!(
            session = %request.session_key(),
            status = response.status.as_str(),
            "Trade status"
        );
        Ok(response)
    }

    fn validated(
        &self,
        row: &RowConfig,
        sessions: &SessionRegistry,
    ) -> Result<StartTradeRequest, ValidationError> {
        self.build_request(row, sessions)
            .inspect_err(|e| warn!(error = %e, "Trade request rejected"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use crate::service::{
        BrokerCredentials, MockTradeService, PaperTradingService, TradeStatus,
    };

    fn nifty_row() -> RowConfig {
        RowConfig {
            ticker: "NIFTY".to_string(),
            broker: "Upstox".to_string(),
            lots: 2,
            interval_minutes: 5,
            ..RowConfig::default()
        }
    }

    async fn upstox_session(service: &PaperTradingService) -> SessionRegistry {
        let mut sessions = SessionRegistry::new();
        let creds = BrokerCredentials::Upstox {
            access_token: "token".to_string(),
        };
        sessions.connect(service, &creds).await.unwrap();
        sessions
    }

    fn idle_dispatcher() -> TradeDispatcher {
        let mut service = MockTradeService::new();
        service.expect_start_trade().times(0);
        service.expect_stop_trade().times(0);
        service.expect_trade_status().times(0);
        TradeDispatcher::new(Arc::new(service), vec!["Upstox".to_string()])
    }

    async fn rejected(row: RowConfig) -> DispatchError {
        let sessions = upstox_session(&PaperTradingService::new()).await;
        idle_dispatcher()
            .start_trade(&row, &sessions)
            .await
            .unwrap_err()
    }

    // =========================================================================
    // Validation
    // =========================================================================

    #[tokio::test]
    async fn test_missing_selection_makes_no_call() {
        let row = RowConfig {
            ticker: String::new(),
            ..nifty_row()
        };
        assert_eq!(
            rejected(row).await,
            DispatchError::Validation(ValidationError::MissingSelection)
        );

        let row = RowConfig {
            broker: String::new(),
            ..nifty_row()
        };
        assert_eq!(rejected(row).await.to_string(), "missing selection");
    }

    #[tokio::test]
    async fn test_first_failure_wins() {
        // Zero lots and an unknown ticker: lots is checked first
        let row = RowConfig {
            ticker: "ZOMATO".to_string(),
            lots: 0,
            ..nifty_row()
        };
        assert_eq!(rejected(row).await.to_string(), "lots must be positive");

        let row = RowConfig {
            ticker: "ZOMATO".to_string(),
            interval_minutes: 0,
            ..nifty_row()
        };
        assert_eq!(rejected(row).await.to_string(), "interval must be positive");
    }

    #[tokio::test]
    async fn test_equities_are_not_tradable() {
        let row = RowConfig {
            ticker: "RELIANCE".to_string(),
            ..nifty_row()
        };
        assert_eq!(rejected(row).await.to_string(), "unsupported instrument");
    }

    #[tokio::test]
    async fn test_broker_without_live_adapter() {
        let row = RowConfig {
            broker: "Zerodha".to_string(),
            ..nifty_row()
        };
        assert_eq!(
            rejected(row).await.to_string(),
            "unsupported broker for trading"
        );
    }

    #[tokio::test]
    async fn test_requires_authenticated_session() {
        let sessions = SessionRegistry::new();
        let err = idle_dispatcher()
            .start_trade(&nifty_row(), &sessions)
            .await
            .unwrap_err();
        assert_eq!(err, DispatchError::Validation(ValidationError::NotAuthenticated));
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    #[tokio::test]
    async fn test_start_sends_one_request() {
        let sessions = upstox_session(&PaperTradingService::new()).await;
        let expected = StartTradeRequest {
            broker_name: "Upstox".to_string(),
            instrument_key_index: "NSE_INDEX|Nifty 50".to_string(),
            index_name: "NIFTY".to_string(),
            interval: 5,
            lots: 2,
        };
        let mut service = MockTradeService::new();
        service
            .expect_start_trade()
            .withf(move |request| *request == expected)
            .times(1)
            .returning(|_| {
                Ok(TradeActionResponse {
                    message: "Trading task queued".to_string(),
                    task_id: Some("u1:Upstox:NSE_INDEX|Nifty 50:5".to_string()),
                    status: TradeStatus::Pending,
                })
            });
        let dispatcher = TradeDispatcher::new(Arc::new(service), vec!["Upstox".to_string()]);

        let response = dispatcher
            .start_trade(&nifty_row(), &sessions)
            .await
            .unwrap();

        assert_eq!(response.message, "Trading task queued");
    }

    #[tokio::test]
    async fn test_service_error_is_verbatim() {
        let sessions = upstox_session(&PaperTradingService::new()).await;
        let mut service = MockTradeService::new();
        service
            .expect_start_trade()
            .times(1)
            .returning(|_| Err(ServiceError::Trade("Market is closed".to_string())));
        let dispatcher = TradeDispatcher::new(Arc::new(service), vec!["Upstox".to_string()]);

        let err = dispatcher
            .start_trade(&nifty_row(), &sessions)
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Market is closed");
    }

    #[tokio::test]
    async fn test_paper_session_lifecycle() {
        let service = Arc::new(PaperTradingService::new());
        let sessions = upstox_session(&service).await;
        let dispatcher = TradeDispatcher::new(service.clone(), vec!["Upstox".to_string()]);
        let row = nifty_row();

        let started = dispatcher.start_trade(&row, &sessions).await.unwrap();
        assert_eq!(started.status, TradeStatus::Running);

        let duplicate = dispatcher.start_trade(&row, &sessions).await.unwrap_err();
        assert!(duplicate.to_string().contains("already running"));

        let status = dispatcher.trade_status(&row, &sessions).await.unwrap();
        assert_eq!(status.status, TradeStatus::Running);

        let stopped = dispatcher.stop_trade(&row, &sessions).await.unwrap();
        assert_eq!(stopped.status, TradeStatus::Stopped);
    }
}
