//! Authenticated broker sessions.

use crate::config::CredentialsConfig;
use crate::error::{DispatchError, ServiceError, ValidationError};
use crate::service::{BrokerConnector, BrokerCredentials, BrokerStatus};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::{info, warn};

/// Brokers with a known adapter.
pub const SUPPORTED_BROKERS: &[&str] = &["Upstox", "AngelOne", "Zerodha"];

/// One connected broker account.
#[derive(Debug, Clone, PartialEq)]
pub struct BrokerSession {
    pub status: BrokerStatus,
    pub connected_at: DateTime<Utc>,
}

/// Connected broker accounts, keyed by broker name.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<String, BrokerSession>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect a broker account.
    ///
    /// Credentials are checked locally first; an incomplete set never reaches
    /// the service.
    pub async fn connect(
        &mut self,
        connector: &dyn BrokerConnector,
        credentials: &BrokerCredentials,
    ) -> Result<BrokerStatus, DispatchError> {
        credentials.validate()?;
        let broker = credentials.broker_name();

        let status = match connector.connect(credentials).await {
            Ok(status) => status,
            Err(e) => {
                warn!(%broker, error = %e, "Broker connection failed");
                return Err(e.into());
            }
        };
        if !status.is_connected {
            warn!(%broker, "Service reported broker as disconnected");
            return Err(ServiceError::Connection(format!("{broker} is not connected")).into());
        }

        info!(
            %broker,
            user_id = %status.user_id,
            available_balance = %status.available_balance,
            "Broker connected"
        );
        self.sessions.insert(
            broker.to_string(),
            BrokerSession {
                status: status.clone(),
                connected_at: Utc::now(),
            },
        );
        Ok(status)
    }

    /// Whether `broker` holds a live authenticated session.
    pub fn is_authenticated(&self, broker: &str) -> bool {
        self.sessions
            .get(broker)
            .is_some_and(|s| s.status.is_connected)
    }

    pub fn session(&self, broker: &str) -> Option<&BrokerSession> {
        self.sessions.get(broker)
    }

    /// Connected broker names, sorted.
    pub fn connected(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.sessions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Credentials for `broker` from configuration.
pub fn credentials_for(
    broker: &str,
    config: &CredentialsConfig,
) -> Result<BrokerCredentials, ValidationError> {
    if !SUPPORTED_BROKERS.contains(&broker) {
        return Err(ValidationError::UnsupportedBroker(broker.to_string()));
    }
    config
        .for_broker(broker)
        .ok_or_else(|| ValidationError::MissingCredentials(broker.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::{MockBrokerConnector, PaperTradingService};

    fn upstox() -> BrokerCredentials {
        BrokerCredentials::Upstox {
            access_token: "token".to_string(),
        }
    }

    #[tokio::test]
    async fn test_connect_records_session() {
        let service = PaperTradingService::new();
        let mut sessions = SessionRegistry::new();

        let status = tokio_test::assert_ok!(sessions.connect(&service, &upstox()).await);

        assert!(status.is_connected);
        assert!(sessions.is_authenticated("Upstox"));
        assert!(!sessions.is_authenticated("Zerodha"));
        assert_eq!(sessions.connected(), vec!["Upstox"]);
        assert!(sessions.session("Upstox").unwrap().connected_at <= Utc::now());
    }

    #[tokio::test]
    async fn test_incomplete_credentials_never_reach_service() {
        let mut connector = MockBrokerConnector::new();
        connector.expect_connect().times(0);
        let mut sessions = SessionRegistry::new();

        let creds = BrokerCredentials::AngelOne {
            api_key: "key".to_string(),
            client_code: "C123".to_string(),
            pin: String::new(),
            totp_secret: "secret".to_string(),
        };
        let err = sessions.connect(&connector, &creds).await.unwrap_err();

        assert_eq!(
            err,
            DispatchError::Validation(ValidationError::MissingCredentials("AngelOne".to_string()))
        );
        assert!(!sessions.is_authenticated("AngelOne"));
    }

    #[tokio::test]
    async fn test_service_error_surfaces_verbatim() {
        let mut connector = MockBrokerConnector::new();
        connector
            .expect_connect()
            .times(1)
            .returning(|_| Err(ServiceError::Connection("Invalid access token".to_string())));
        let mut sessions = SessionRegistry::new();

        let err = sessions.connect(&connector, &upstox()).await.unwrap_err();

        assert_eq!(err.to_string(), "Invalid access token");
        assert!(!sessions.is_authenticated("Upstox"));
    }

    #[test]
    fn test_credentials_for() {
        let config = CredentialsConfig {
            upstox_access_token: Some("token".to_string()),
            ..CredentialsConfig::default()
        };

        assert_eq!(credentials_for("Upstox", &config), Ok(upstox()));
        assert_eq!(
            credentials_for("Zerodha", &config),
            Err(ValidationError::MissingCredentials("Zerodha".to_string()))
        );
        assert_eq!(
            credentials_for("Fyers", &config),
            Err(ValidationError::UnsupportedBroker("Fyers".to_string()))
        );
    }
}
