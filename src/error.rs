//! Error taxonomy for the desk.
//!
//! - [`ValidationError`]: user-correctable input problems, raised before any
//!   remote call is attempted.
//! - [`LookupFailure`]: lot-size resolution failures, recovered locally.
//! - [`ServiceError`]: connection and trade failures reported by the remote
//!   trading service, surfaced verbatim.

use thiserror::Error;

/// Input rejected before reaching the trading service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing selection")]
    MissingSelection,
    #[error("lots must be positive")]
    NonPositiveLots,
    #[error("interval must be positive")]
    NonPositiveInterval,
    #[error("unsupported instrument")]
    UnsupportedInstrument,
    #[error("unsupported broker for trading")]
    UnsupportedBrokerForTrading,
    #[error("not authenticated")]
    NotAuthenticated,
    /// A connection attempt is missing one of the broker's required credentials.
    #[error("missing credentials for {0}")]
    MissingCredentials(String),
    /// A connection attempt named a broker with no known adapter.
    #[error("unsupported broker {0}")]
    UnsupportedBroker(String),
}

/// Lot-size lookup failure. Never blocks the desk; the row degrades to zero shares.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupFailure {
    #[error("lot size lookup failed: {0}")]
    Remote(String),
    #[error("malformed lot size response: {0}")]
    Malformed(String),
    #[error("lot size lookup timed out")]
    Timeout,
}

/// Failure reported by the remote trading service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// Broker connection failed.
    #[error("{0}")]
    Connection(String),
    /// Trade start/stop/status failed.
    #[error("{0}")]
    Trade(String),
}

impl ServiceError {
    /// Message as reported by the service.
    pub fn message(&self) -> &str {
        match self {
            ServiceError::Connection(msg) | ServiceError::Trade(msg) => msg,
        }
    }
}

/// Outcome of a failed trade action.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Service(#[from] ServiceError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_messages() {
        assert_eq!(ValidationError::MissingSelection.to_string(), "missing selection");
        assert_eq!(
            ValidationError::UnsupportedBrokerForTrading.to_string(),
            "unsupported broker for trading"
        );
        assert_eq!(
            ValidationError::MissingCredentials("Zerodha".to_string()).to_string(),
            "missing credentials for Zerodha"
        );
    }

    #[test]
    fn test_service_errors_are_verbatim() {
        let err: DispatchError = ServiceError::Trade("Broker Upstox not connected".to_string()).into();
        assert_eq!(err.to_string(), "Broker Upstox not connected");
    }
}
