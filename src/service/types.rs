//! Wire types for the trading service API.

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Broker connection credentials, one variant per supported adapter.
#[derive(Clone, PartialEq, Eq)]
pub enum BrokerCredentials {
    Upstox {
        access_token: String,
    },
    AngelOne {
        api_key: String,
        client_code: String,
        pin: String,
        totp_secret: String,
    },
    Zerodha {
        api_key: String,
        access_token: String,
    },
}

impl BrokerCredentials {
    pub fn broker_name(&self) -> &'static str {
        match self {
            BrokerCredentials::Upstox { .. } => "Upstox",
            BrokerCredentials::AngelOne { .. } => "AngelOne",
            BrokerCredentials::Zerodha { .. } => "Zerodha",
        }
    }

    /// Check that every field the broker requires is present.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let complete = match self {
            BrokerCredentials::Upstox { access_token } => !access_token.is_empty(),
            BrokerCredentials::AngelOne {
                api_key,
                client_code,
                pin,
                totp_secret,
            } => [api_key, client_code, pin, totp_secret]
                .iter()
                .all(|s| !s.is_empty()),
            BrokerCredentials::Zerodha {
                api_key,
                access_token,
            } => !api_key.is_empty() && !access_token.is_empty(),
        };

        if complete {
            Ok(())
        } else {
            Err(ValidationError::MissingCredentials(
                self.broker_name().to_string(),
            ))
        }
    }

    /// Build the connect request body.
    pub fn to_request(&self) -> ConnectRequest {
        let mut request = ConnectRequest {
            broker_name: self.broker_name().to_string(),
            ..ConnectRequest::default()
        };
        match self {
            BrokerCredentials::Upstox { access_token } => {
                request.upstox_access_token = Some(access_token.clone());
            }
            BrokerCredentials::AngelOne {
                api_key,
                client_code,
                pin,
                totp_secret,
            } => {
                request.angel_api_key = Some(api_key.clone());
                request.angel_client_code = Some(client_code.clone());
                request.angel_pin = Some(pin.clone());
                request.angel_totp_secret = Some(totp_secret.clone());
            }
            BrokerCredentials::Zerodha {
                api_key,
                access_token,
            } => {
                request.zerodha_api_key = Some(api_key.clone());
                request.zerodha_access_token = Some(access_token.clone());
            }
        }
        request
    }
}

// Secrets never reach the logs.
impl fmt::Debug for BrokerCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerCredentials")
            .field("broker", &self.broker_name())
            .finish_non_exhaustive()
    }
}

/// Body of `POST /connect`.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ConnectRequest {
    pub broker_name: String,
    #[serde(rename = "upstoxAccessToken", skip_serializing_if = "Option::is_none")]
    pub upstox_access_token: Option<String>,
    #[serde(rename = "angelApiKey", skip_serializing_if = "Option::is_none")]
    pub angel_api_key: Option<String>,
    #[serde(rename = "angelClientCode", skip_serializing_if = "Option::is_none")]
    pub angel_client_code: Option<String>,
    #[serde(rename = "angelPin", skip_serializing_if = "Option::is_none")]
    pub angel_pin: Option<String>,
    #[serde(rename = "angelTotpSecret", skip_serializing_if = "Option::is_none")]
    pub angel_totp_secret: Option<String>,
    #[serde(rename = "zerodhaApiKey", skip_serializing_if = "Option::is_none")]
    pub zerodha_api_key: Option<String>,
    #[serde(rename = "zerodhaAccessToken", skip_serializing_if = "Option::is_none")]
    pub zerodha_access_token: Option<String>,
}

/// Connected broker account summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerStatus {
    pub is_connected: bool,
    pub broker_name: String,
    #[serde(default = "not_available")]
    pub user_id: String,
    #[serde(default = "not_available")]
    pub user_name: String,
    #[serde(default = "not_available")]
    pub user_email: String,
    #[serde(default = "not_available")]
    pub total_balance: String,
    #[serde(default = "not_available")]
    pub margin_used: String,
    #[serde(default = "not_available")]
    pub available_balance: String,
}

fn not_available() -> String {
    "N/A".to_string()
}

/// Body of `POST /trade/start` and `POST /trade/stop`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartTradeRequest {
    pub broker_name: String,
    /// Index instrument key, e.g. `NSE_INDEX|Nifty 50`
    pub instrument_key_index: String,
    /// Raw ticker, e.g. `NIFTY`
    pub index_name: String,
    /// Candle interval in minutes
    pub interval: u32,
    pub lots: u32,
}

impl StartTradeRequest {
    /// Session identifier used by the service for duplicate detection.
    pub fn session_key(&self) -> String {
        format!(
            "{}:{}:{}",
            self.broker_name, self.instrument_key_index, self.interval
        )
    }
}

/// Lifecycle of a trading session on the service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeStatus {
    #[default]
    Pending,
    Running,
    Stopped,
    Finished,
    Cancelled,
    Failed,
    NotRunning,
    Error,
}

impl TradeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeStatus::Pending => "pending",
            TradeStatus::Running => "running",
            TradeStatus::Stopped => "stopped",
            TradeStatus::Finished => "finished",
            TradeStatus::Cancelled => "cancelled",
            TradeStatus::Failed => "failed",
            TradeStatus::NotRunning => "not_running",
            TradeStatus::Error => "error",
        }
    }
}

/// Acknowledgement returned by trade actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeActionResponse {
    pub message: String,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub status: TradeStatus,
}

/// Body of `POST /instrument-details`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentDetailsRequest {
    pub broker_name: String,
    pub stock_name_for_lookup: String,
}

/// Instrument details; only `lot_size` is required.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentDetailsResponse {
    pub lot_size: u32,
    #[serde(default)]
    pub instrument_key: Option<String>,
    #[serde(default)]
    pub trading_symbol: Option<String>,
    #[serde(default)]
    pub instrument_type: Option<String>,
}

/// Error body returned by the service on non-2xx responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    pub detail: serde_json::Value,
}

impl ErrorBody {
    /// The `detail` field as plain text.
    pub fn message(&self) -> String {
        match &self.detail {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}
