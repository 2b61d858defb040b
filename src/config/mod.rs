//! Configuration management for the broker desk.
//!
//! Loads settings from environment variables and config files.

use crate::service::BrokerCredentials;
use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Candle intervals offered by the strategy service, in minutes.
pub const SUPPORTED_INTERVALS: [u32; 5] = [1, 5, 15, 30, 60];

/// Main application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Trading service endpoint settings
    #[serde(default)]
    pub service: ServiceConfig,
    /// Trading defaults and broker capabilities
    #[serde(default)]
    pub trading: TradingConfig,
    /// Broker credentials (read at runtime, never persisted)
    #[serde(default)]
    pub credentials: CredentialsConfig,
    /// Initial desk layout for CLI runs
    #[serde(default)]
    pub desk: DeskConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Base URL of the broker routes, e.g. `http://localhost:8000/api/brokers`
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Lot-size lookup timeout in seconds (instrument master downloads are slow)
    #[serde(default = "default_lookup_timeout")]
    pub lookup_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingConfig {
    /// Brokers whose adapters support live execution
    #[serde(default = "default_live_brokers")]
    pub live_brokers: Vec<String>,
    /// Lots for newly added rows
    #[serde(default = "default_lots")]
    pub default_lots: u32,
    /// Candle interval for newly added rows
    #[serde(default = "default_interval_minutes")]
    pub default_interval_minutes: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CredentialsConfig {
    #[serde(default)]
    pub upstox_access_token: Option<String>,
    #[serde(default)]
    pub angel_api_key: Option<String>,
    #[serde(default)]
    pub angel_client_code: Option<String>,
    #[serde(default)]
    pub angel_pin: Option<String>,
    #[serde(default)]
    pub angel_totp_secret: Option<String>,
    #[serde(default)]
    pub zerodha_api_key: Option<String>,
    #[serde(default)]
    pub zerodha_access_token: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeskConfig {
    /// Broker connection names, in slot order
    #[serde(default)]
    pub brokers: Vec<String>,
    /// Instrument rows, in slot order
    #[serde(default)]
    pub rows: Vec<DeskRowConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeskRowConfig {
    #[serde(default)]
    pub ticker: String,
    #[serde(default)]
    pub broker: String,
    #[serde(default = "default_lots")]
    pub lots: u32,
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u32,
    #[serde(default)]
    pub target_percentage: Decimal,
}

// Default value functions
fn default_base_url() -> String {
    "http://localhost:8000/api/brokers".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_lookup_timeout() -> u64 {
    10
}

fn default_live_brokers() -> Vec<String> {
    vec!["Upstox".to_string()] // Only the Upstox adapter implements order placement
}

fn default_lots() -> u32 {
    1
}

fn default_interval_minutes() -> u32 {
    5
}

impl Config {
    /// Load configuration from environment variables and config files.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::File::with_name("broker-desk").required(false))
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .prefix("BDESK")
                    .list_separator(",")
                    .with_list_parse_key("trading.live_brokers")
                    .with_list_parse_key("desk.brokers")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.service.timeout_secs > 0 && self.service.lookup_timeout_secs > 0,
            "service timeouts must be positive"
        );

        anyhow::ensure!(
            self.trading.default_lots >= 1,
            "default_lots must be >= 1"
        );

        anyhow::ensure!(
            SUPPORTED_INTERVALS.contains(&self.trading.default_interval_minutes),
            "default_interval_minutes must be one of {:?}",
            SUPPORTED_INTERVALS
        );

        for (i, row) in self.desk.rows.iter().enumerate() {
            anyhow::ensure!(
                SUPPORTED_INTERVALS.contains(&row.interval_minutes),
                "desk row {} interval must be one of {:?}",
                i,
                SUPPORTED_INTERVALS
            );
            anyhow::ensure!(
                row.target_percentage >= Decimal::ZERO,
                "desk row {} target_percentage must be >= 0",
                i
            );
        }

        Ok(())
    }
}

impl CredentialsConfig {
    /// Credentials for a broker, if any field for it was supplied.
    ///
    /// Incomplete credentials are returned as-is so the connection attempt
    /// reports which broker is missing fields.
    pub fn for_broker(&self, broker: &str) -> Option<BrokerCredentials> {
        let get = |v: &Option<String>| v.clone().unwrap_or_default();
        match broker {
            "Upstox" => self
                .upstox_access_token
                .as_ref()
                .map(|token| BrokerCredentials::Upstox {
                    access_token: token.clone(),
                }),
            "AngelOne" => {
                let any = [
                    &self.angel_api_key,
                    &self.angel_client_code,
                    &self.angel_pin,
                    &self.angel_totp_secret,
                ]
                .iter()
                .any(|v| v.is_some());
                any.then(|| BrokerCredentials::AngelOne {
                    api_key: get(&self.angel_api_key),
                    client_code: get(&self.angel_client_code),
                    pin: get(&self.angel_pin),
                    totp_secret: get(&self.angel_totp_secret),
                })
            }
            "Zerodha" => (self.zerodha_api_key.is_some() || self.zerodha_access_token.is_some())
                .then(|| BrokerCredentials::Zerodha {
                    api_key: get(&self.zerodha_api_key),
                    access_token: get(&self.zerodha_access_token),
                }),
            _ => None,
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
            lookup_timeout_secs: default_lookup_timeout(),
        }
    }
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            live_brokers: default_live_brokers(),
            default_lots: default_lots(),
            default_interval_minutes: default_interval_minutes(),
        }
    }
}
