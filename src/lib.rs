//! # Broker Desk
//!
//! Multi-broker, multi-instrument trading desk configuration with live
//! lot-size reconciliation.
//!
//! ## Architecture
//!
//! - `config`: Configuration management and validation
//! - `catalog`: Ticker and display-name lookup for supported instruments
//! - `desk`: Row stores, the canonical row list, and lot-size resolution
//! - `dispatch`: Broker sessions and trade start/stop/status
//! - `service`: Trading service client (HTTP and paper)
//! - `error`: Validation, lookup and service errors

pub mod catalog;
pub mod config;
pub mod desk;
pub mod dispatch;
pub mod error;
pub mod service;

pub use config::Config;
