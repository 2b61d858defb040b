//! Trade dispatch.
//!
//! Turns a finalized desk row into trade actions on the strategy service:
//! - Broker sessions established from configured credentials
//! - Fail-fast validation of the row before any remote call
//! - Start, stop and status requests, answered verbatim

mod dispatcher;
mod sessions;

pub use dispatcher::TradeDispatcher;
pub use sessions::{credentials_for, BrokerSession, SessionRegistry, SUPPORTED_BROKERS};
