//! Trading service integration.
//!
//! The remote service connects broker accounts, serves instrument details
//! (lot sizes) and runs the strategy sessions. Two implementations:
//! - `TradingServiceClient`: REST over HTTP
//! - `PaperTradingService`: in-memory, for offline runs

mod client;
pub mod paper;
mod traits;
mod types;

pub use client::TradingServiceClient;
pub use paper::PaperTradingService;
pub use traits::*;
pub use types::*;
