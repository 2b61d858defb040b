//! Lot-size resolution with request tokens.
//!
//! Every lookup is tagged with a [`RequestId`] drawn from a single strictly
//! increasing sequence. Rows remember the last id they issued and compare on
//! arrival, so a slow response for a previous selection can never overwrite
//! the result for the current one.

use crate::catalog::InstrumentCatalog;
use crate::error::LookupFailure;
use crate::service::LotSizeSource;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Token identifying one lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A tagged lookup waiting to be run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LotSizeQuery {
    pub ticker: String,
    pub broker: String,
    pub request_id: RequestId,
}

/// A completed lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LotSizeOutcome {
    pub query: LotSizeQuery,
    pub result: Result<u32, LookupFailure>,
}

/// Resolves lot sizes for (ticker, broker) pairs.
///
/// No retries: each call is exactly one attempt against the source.
pub struct LotSizeResolver {
    source: Arc<dyn LotSizeSource>,
    catalog: &'static InstrumentCatalog,
    next_request: AtomicU64,
}

impl LotSizeResolver {
    pub fn new(source: Arc<dyn LotSizeSource>) -> Self {
        Self {
            source,
            catalog: InstrumentCatalog::standard(),
            next_request: AtomicU64::new(1),
        }
    }

    /// Tag a new lookup for `(ticker, broker)`.
    ///
    /// Returns `None` when either is empty: the row is not configured yet and
    /// its lot size is 0 without any remote call.
    pub fn prepare(&self, ticker: &str, broker: &str) -> Option<LotSizeQuery> {
        if ticker.is_empty() || broker.is_empty() {
            return None;
        }

        let request_id = RequestId(self.next_request.fetch_add(1, Ordering::SeqCst));
        debug!(%ticker, %broker, %request_id, "Prepared lot size lookup");
        Some(LotSizeQuery {
            ticker: ticker.to_string(),
            broker: broker.to_string(),
            request_id,
        })
    }

    /// Resolve a lot size directly, without a token.
    pub async fn resolve(&self, ticker: &str, broker: &str) -> Result<u32, LookupFailure> {
        if ticker.is_empty() || broker.is_empty() {
            return Ok(0);
        }

        let instrument_name = self.instrument_name(ticker);
        let result = self.source.lookup(broker, instrument_name).await;
        match &result {
            Ok(lot_size) => info!(%ticker, %broker, lot_size, "Lot size resolved"),
            Err(e) => warn!(%ticker, %broker, error = %e, "Lot size resolution failed"),
        }
        result
    }

    /// Run a prepared query.
    pub async fn run(&self, query: LotSizeQuery) -> LotSizeOutcome {
        let result = self.resolve(&query.ticker, &query.broker).await;
        LotSizeOutcome { query, result }
    }

    /// Name sent to the instrument detail service: the catalog display name
    /// when the ticker is listed, the raw ticker otherwise.
    pub fn instrument_name<'a>(&self, ticker: &'a str) -> &'a str {
        self.catalog.display_name(ticker).unwrap_or(ticker)
    }
}
