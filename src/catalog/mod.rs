//! Static instrument catalog.
//!
//! Bidirectional mapping between display names ("Nifty 50") and short tickers
//! ("NIFTY"), plus the index instrument key used by the trading service for
//! instruments that can be traded live.

use std::collections::HashMap;
use std::sync::OnceLock;

/// Kind of listed instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstrumentKind {
    /// Index with weekly options (tradable by the strategy service).
    IndexOption,
    /// Cash equity (lot size lookups only).
    Equity,
}

/// One catalog row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub ticker: &'static str,
    pub display_name: &'static str,
    pub kind: InstrumentKind,
    /// Index instrument key, e.g. `NSE_INDEX|Nifty 50`. `None` when not tradable.
    pub instrument_key: Option<&'static str>,
}

const STANDARD_ENTRIES: &[CatalogEntry] = &[
    CatalogEntry {
        ticker: "NIFTY",
        display_name: "Nifty 50",
        kind: InstrumentKind::IndexOption,
        instrument_key: Some("NSE_INDEX|Nifty 50"),
    },
    CatalogEntry {
        ticker: "BANKNIFTY",
        display_name: "Nifty Bank",
        kind: InstrumentKind::IndexOption,
        instrument_key: Some("NSE_INDEX|Nifty Bank"),
    },
    CatalogEntry {
        ticker: "FINNIFTY",
        display_name: "Nifty Fin Service",
        kind: InstrumentKind::IndexOption,
        instrument_key: Some("NSE_INDEX|Nifty Fin Service"),
    },
    CatalogEntry {
        ticker: "MIDCPNIFTY",
        display_name: "NIFTY MID SELECT",
        kind: InstrumentKind::IndexOption,
        instrument_key: Some("NSE_INDEX|NIFTY MID SELECT"),
    },
    CatalogEntry {
        ticker: "RELIANCE",
        display_name: "Reliance Industries",
        kind: InstrumentKind::Equity,
        instrument_key: None,
    },
    CatalogEntry {
        ticker: "TCS",
        display_name: "Tata Consultancy Services",
        kind: InstrumentKind::Equity,
        instrument_key: None,
    },
    CatalogEntry {
        ticker: "INFY",
        display_name: "Infosys",
        kind: InstrumentKind::Equity,
        instrument_key: None,
    },
    CatalogEntry {
        ticker: "HDFCBANK",
        display_name: "HDFC Bank",
        kind: InstrumentKind::Equity,
        instrument_key: None,
    },
];

/// Immutable ticker/display-name lookup table.
#[derive(Debug)]
pub struct InstrumentCatalog {
    entries: Vec<CatalogEntry>,
    by_ticker: HashMap<&'static str, usize>,
    by_display_name: HashMap<&'static str, usize>,
}

impl InstrumentCatalog {
    /// Build a catalog from a fixed set of entries.
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        let by_ticker = entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.ticker, i))
            .collect();
        let by_display_name = entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.display_name, i))
            .collect();

        Self {
            entries,
            by_ticker,
            by_display_name,
        }
    }

    /// The built-in NSE catalog, built on first use.
    pub fn standard() -> &'static InstrumentCatalog {
        static CATALOG: OnceLock<InstrumentCatalog> = OnceLock::new();
        CATALOG.get_or_init(|| InstrumentCatalog::new(STANDARD_ENTRIES.to_vec()))
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn by_ticker(&self, ticker: &str) -> Option<&CatalogEntry> {
        self.by_ticker.get(ticker).map(|&i| &self.entries[i])
    }

    pub fn by_display_name(&self, name: &str) -> Option<&CatalogEntry> {
        self.by_display_name.get(name).map(|&i| &self.entries[i])
    }

    pub fn display_name(&self, ticker: &str) -> Option<&'static str> {
        self.by_ticker(ticker).map(|e| e.display_name)
    }

    pub fn ticker(&self, display_name: &str) -> Option<&'static str> {
        self.by_display_name(display_name).map(|e| e.ticker)
    }

    /// Tradable instrument key for a ticker, if the instrument can be traded live.
    pub fn instrument_key(&self, ticker: &str) -> Option<&'static str> {
        self.by_ticker(ticker).and_then(|e| e.instrument_key)
    }
}
