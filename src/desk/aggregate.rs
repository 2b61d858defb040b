//! Canonical row and broker lists.

use crate::desk::model::{BrokerConfig, RowConfig, RowPatch};
use tracing::debug;

/// Owns the canonical row and broker arrays.
///
/// The two arrays resize independently. Growing appends default entries,
/// shrinking truncates from the end; surviving entries are never touched.
#[derive(Debug, Clone)]
pub struct AggregateConfigList {
    rows: Vec<RowConfig>,
    brokers: Vec<BrokerConfig>,
    row_template: RowConfig,
}

impl AggregateConfigList {
    pub fn new() -> Self {
        Self::with_row_template(RowConfig::default())
    }

    /// Use `template` for rows appended on growth.
    pub fn with_row_template(template: RowConfig) -> Self {
        Self {
            rows: Vec::new(),
            brokers: Vec::new(),
            row_template: template,
        }
    }

    pub fn set_broker_count(&mut self, n: usize) {
        debug!(from = self.brokers.len(), to = n, "Resizing broker list");
        self.brokers.resize_with(n, BrokerConfig::default);
    }

    pub fn set_instrument_count(&mut self, n: usize) {
        debug!(from = self.rows.len(), to = n, "Resizing instrument list");
        let template = &self.row_template;
        self.rows.resize_with(n, || template.clone());
    }

    /// Rename the broker in slot `index`. Returns false if the slot does not exist.
    pub fn set_broker_name(&mut self, index: usize, name: &str) -> bool {
        match self.brokers.get_mut(index) {
            Some(broker) => {
                broker.name = name.to_string();
                true
            }
            None => false,
        }
    }

    /// Merge `patch` into the row at `index`.
    ///
    /// Out-of-bounds indices are ignored: a late update for a row removed by a
    /// shrink is dropped. Returns whether the patch was applied.
    pub fn update_row(&mut self, index: usize, patch: &RowPatch) -> bool {
        match self.rows.get_mut(index) {
            Some(row) => {
                patch.apply_to(row);
                true
            }
            None => {
                debug!(row = index, "Dropping update for removed row");
                false
            }
        }
    }

    /// Non-empty broker names in declaration order, computed on every call.
    pub fn available_brokers(&self) -> Vec<String> {
        self.brokers
            .iter()
            .filter(|b| !b.name.is_empty())
            .map(|b| b.name.clone())
            .collect()
    }

    pub fn row(&self, index: usize) -> Option<&RowConfig> {
        self.rows.get(index)
    }

    pub fn rows(&self) -> &[RowConfig] {
        &self.rows
    }

    pub fn brokers(&self) -> &[BrokerConfig] {
        &self.brokers
    }

    pub fn instrument_count(&self) -> usize {
        self.rows.len()
    }

    pub fn broker_count(&self) -> usize {
        self.brokers.len()
    }
}

impl Default for AggregateConfigList {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured_row(ticker: &str) -> RowPatch {
        RowPatch {
            ticker: Some(ticker.to_string()),
            broker: Some("Upstox".to_string()),
            lots: Some(4),
            ..RowPatch::default()
        }
    }

    #[test]
    fn test_grow_preserves_existing_rows() {
        let mut list = AggregateConfigList::new();
        list.set_instrument_count(2);
        list.update_row(0, &configured_row("NIFTY"));
        list.update_row(1, &configured_row("BANKNIFTY"));
        let before = list.rows().to_vec();

        list.set_instrument_count(5);

        assert_eq!(list.instrument_count(), 5);
        assert_eq!(&list.rows()[..2], &before[..]);
        for row in &list.rows()[2..] {
            assert_eq!(row, &RowConfig::default());
        }
    }

    #[test]
    fn test_shrink_truncates_from_end() {
        let mut list = AggregateConfigList::new();
        list.set_instrument_count(3);
        list.update_row(0, &configured_row("NIFTY"));
        list.update_row(2, &configured_row("FINNIFTY"));
        let first = list.rows()[0].clone();

        list.set_instrument_count(1);

        assert_eq!(list.rows(), &[first]);
    }

    #[test]
    fn test_update_out_of_bounds_is_noop() {
        let mut list = AggregateConfigList::new();
        list.set_instrument_count(1);
        let patch = RowPatch {
            total_shares: Some(150),
            ..RowPatch::default()
        };

        assert!(!list.update_row(3, &patch));
        assert_eq!(list.rows(), &[RowConfig::default()]);
    }

    #[test]
    fn test_counts_are_independent() {
        let mut list = AggregateConfigList::new();
        list.set_broker_count(2);
        list.set_broker_name(0, "Upstox");
        list.set_instrument_count(3);
        list.update_row(1, &configured_row("NIFTY"));

        list.set_broker_count(0);
        assert_eq!(list.instrument_count(), 3);
        assert_eq!(list.row(1).unwrap().ticker, "NIFTY");

        list.set_broker_count(1);
        list.set_instrument_count(0);
        assert_eq!(list.broker_count(), 1);
        // Truncated broker slots come back empty
        assert_eq!(list.brokers()[0].name, "");
    }

    #[test]
    fn test_available_brokers_reflects_latest_edits() {
        let mut list = AggregateConfigList::new();
        list.set_broker_count(3);
        list.set_broker_name(0, "Upstox");
        list.set_broker_name(2, "Zerodha");
        assert_eq!(list.available_brokers(), vec!["Upstox", "Zerodha"]);

        list.set_broker_name(1, "AngelOne");
        list.set_broker_name(0, "");
        assert_eq!(list.available_brokers(), vec!["AngelOne", "Zerodha"]);
        assert!(!list.set_broker_name(5, "Fyers"));
    }

    #[test]
    fn test_row_template_used_on_growth() {
        let mut list = AggregateConfigList::with_row_template(RowConfig::with_defaults(2, 15));
        list.set_instrument_count(1);
        assert_eq!(list.row(0).unwrap().lots, 2);
        assert_eq!(list.row(0).unwrap().interval_minutes, 15);
    }
}
