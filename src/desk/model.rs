//! Row and broker configuration values, and the diff/merge used to reconcile them.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One instrument row as held by the aggregate list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowConfig {
    /// Short code, empty when unset
    pub ticker: String,
    /// Broker connection name, empty when unset
    pub broker: String,
    pub lots: u32,
    pub interval_minutes: u32,
    pub target_percentage: Decimal,
    /// Derived: `lots * lot_size` once the lot size is known, else 0
    pub total_shares: u64,
}

impl RowConfig {
    /// An unset row with the given lots and interval defaults.
    pub fn with_defaults(lots: u32, interval_minutes: u32) -> Self {
        Self {
            lots,
            interval_minutes,
            ..Self::default()
        }
    }

    /// Both ticker and broker are selected.
    pub fn is_selected(&self) -> bool {
        !self.ticker.is_empty() && !self.broker.is_empty()
    }
}

impl Default for RowConfig {
    fn default() -> Self {
        Self {
            ticker: String::new(),
            broker: String::new(),
            lots: 1,
            interval_minutes: 5,
            target_percentage: Decimal::ZERO,
            total_shares: 0,
        }
    }
}

/// One broker connection slot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Broker name, empty when unset
    pub name: String,
}

/// Partial update of a [`RowConfig`]. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticker: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub broker: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lots: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_minutes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_percentage: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_shares: Option<u64>,
}

impl RowPatch {
    /// Fields of `after` whose values differ from `before`.
    pub fn diff(before: &RowConfig, after: &RowConfig) -> Self {
        fn changed<T: PartialEq + Clone>(a: &T, b: &T) -> Option<T> {
            (a != b).then(|| b.clone())
        }

        Self {
            ticker: changed(&before.ticker, &after.ticker),
            broker: changed(&before.broker, &after.broker),
            lots: changed(&before.lots, &after.lots),
            interval_minutes: changed(&before.interval_minutes, &after.interval_minutes),
            target_percentage: changed(&before.target_percentage, &after.target_percentage),
            total_shares: changed(&before.total_shares, &after.total_shares),
        }
    }

    /// Shallow merge into `row`: present fields overwrite, others are preserved.
    pub fn apply_to(&self, row: &mut RowConfig) {
        if let Some(ticker) = &self.ticker {
            row.ticker = ticker.clone();
        }
        if let Some(broker) = &self.broker {
            row.broker = broker.clone();
        }
        if let Some(lots) = self.lots {
            row.lots = lots;
        }
        if let Some(interval) = self.interval_minutes {
            row.interval_minutes = interval;
        }
        if let Some(target) = self.target_percentage {
            row.target_percentage = target;
        }
        if let Some(total) = self.total_shares {
            row.total_shares = total;
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Whether the patch touches a field that `total_shares` depends on.
    pub fn affects_shares(&self) -> bool {
        self.ticker.is_some()
            || self.broker.is_some()
            || self.lots.is_some()
            || self.total_shares.is_some()
    }

    /// Carry the current `lots` and `total_shares` so the pair stays consistent upstream.
    pub fn with_share_fields(mut self, row: &RowConfig) -> Self {
        self.lots = Some(row.lots);
        self.total_shares = Some(row.total_shares);
        self
    }
}

/// Which side of the reconciliation produced a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// User input on the row, or a completed lot-size resolution
    Local,
    /// A new canonical snapshot from the aggregate list
    External,
}

/// Lots field as typed by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LotsInput {
    /// Field cleared mid-edit; held locally, never pushed
    Empty,
    Count(u32),
}

impl LotsInput {
    /// Parse raw field text. Anything that is not an integer >= 1 reads as empty.
    pub fn parse(text: &str) -> Self {
        match text.trim().parse::<u32>() {
            Ok(n) if n >= 1 => LotsInput::Count(n),
            _ => LotsInput::Empty,
        }
    }
}
