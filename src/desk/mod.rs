//! Row configuration desk.
//!
//! Keeps each instrument row's working copy consistent with the canonical
//! row list while lot sizes are resolved asynchronously:
//! - `AggregateConfigList`: canonical rows and broker slots
//! - `RowConfigStore`: per-row working copy and reconciliation
//! - `LotSizeResolver`: tagged lot-size lookups
//! - `DeskConsole`: the single-task loop tying them together

mod aggregate;
mod console;
mod model;
mod resolver;
mod store;

pub use aggregate::AggregateConfigList;
pub use console::DeskConsole;
pub use model::{BrokerConfig, LotsInput, Origin, RowConfig, RowPatch};
pub use resolver::{LotSizeOutcome, LotSizeQuery, LotSizeResolver, RequestId};
pub use store::{RowConfigStore, RowEdit, RowEffects, RowPhase};
