//! Desk event loop: the canonical list, one store per row, and the lookups in flight.

use crate::config::DeskConfig;
use crate::desk::aggregate::AggregateConfigList;
use crate::desk::model::{RowConfig, RowPatch};
use crate::desk::resolver::{LotSizeOutcome, LotSizeQuery, LotSizeResolver, RequestId};
use crate::desk::store::{RowConfigStore, RowEdit, RowEffects};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::{debug, info};

type ResolutionMessage = (usize, LotSizeOutcome);

/// Drives all rows of a desk.
///
/// All state lives on one task. Lookups run as spawned tasks and report back
/// over a channel; their results are applied one at a time by
/// [`DeskConsole::next_resolution`].
pub struct DeskConsole {
    list: AggregateConfigList,
    stores: Vec<RowConfigStore>,
    resolver: Arc<LotSizeResolver>,
    /// Per row: the lookup task currently running for it
    inflight: Vec<Option<(RequestId, AbortHandle)>>,
    results_tx: mpsc::UnboundedSender<ResolutionMessage>,
    results_rx: mpsc::UnboundedReceiver<ResolutionMessage>,
    pushes: u64,
}

impl DeskConsole {
    /// Wrap `list`, mounting a store on each existing row.
    pub fn new(resolver: Arc<LotSizeResolver>, list: AggregateConfigList) -> Self {
        let (results_tx, results_rx) = mpsc::unbounded_channel();
        let mut console = Self {
            list,
            stores: Vec::new(),
            resolver,
            inflight: Vec::new(),
            results_tx,
            results_rx,
            pushes: 0,
        };
        console.mount_rows();
        console
    }

    pub fn list(&self) -> &AggregateConfigList {
        &self.list
    }

    pub fn store(&self, index: usize) -> Option<&RowConfigStore> {
        self.stores.get(index)
    }

    pub fn row(&self, index: usize) -> Option<&RowConfig> {
        self.list.row(index)
    }

    /// Broker names offered to row selectors.
    pub fn available_brokers(&self) -> Vec<String> {
        self.list.available_brokers()
    }

    /// Number of updates pushed into the canonical list so far.
    pub fn push_count(&self) -> u64 {
        self.pushes
    }

    /// Lookups whose results are still awaited.
    pub fn pending_lookups(&self) -> usize {
        self.inflight.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn set_broker_count(&mut self, n: usize) {
        self.list.set_broker_count(n);
    }

    pub fn set_broker_name(&mut self, index: usize, name: &str) -> bool {
        self.list.set_broker_name(index, name)
    }

    /// Resize the row list. Removed rows lose their in-flight lookups;
    /// surviving rows are untouched.
    pub fn set_instrument_count(&mut self, n: usize) {
        self.list.set_instrument_count(n);

        if n < self.stores.len() {
            for (request_id, handle) in self.inflight.drain(n..).flatten() {
                debug!(%request_id, "Cancelling lookup for removed row");
                handle.abort();
            }
            self.stores.truncate(n);
        } else {
            self.mount_rows();
        }
    }

    /// Apply a user edit to row `index`. Returns false if the row does not exist.
    pub fn edit_row(&mut self, index: usize, edit: RowEdit) -> bool {
        let Some(store) = self.stores.get_mut(index) else {
            debug!(row = index, "Edit for missing row ignored");
            return false;
        };
        let effects = store.edit(edit, &self.resolver);
        self.apply_effects(index, effects);
        true
    }

    /// Merge a change made elsewhere straight into the canonical row, then let
    /// the row's store reconcile with it.
    pub fn apply_external(&mut self, index: usize, patch: &RowPatch) -> bool {
        if !self.list.update_row(index, patch) {
            return false;
        }
        self.reconcile_row(index);
        true
    }

    /// Replace the desk layout with `desk`.
    pub fn load_desk(&mut self, desk: &DeskConfig) {
        self.set_broker_count(desk.brokers.len());
        for (i, name) in desk.brokers.iter().enumerate() {
            self.set_broker_name(i, name);
        }

        self.set_instrument_count(desk.rows.len());
        for (i, row) in desk.rows.iter().enumerate() {
            let patch = RowPatch {
                ticker: Some(row.ticker.clone()),
                broker: Some(row.broker.clone()),
                lots: Some(row.lots),
                interval_minutes: Some(row.interval_minutes),
                target_percentage: Some(row.target_percentage),
                total_shares: None,
            };
            self.apply_external(i, &patch);
        }

        info!(
            brokers = desk.brokers.len(),
            rows = desk.rows.len(),
            "Desk layout loaded"
        );
    }

    /// Wait for the next lookup result and apply it.
    ///
    /// Returns the row it was delivered to, or `None` when nothing is in flight.
    pub async fn next_resolution(&mut self) -> Option<usize> {
        if self.pending_lookups() == 0 {
            return None;
        }

        let (index, outcome) = self.results_rx.recv().await?;
        let request_id = outcome.query.request_id;
        if let Some(slot) = self.inflight.get_mut(index) {
            if matches!(slot.as_ref(), Some((pending, _)) if *pending == request_id) {
                *slot = None;
            }
        }

        let Some(store) = self.stores.get_mut(index) else {
            debug!(row = index, %request_id, "Dropping result for removed row");
            return Some(index);
        };
        let effects = store.apply_lot_size(outcome);
        self.apply_effects(index, effects);
        Some(index)
    }

    /// Apply results until no lookup is in flight.
    pub async fn settle(&mut self) {
        while self.next_resolution().await.is_some() {}
    }

    fn mount_rows(&mut self) {
        while self.stores.len() < self.list.instrument_count() {
            let index = self.stores.len();
            let Some(snapshot) = self.list.row(index).cloned() else {
                break;
            };
            let (store, effects) = RowConfigStore::new(index, &snapshot, &self.resolver);
            self.stores.push(store);
            self.inflight.push(None);
            self.apply_effects(index, effects);
        }
    }

    fn reconcile_row(&mut self, index: usize) {
        let Some(canonical) = self.list.row(index).cloned() else {
            return;
        };
        let Some(store) = self.stores.get_mut(index) else {
            return;
        };
        let effects = store.reconcile(&canonical, &self.resolver);
        self.apply_effects(index, effects);
    }

    /// Run effects until the row is quiet: every push is merged upstream and
    /// the resulting snapshot handed straight back to the row.
    fn apply_effects(&mut self, index: usize, mut effects: RowEffects) {
        loop {
            self.sync_lookup(index, effects.lookup.take());

            let Some(patch) = effects.push.take() else {
                break;
            };
            if !self.list.update_row(index, &patch) {
                break;
            }
            self.pushes += 1;

            let (Some(canonical), Some(store)) =
                (self.list.row(index).cloned(), self.stores.get_mut(index))
            else {
                break;
            };
            effects = store.reconcile(&canonical, &self.resolver);
        }
    }

    /// Cancel a lookup the row no longer waits for and start the new one.
    fn sync_lookup(&mut self, index: usize, lookup: Option<LotSizeQuery>) {
        let pending = self.stores.get(index).and_then(|s| s.pending_request());
        let Some(slot) = self.inflight.get_mut(index) else {
            return;
        };

        let superseded =
            matches!(slot.as_ref(), Some((request_id, _)) if Some(*request_id) != pending);
        if superseded {
            if let Some((request_id, handle)) = slot.take() {
                debug!(row = index, %request_id, "Cancelling superseded lookup");
                handle.abort();
            }
        }

        if let Some(query) = lookup {
            let request_id = query.request_id;
            let resolver = Arc::clone(&self.resolver);
            let results = self.results_tx.clone();
            let task = tokio::spawn(async move {
                let outcome = resolver.run(query).await;
                // Receiver lives as long as the console
                let _ = results.send((index, outcome));
            });
            *slot = Some((request_id, task.abort_handle()));
        }
    }
}

impl Drop for DeskConsole {
    fn drop(&mut self) {
        for (_, handle) in self.inflight.iter().flatten() {
            handle.abort();
        }
    }
}
