//! Per-row working copy and its reconciliation with the canonical list.
//!
//! Two directions, one diff function:
//! - downward: a canonical snapshot is diffed against the last snapshot this
//!   row saw; only fields that changed upstream are adopted, so a local
//!   mid-edit on another field survives.
//! - upward: a local edit or a fresh lot size is diffed against the working
//!   copy before the change, and the changed fields are pushed up.
//!
//! Pushed patches are folded into the row's baseline immediately, so the
//! canonical echo of a push diffs to nothing and triggers no further push.

use crate::config::SUPPORTED_INTERVALS;
use crate::desk::model::{LotsInput, Origin, RowConfig, RowPatch};
use crate::desk::resolver::{LotSizeOutcome, LotSizeQuery, LotSizeResolver, RequestId};
use crate::error::LookupFailure;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

/// Resolution state of a row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowPhase {
    /// Ticker or broker unset
    Idle,
    /// Lookup in flight
    Resolving { request_id: RequestId },
    /// Lot size known
    Resolved { lot_size: u32 },
    /// Lookup failed; lot size treated as 0
    Failed { error: LookupFailure },
}

impl RowPhase {
    pub fn lot_size(&self) -> u32 {
        match self {
            RowPhase::Resolved { lot_size } => *lot_size,
            _ => 0,
        }
    }
}

/// A user edit on one row.
#[derive(Debug, Clone, PartialEq)]
pub enum RowEdit {
    Ticker(String),
    Broker(String),
    Lots(LotsInput),
    /// The lots field lost focus
    LotsBlur,
    Interval(u32),
    TargetPercentage(Decimal),
}

/// What a row transition asks its owner to do.
#[derive(Debug, Clone, PartialEq)]
pub struct RowEffects {
    pub origin: Origin,
    /// Partial update to merge into the canonical row
    pub push: Option<RowPatch>,
    /// Lookup to start; supersedes any earlier one for this row
    pub lookup: Option<LotSizeQuery>,
}

impl RowEffects {
    fn none(origin: Origin) -> Self {
        Self {
            origin,
            push: None,
            lookup: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.push.is_none() && self.lookup.is_none()
    }
}

/// Working copy of one row.
#[derive(Debug, Clone)]
pub struct RowConfigStore {
    index: usize,
    /// Committed local values; `lots` is always a valid count
    working: RowConfig,
    /// Lots field text state; may be empty while `working.lots` keeps the last count
    lots_input: LotsInput,
    /// Last canonical state this row saw or pushed
    baseline: RowConfig,
    phase: RowPhase,
}

impl RowConfigStore {
    /// Mount a store on a canonical snapshot, starting a lookup if the row is configured.
    pub fn new(index: usize, snapshot: &RowConfig, resolver: &LotSizeResolver) -> (Self, RowEffects) {
        let mut store = Self {
            index,
            working: snapshot.clone(),
            lots_input: LotsInput::Count(snapshot.lots),
            baseline: snapshot.clone(),
            phase: RowPhase::Idle,
        };

        let lookup = store.restart_lookup(resolver);
        let effects = store.finish(snapshot.clone(), Origin::External, lookup);
        (store, effects)
    }

    pub fn working(&self) -> &RowConfig {
        &self.working
    }

    pub fn lots_input(&self) -> LotsInput {
        self.lots_input
    }

    pub fn phase(&self) -> &RowPhase {
        &self.phase
    }

    /// Lookup whose result this row is waiting for.
    pub fn pending_request(&self) -> Option<RequestId> {
        match self.phase {
            RowPhase::Resolving { request_id } => Some(request_id),
            _ => None,
        }
    }

    /// The last resolution failed.
    pub fn is_unresolved(&self) -> bool {
        matches!(self.phase, RowPhase::Failed { .. })
    }

    /// Apply a user edit.
    pub fn edit(&mut self, edit: RowEdit, resolver: &LotSizeResolver) -> RowEffects {
        let before = self.working.clone();
        let mut lookup = None;

        match edit {
            RowEdit::Ticker(ticker) => {
                if ticker != self.working.ticker {
                    self.working.ticker = ticker;
                    lookup = self.restart_lookup(resolver);
                }
            }
            RowEdit::Broker(broker) => {
                if broker != self.working.broker {
                    self.working.broker = broker;
                    lookup = self.restart_lookup(resolver);
                }
            }
            RowEdit::Lots(LotsInput::Empty) | RowEdit::Lots(LotsInput::Count(0)) => {
                debug!(row = self.index, "Lots cleared, holding locally");
                self.lots_input = LotsInput::Empty;
            }
            RowEdit::Lots(LotsInput::Count(lots)) => {
                self.lots_input = LotsInput::Count(lots);
                self.working.lots = lots;
            }
            RowEdit::LotsBlur => {
                if self.lots_input == LotsInput::Empty {
                    self.lots_input = LotsInput::Count(self.working.lots);
                }
            }
            RowEdit::Interval(minutes) => {
                if SUPPORTED_INTERVALS.contains(&minutes) {
                    self.working.interval_minutes = minutes;
                } else {
                    warn!(row = self.index, minutes, "Ignoring unsupported interval");
                }
            }
            RowEdit::TargetPercentage(target) => {
                if target >= Decimal::ZERO {
                    self.working.target_percentage = target;
                } else {
                    warn!(row = self.index, %target, "Ignoring negative target percentage");
                }
            }
        }

        self.finish(before, Origin::Local, lookup)
    }

    /// Adopt a canonical snapshot.
    pub fn reconcile(&mut self, canonical: &RowConfig, resolver: &LotSizeResolver) -> RowEffects {
        let upstream = RowPatch::diff(&self.baseline, canonical);
        self.baseline = canonical.clone();
        if upstream.is_empty() {
            return RowEffects::none(Origin::External);
        }

        debug!(row = self.index, ?upstream, "Adopting canonical changes");
        let before = self.working.clone();
        let mut selection_changed = false;

        if let Some(ticker) = upstream.ticker {
            selection_changed |= ticker != self.working.ticker;
            self.working.ticker = ticker;
        }
        if let Some(broker) = upstream.broker {
            selection_changed |= broker != self.working.broker;
            self.working.broker = broker;
        }
        if let Some(lots) = upstream.lots {
            self.working.lots = lots;
            self.lots_input = LotsInput::Count(lots);
        }
        if let Some(interval) = upstream.interval_minutes {
            self.working.interval_minutes = interval;
        }
        if let Some(target) = upstream.target_percentage {
            self.working.target_percentage = target;
        }
        // total_shares is derived here and never adopted from upstream

        let lookup = if selection_changed {
            self.restart_lookup(resolver)
        } else {
            None
        };

        self.finish(before, Origin::External, lookup)
    }

    /// Apply a completed lookup. Results for any request other than the
    /// latest one issued by this row are discarded.
    pub fn apply_lot_size(&mut self, outcome: LotSizeOutcome) -> RowEffects {
        let request_id = outcome.query.request_id;
        if self.pending_request() != Some(request_id) {
            debug!(
                row = self.index,
                %request_id,
                pending = ?self.pending_request(),
                "Discarding stale lot size result"
            );
            return RowEffects::none(Origin::Local);
        }

        let before = self.working.clone();
        self.phase = match outcome.result {
            Ok(lot_size) => {
                info!(row = self.index, ticker = %outcome.query.ticker, lot_size, "Row resolved");
                RowPhase::Resolved { lot_size }
            }
            Err(error) => {
                warn!(row = self.index, ticker = %outcome.query.ticker, %error, "Row unresolved");
                RowPhase::Failed { error }
            }
        };

        self.finish(before, Origin::Local, None)
    }

    fn restart_lookup(&mut self, resolver: &LotSizeResolver) -> Option<LotSizeQuery> {
        match resolver.prepare(&self.working.ticker, &self.working.broker) {
            Some(query) => {
                self.phase = RowPhase::Resolving {
                    request_id: query.request_id,
                };
                Some(query)
            }
            None => {
                self.phase = RowPhase::Idle;
                None
            }
        }
    }

    /// Recompute the derived field and push whatever differs from upstream.
    fn finish(
        &mut self,
        before: RowConfig,
        origin: Origin,
        lookup: Option<LotSizeQuery>,
    ) -> RowEffects {
        self.working.total_shares = u64::from(self.working.lots) * u64::from(self.phase.lot_size());

        let push = match origin {
            Origin::Local => {
                let changed = RowPatch::diff(&before, &self.working);
                let changed = if changed.affects_shares() {
                    changed.with_share_fields(&self.working)
                } else {
                    changed
                };
                // Never push what upstream already holds
                let mut upstream = self.baseline.clone();
                changed.apply_to(&mut upstream);
                (upstream != self.baseline).then_some(changed)
            }
            // Upstream values were just adopted; only the derived pair can be stale
            Origin::External => (self.working.total_shares != self.baseline.total_shares)
                .then(|| RowPatch::default().with_share_fields(&self.working)),
        };

        if let Some(patch) = &push {
            patch.apply_to(&mut self.baseline);
            debug!(row = self.index, ?origin, ?patch, "Pushing row update");
        }

        RowEffects {
            origin,
            push,
            lookup,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::MockLotSizeSource;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn resolver() -> LotSizeResolver {
        LotSizeResolver::new(Arc::new(MockLotSizeSource::new()))
    }

    fn nifty_row() -> RowConfig {
        RowConfig {
            ticker: "NIFTY".to_string(),
            broker: "Upstox".to_string(),
            lots: 2,
            ..RowConfig::default()
        }
    }

    fn resolved(query: LotSizeQuery, lot_size: u32) -> LotSizeOutcome {
        LotSizeOutcome {
            query,
            result: Ok(lot_size),
        }
    }

    /// Store mounted on a configured row, with its initial lookup returned.
    fn mounted(row: &RowConfig, resolver: &LotSizeResolver) -> (RowConfigStore, LotSizeQuery) {
        let (store, effects) = RowConfigStore::new(0, row, resolver);
        (store, effects.lookup.unwrap())
    }

    #[test]
    fn test_unconfigured_row_is_idle() {
        let resolver = resolver();
        let (store, effects) = RowConfigStore::new(0, &RowConfig::default(), &resolver);
        assert!(effects.is_empty());
        assert_eq!(store.phase(), &RowPhase::Idle);
    }

    #[test]
    fn test_resolution_pushes_total_and_lots() {
        let resolver = resolver();
        let (mut store, query) = mounted(&nifty_row(), &resolver);
        assert!(matches!(store.phase(), RowPhase::Resolving { .. }));

        let effects = store.apply_lot_size(resolved(query, 75));

        assert_eq!(store.phase(), &RowPhase::Resolved { lot_size: 75 });
        assert_eq!(store.working().total_shares, 150);
        assert_eq!(
            effects.push,
            Some(RowPatch {
                lots: Some(2),
                total_shares: Some(150),
                ..RowPatch::default()
            })
        );
    }

    #[test]
    fn test_stale_result_is_discarded() {
        let resolver = resolver();
        let (mut store, nifty_query) = mounted(&nifty_row(), &resolver);

        let effects = store.edit(RowEdit::Ticker("BANKNIFTY".to_string()), &resolver);
        let bank_query = effects.lookup.unwrap();

        // The old lookup lands after the switch
        let stale = store.apply_lot_size(resolved(nifty_query, 75));
        assert!(stale.is_empty());
        assert_eq!(store.working().total_shares, 0);
        assert_eq!(store.pending_request(), Some(bank_query.request_id));

        store.apply_lot_size(resolved(bank_query, 35));
        assert_eq!(store.working().total_shares, 70);
        assert_eq!(store.phase().lot_size(), 35);
    }

    #[test]
    fn test_stale_result_after_newer_one_completed() {
        let resolver = resolver();
        let (mut store, first) = mounted(&nifty_row(), &resolver);
        let second = store
            .edit(RowEdit::Broker("Zerodha".to_string()), &resolver)
            .lookup
            .unwrap();

        store.apply_lot_size(resolved(second, 75));
        let late = store.apply_lot_size(resolved(first, 999));

        assert!(late.is_empty());
        assert_eq!(store.phase(), &RowPhase::Resolved { lot_size: 75 });
    }

    #[test]
    fn test_echo_of_push_triggers_nothing() {
        let resolver = resolver();
        let (mut store, query) = mounted(&nifty_row(), &resolver);
        let mut canonical = nifty_row();
        store
            .apply_lot_size(resolved(query, 75))
            .push
            .unwrap()
            .apply_to(&mut canonical);
        store.reconcile(&canonical, &resolver);

        let effects = store.edit(RowEdit::Lots(LotsInput::Count(3)), &resolver);
        let push = effects.push.unwrap();
        assert_eq!(push.lots, Some(3));
        assert_eq!(push.total_shares, Some(225));

        // Upstream merges the push and hands back a fresh snapshot of equal value
        push.apply_to(&mut canonical);
        let echo = store.reconcile(&canonical.clone(), &resolver);
        assert!(echo.is_empty());
    }

    #[test]
    fn test_unchanged_edit_pushes_nothing() {
        let resolver = resolver();
        let (mut store, _) = mounted(&nifty_row(), &resolver);

        assert!(store.edit(RowEdit::Lots(LotsInput::Count(2)), &resolver).is_empty());
        assert!(store.edit(RowEdit::Ticker("NIFTY".to_string()), &resolver).is_empty());
        assert!(store.edit(RowEdit::Interval(5), &resolver).is_empty());
    }

    #[test]
    fn test_empty_lots_held_locally() {
        let resolver = resolver();
        let (mut store, query) = mounted(&nifty_row(), &resolver);
        store.apply_lot_size(resolved(query, 75));

        let effects = store.edit(RowEdit::Lots(LotsInput::Empty), &resolver);
        assert!(effects.push.is_none());
        assert_eq!(store.lots_input(), LotsInput::Empty);
        assert_eq!(store.working().lots, 2);
        assert_eq!(store.working().total_shares, 150);

        // An unrelated canonical change does not clobber the cleared field
        let mut canonical = store.baseline.clone();
        canonical.target_percentage = dec!(2.5);
        store.reconcile(&canonical, &resolver);
        assert_eq!(store.lots_input(), LotsInput::Empty);
        assert_eq!(store.working().target_percentage, dec!(2.5));

        let effects = store.edit(RowEdit::Lots(LotsInput::Count(4)), &resolver);
        assert_eq!(effects.push.unwrap().total_shares, Some(300));
    }

    #[test]
    fn test_zero_lots_never_pushed() {
        let resolver = resolver();
        let (mut store, query) = mounted(&nifty_row(), &resolver);
        store.apply_lot_size(resolved(query, 75));

        let effects = store.edit(RowEdit::Lots(LotsInput::Count(0)), &resolver);

        assert!(effects.is_empty());
        assert_eq!(store.lots_input(), LotsInput::Empty);
        assert_eq!(store.working().lots, 2);
        assert_eq!(store.working().total_shares, 150);
        assert_eq!(store.baseline.lots, 2);
    }

    #[test]
    fn test_blur_restores_committed_lots() {
        let resolver = resolver();
        let (mut store, _) = mounted(&nifty_row(), &resolver);
        store.edit(RowEdit::Lots(LotsInput::Empty), &resolver);

        let effects = store.edit(RowEdit::LotsBlur, &resolver);
        assert!(effects.is_empty());
        assert_eq!(store.lots_input(), LotsInput::Count(2));
    }

    #[test]
    fn test_selection_change_resets_total_in_same_push() {
        let resolver = resolver();
        let (mut store, query) = mounted(&nifty_row(), &resolver);
        store.apply_lot_size(resolved(query, 75));

        let effects = store.edit(RowEdit::Ticker("FINNIFTY".to_string()), &resolver);
        let push = effects.push.unwrap();
        assert_eq!(push.ticker.as_deref(), Some("FINNIFTY"));
        assert_eq!(push.total_shares, Some(0));
        assert_eq!(push.lots, Some(2));
        assert!(effects.lookup.is_some());
    }

    #[test]
    fn test_clearing_ticker_goes_idle_and_drops_pending() {
        let resolver = resolver();
        let (mut store, query) = mounted(&nifty_row(), &resolver);

        let effects = store.edit(RowEdit::Ticker(String::new()), &resolver);
        assert!(effects.lookup.is_none());
        assert_eq!(store.phase(), &RowPhase::Idle);

        assert!(store.apply_lot_size(resolved(query, 75)).is_empty());
        assert_eq!(store.working().total_shares, 0);
    }

    #[test]
    fn test_failure_degrades_to_zero() {
        let resolver = resolver();
        let (mut store, query) = mounted(&nifty_row(), &resolver);
        store.apply_lot_size(resolved(query, 75));
        let query = store
            .edit(RowEdit::Broker("AngelOne".to_string()), &resolver)
            .lookup
            .unwrap();

        let effects = store.apply_lot_size(LotSizeOutcome {
            query,
            result: Err(LookupFailure::Timeout),
        });

        assert!(store.is_unresolved());
        assert_eq!(store.working().total_shares, 0);
        // The zero was already pushed with the broker change
        assert!(effects.push.is_none());
    }

    #[test]
    fn test_external_selection_change_relooks_up() {
        let resolver = resolver();
        let (mut store, query) = mounted(&nifty_row(), &resolver);
        store.apply_lot_size(resolved(query, 75));

        let mut canonical = store.baseline.clone();
        canonical.ticker = "BANKNIFTY".to_string();
        let effects = store.reconcile(&canonical, &resolver);

        assert_eq!(effects.origin, Origin::External);
        assert!(effects.lookup.is_some());
        // Upstream still claims 150 shares; the stale derived pair is corrected
        assert_eq!(
            effects.push,
            Some(RowPatch {
                lots: Some(2),
                total_shares: Some(0),
                ..RowPatch::default()
            })
        );
    }

    #[test]
    fn test_external_total_is_never_adopted() {
        let resolver = resolver();
        let (mut store, query) = mounted(&nifty_row(), &resolver);
        store.apply_lot_size(resolved(query, 75));

        let mut canonical = store.baseline.clone();
        canonical.total_shares = 9999;
        let effects = store.reconcile(&canonical, &resolver);

        assert_eq!(store.working().total_shares, 150);
        assert_eq!(effects.push.unwrap().total_shares, Some(150));
    }

    #[test]
    fn test_rejects_invalid_interval_and_target() {
        let resolver = resolver();
        let (mut store, _) = mounted(&nifty_row(), &resolver);

        assert!(store.edit(RowEdit::Interval(7), &resolver).is_empty());
        assert!(store
            .edit(RowEdit::TargetPercentage(dec!(-1)), &resolver)
            .is_empty());

        let effects = store.edit(RowEdit::Interval(15), &resolver);
        assert_eq!(
            effects.push,
            Some(RowPatch {
                interval_minutes: Some(15),
                ..RowPatch::default()
            })
        );
    }
}
