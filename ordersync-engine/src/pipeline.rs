//! Pass entrypoints shared by the CLI and the daemon processor.
//!
//! Each pass is a blocking sequence: fetch the snapshot, load the stored set,
//! decide in memory, then write.

use std::path::Path;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use ordersync_core::types::order_label;
use ordersync_core::{
    FieldSchema, OrderId, OrderStore, RecordRef, Shipment, ShipmentStore, SourceFeed,
    StatusFilter, StoredSet,
};

use crate::error::SyncError;
use crate::reconcile::{self, ComparisonReport, ReconciliationReport, RecordFailure};
use crate::shipment::{map_order, shipment_key, MappingOutcome, ShipmentIssue, ShipmentReport};
use crate::state::{self, SyncState};

/// Outcome of an insert-only pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    pub inserted: Vec<RecordRef>,
    /// Already stored; left untouched.
    pub skipped: Vec<RecordRef>,
    pub failed: Vec<RecordFailure>,
}

fn warn_about_stored_set(fetched: &[serde_json::Value], stored: &StoredSet) {
    let readable = stored.records.len();
    if fetched.is_empty() && readable > 0 {
        tracing::warn!("feed returned an empty snapshot; all {readable} stored orders classify as archived");
    }
    for entry in &stored.unreadable {
        tracing::warn!("skipping unreadable stored order: {}", entry.reason);
    }
}

/// Sync mode: reconcile and upsert every new or changed order.
pub fn sync<F, S>(
    feed: &F,
    store: &mut S,
    schema: &FieldSchema,
    status: StatusFilter,
    dry_run: bool,
) -> Result<ReconciliationReport, SyncError>
where
    F: SourceFeed + ?Sized,
    S: OrderStore + ?Sized,
{
    let fetched = feed.fetch_snapshot(status)?;
    let stored = store.find_all()?;
    tracing::info!(
        "sync pass: {} fetched, {} stored, {} unreadable (status={status})",
        fetched.len(),
        stored.records.len(),
        stored.unreadable.len()
    );
    warn_about_stored_set(&fetched, &stored);

    let plan = reconcile::plan(&fetched, stored, schema);
    let report = reconcile::apply(plan, store, dry_run);
    tracing::info!(
        "sync pass done: {} new, {} updated, {} unchanged, {} archived, {} failed",
        report.new.len(),
        report.updated.len(),
        report.unchanged.len(),
        report.archived.len(),
        report.failed.len()
    );
    Ok(report)
}

/// Report mode: the same classification, no writes.
pub fn compare<F, S>(
    feed: &F,
    store: &S,
    schema: &FieldSchema,
    status: StatusFilter,
) -> Result<ComparisonReport, SyncError>
where
    F: SourceFeed + ?Sized,
    S: OrderStore + ?Sized,
{
    let fetched = feed.fetch_snapshot(status)?;
    let stored = store.find_all()?;
    warn_about_stored_set(&fetched, &stored);
    Ok(reconcile::plan(&fetched, stored, schema).comparison())
}

/// Insert-only mode: store orders whose id is not yet known, skip the rest.
pub fn ingest<F, S>(feed: &F, store: &mut S, status: StatusFilter) -> Result<IngestReport, SyncError>
where
    F: SourceFeed + ?Sized,
    S: OrderStore + ?Sized,
{
    let fetched = feed.fetch_snapshot(status)?;
    let mut report = IngestReport::default();

    for record in &fetched {
        let label = order_label(record);
        let Some(id) = OrderId::of(record) else {
            report
                .failed
                .push(RecordFailure::new(None, label, "missing or non-integer `id`"));
            continue;
        };
        let entry = RecordRef::new(id, label);
        let outcome = match store.find_by_id(id) {
            Ok(Some(_)) => {
                tracing::debug!("order {id} already stored; skipping");
                report.skipped.push(entry);
                continue;
            }
            Ok(None) => store.upsert_by_id(id, record),
            Err(err) => Err(err),
        };
        match outcome {
            Ok(_) => report.inserted.push(entry),
            Err(err) => {
                tracing::warn!("ingest of order {id} failed: {err}");
                report
                    .failed
                    .push(RecordFailure::new(Some(id), entry.label, err.to_string()));
            }
        }
    }

    tracing::info!(
        "ingest done: {} inserted, {} skipped, {} failed",
        report.inserted.len(),
        report.skipped.len(),
        report.failed.len()
    );
    Ok(report)
}

/// Map every stored order without a shipment and insert the results in one
/// batch.
pub fn ship_orders<O, H>(orders: &O, shipments: &mut H) -> Result<ShipmentReport, SyncError>
where
    O: OrderStore + ?Sized,
    H: ShipmentStore + ?Sized,
{
    let mut report = ShipmentReport::default();
    let mut batch: Vec<Shipment> = Vec::new();
    let stored = orders.find_all()?;

    for entry in stored.unreadable {
        tracing::warn!("skipping unreadable stored order: {}", entry.reason);
        if let Some(id) = entry.id {
            report.failed.push(ShipmentIssue {
                id,
                label: String::new(),
                details: vec![entry.reason],
            });
        }
    }

    for record in stored.records {
        let key = shipment_key(&record.order);
        let already_batched = batch.iter().any(|s| s.order == key);
        if already_batched || shipments.find_by_order(&key)?.is_some() {
            report.skipped.push(record.to_ref());
            continue;
        }
        let issue = |details| ShipmentIssue {
            id: record.id,
            label: record.label(),
            details,
        };
        match map_order(&record.order) {
            MappingOutcome::Mapped(shipment) => batch.push(shipment),
            MappingOutcome::Warning { shipment, details } => {
                batch.push(shipment);
                report.warnings.push(issue(details));
            }
            MappingOutcome::Failed { details } => {
                tracing::warn!("order {} cannot be shipped: {}", record.id, details.join("; "));
                report.failed.push(issue(details));
            }
        }
    }

    report.saved = batch.iter().map(|s| s.order.clone()).collect();
    let saved = shipments.insert_many(batch)?;
    tracing::info!(
        "ship done: {saved} saved, {} skipped, {} failed, {} with warnings",
        report.skipped.len(),
        report.failed.len(),
        report.warnings.len()
    );
    Ok(report)
}

/// Record the outcome of an applied sync pass in `state.json`. Dry runs are
/// not recorded.
pub fn record_pass(
    home: &Path,
    status: StatusFilter,
    report: &ReconciliationReport,
) -> Result<(), SyncError> {
    if report.dry_run {
        return Ok(());
    }
    state::save_at(
        home,
        &SyncState {
            synced_at: Utc::now(),
            status,
            counts: report.counts(),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use ordersync_core::{FeedError, MemoryOrderStore, MemoryShipmentStore};
    use serde_json::{json, Value};
    use tempfile::TempDir;

    struct DownFeed;

    impl SourceFeed for DownFeed {
        fn fetch_snapshot(&self, _status: StatusFilter) -> Result<Vec<Value>, FeedError> {
            Err(FeedError::Http {
                status: 503,
                body: "maintenance".into(),
            })
        }
    }

    fn schema() -> FieldSchema {
        FieldSchema::new().scalar("id").scalar("name").scalar("note")
    }

    fn shippable(id: u64, name: &str) -> Value {
        json!({
            "id": id,
            "name": name,
            "phone": "1",
            "customer": {"id": 1},
            "shipping_address": {"name": "A", "address1": "B", "zip": "1"},
            "line_items": [{"title": "T", "grams": 100, "quantity": 1}],
        })
    }

    #[test]
    fn feed_failure_aborts_before_any_write() {
        let mut store = MemoryOrderStore::with_orders([json!({"id": 1})]).unwrap();
        let err = sync(&DownFeed, &mut store, &schema(), StatusFilter::Open, false).unwrap_err();
        assert!(matches!(err, SyncError::Feed(FeedError::Http { status: 503, .. })));
        assert_eq!(store.upsert_count(), 0);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn sync_then_resync_is_unchanged() {
        let feed = vec![json!({"id": 1, "name": "#1"}), json!({"id": 2, "name": "#2"})];
        let mut store = MemoryOrderStore::new();
        let first = sync(&feed, &mut store, &schema(), StatusFilter::Open, false).unwrap();
        assert_eq!(first.new.len(), 2);

        let second = sync(&feed, &mut store, &schema(), StatusFilter::Open, false).unwrap();
        assert_eq!(second.unchanged.len(), 2);
        assert_eq!(store.upsert_count(), 2);
    }

    #[test]
    fn empty_snapshot_archives_everything() {
        let feed: Vec<Value> = vec![];
        let mut store = MemoryOrderStore::with_orders([json!({"id": 1}), json!({"id": 2})]).unwrap();
        let report = sync(&feed, &mut store, &schema(), StatusFilter::Open, false).unwrap();
        assert_eq!(report.archived.len(), 2);
        assert_eq!(store.len(), 2, "archived orders are never deleted");
    }

    #[test]
    fn compare_never_writes() {
        let feed = vec![json!({"id": 1, "note": "new"})];
        let store = MemoryOrderStore::with_orders([json!({"id": 1, "note": "old"})]).unwrap();
        let report = compare(&feed, &store, &schema(), StatusFilter::Open).unwrap();
        assert_eq!(report.comparison_data.len(), 1);
        assert_eq!(store.upsert_count(), 0);
    }

    #[test]
    fn ingest_inserts_only_unknown_ids() {
        let feed = vec![
            json!({"id": 1, "name": "#1", "note": "changed"}),
            json!({"id": 2, "name": "#2"}),
            json!({"name": "#nameless"}),
        ];
        let mut store = MemoryOrderStore::with_orders([json!({"id": 1, "name": "#1"})]).unwrap();
        let report = ingest(&feed, &mut store, StatusFilter::Open).unwrap();
        assert_eq!(report.inserted, vec![RecordRef::new(OrderId(2), "#2")]);
        assert_eq!(report.skipped, vec![RecordRef::new(OrderId(1), "#1")]);
        assert_eq!(report.failed.len(), 1);
        let kept = store.find_by_id(OrderId(1)).unwrap().unwrap();
        assert!(kept.order.get("note").is_none(), "existing orders are not replaced");
    }

    #[test]
    fn ship_skips_existing_and_reports_failures() {
        let orders = MemoryOrderStore::with_orders([
            shippable(1, "#1"),
            shippable(2, "#2"),
            json!({"id": 3, "name": "#3"}),
        ])
        .unwrap();
        let mut shipments = MemoryShipmentStore::default();
        let first = ship_orders(&orders, &mut shipments).unwrap();
        assert_eq!(first.saved, vec!["#1".to_string(), "#2".to_string()]);
        assert_eq!(first.failed.len(), 1);
        assert_eq!(first.failed[0].id, OrderId(3));

        let second = ship_orders(&orders, &mut shipments).unwrap();
        assert!(second.saved.is_empty());
        assert_eq!(second.skipped.len(), 2);
        assert_eq!(shipments.shipments.len(), 2);
    }

    #[test]
    fn duplicate_order_names_ship_once() {
        let orders =
            MemoryOrderStore::with_orders([shippable(1, "#1"), shippable(2, "#1")]).unwrap();
        let mut shipments = MemoryShipmentStore::default();
        let report = ship_orders(&orders, &mut shipments).unwrap();
        assert_eq!(report.saved.len(), 1);
        assert_eq!(report.skipped, vec![RecordRef::new(OrderId(2), "#1")]);
    }

    #[test]
    fn ship_reports_unreadable_orders_and_ships_the_rest() {
        let home = TempDir::new().unwrap();
        let mut orders = ordersync_core::FileOrderStore::open_at(home.path());
        orders.upsert_by_id(OrderId(1), &shippable(1, "#1")).unwrap();
        std::fs::write(orders.record_path(OrderId(2)), "{").unwrap();

        let mut shipments = MemoryShipmentStore::default();
        let report = ship_orders(&orders, &mut shipments).unwrap();
        assert_eq!(report.saved, vec!["#1".to_string()]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].id, OrderId(2));
    }

    #[test]
    fn record_pass_skips_dry_runs() {
        let home = TempDir::new().unwrap();
        let mut report = ReconciliationReport {
            dry_run: true,
            ..ReconciliationReport::default()
        };
        record_pass(home.path(), StatusFilter::Open, &report).unwrap();
        assert!(state::load_at(home.path()).unwrap().is_none());

        report.dry_run = false;
        report.new.push(RecordRef::new(OrderId(1), "#1"));
        record_pass(home.path(), StatusFilter::Open, &report).unwrap();
        let saved = state::load_at(home.path()).unwrap().unwrap();
        assert_eq!(saved.counts.new, 1);
    }
}
