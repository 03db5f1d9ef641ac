//! Snapshot reconciliation.
//!
//! ## Two phases
//!
//! 1. [`plan`]: pure. Indexes the stored set by id, classifies every fetched
//!    record as new / updated / unchanged, and collects stored ids the
//!    snapshot no longer contains as archived. Equivalence is the emptiness of
//!    the schema-scoped diff between normalized copies. A stored record that
//!    could not be read fails on its own and is never overwritten or archived.
//! 2. [`apply`]: issues the pending upserts one by one. A store error on a
//!    single record moves it to `failed`; the pass continues.
//!
//! Report mode reads the plan through [`Plan::comparison`] and never writes.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use ordersync_core::types::order_label;
use ordersync_core::{FieldSchema, OrderId, OrderStore, RecordRef, StoredRecord, StoredSet};

use crate::differ::{diff_records, Diff};
use crate::normalize::normalized;
use crate::state::SyncCounts;

/// Report-mode marker for a record absent from the store.
pub const NEW_ORDER_MARKER: &str = "New Order";
/// Report-mode marker for a stored record absent from the snapshot.
pub const ARCHIVED_MARKER: &str = "Order archived or no longer in API response";

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

/// Classification of one fetched record.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    New,
    Updated { diff: Diff },
    Unchanged,
}

/// A fetched record together with its decision.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedRecord {
    pub id: OrderId,
    pub label: String,
    pub decision: Decision,
    /// The record exactly as fetched; this is what gets persisted.
    pub record: Value,
}

/// A record that could not be processed. The rest of the pass is unaffected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFailure {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<OrderId>,
    pub label: String,
    pub reason: String,
}

impl RecordFailure {
    pub fn new(id: Option<OrderId>, label: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            id,
            label: label.into(),
            reason: reason.into(),
        }
    }
}

/// Output of the decision phase.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Plan {
    /// Valid fetched records, in snapshot order.
    pub records: Vec<PlannedRecord>,
    /// Stored records absent from the snapshot, ascending by id.
    pub archived: Vec<RecordRef>,
    pub failed: Vec<RecordFailure>,
}

impl Plan {
    /// Number of upserts [`apply`] would issue.
    pub fn pending_upserts(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.decision != Decision::Unchanged)
            .count()
    }

    /// Report-mode view: updated records with their diff, new records and
    /// archived records with a marker. Unchanged records are omitted.
    pub fn comparison(&self) -> ComparisonReport {
        let mut comparison_data = Vec::new();
        for planned in &self.records {
            let diff = match &planned.decision {
                Decision::Unchanged => continue,
                Decision::New => ComparisonDiff::Marker(NEW_ORDER_MARKER),
                Decision::Updated { diff } => ComparisonDiff::Fields(diff.clone()),
            };
            comparison_data.push(ComparisonEntry {
                id: planned.id,
                label: planned.label.clone(),
                diff,
            });
        }
        comparison_data.extend(self.archived.iter().map(|r| ComparisonEntry {
            id: r.id,
            label: r.label.clone(),
            diff: ComparisonDiff::Marker(ARCHIVED_MARKER),
        }));
        ComparisonReport {
            comparison_data,
            failed: self.failed.clone(),
        }
    }
}

/// Classify `fetched` against `stored` under `schema`. Performs no I/O.
pub fn plan(fetched: &[Value], stored: StoredSet, schema: &FieldSchema) -> Plan {
    let index: BTreeMap<OrderId, StoredRecord> =
        stored.records.into_iter().map(|r| (r.id, r)).collect();
    let mut seen = BTreeSet::new();
    let mut out = Plan::default();

    let mut unreadable = BTreeMap::new();
    for entry in stored.unreadable {
        match entry.id {
            Some(id) => {
                unreadable.insert(id, entry.reason);
            }
            None => out.failed.push(RecordFailure::new(None, "", entry.reason)),
        }
    }

    for (position, record) in fetched.iter().enumerate() {
        let label = order_label(record);
        if !record.is_object() {
            out.failed.push(RecordFailure::new(
                None,
                label,
                format!("snapshot entry {position} is not a JSON object"),
            ));
            continue;
        }
        let Some(id) = OrderId::of(record) else {
            out.failed.push(RecordFailure::new(
                None,
                label,
                format!("snapshot entry {position} has no integer `id`"),
            ));
            continue;
        };
        if !seen.insert(id) {
            out.failed.push(RecordFailure::new(
                Some(id),
                label,
                "duplicate id in snapshot",
            ));
            continue;
        }
        if let Some(reason) = unreadable.remove(&id) {
            out.failed.push(RecordFailure::new(
                Some(id),
                label,
                format!("stored copy unreadable: {reason}"),
            ));
            continue;
        }

        let decision = match index.get(&id) {
            None => Decision::New,
            Some(existing) => {
                let diff = diff_records(
                    &normalized(record),
                    &normalized(&existing.comparable()),
                    schema,
                );
                if diff.is_empty() {
                    Decision::Unchanged
                } else {
                    Decision::Updated { diff }
                }
            }
        };
        tracing::debug!("order {id} ({label}): {decision:?}");
        out.records.push(PlannedRecord {
            id,
            label,
            decision,
            record: record.clone(),
        });
    }

    out.archived = index
        .into_values()
        .filter(|r| !seen.contains(&r.id))
        .map(|r| r.to_ref())
        .collect();
    out.failed.extend(unreadable.into_iter().map(|(id, reason)| {
        RecordFailure::new(Some(id), "", format!("stored copy unreadable: {reason}"))
    }));
    out
}

// ---------------------------------------------------------------------------
// Apply
// ---------------------------------------------------------------------------

/// Summary of one sync-mode pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub new: Vec<RecordRef>,
    pub updated: Vec<RecordRef>,
    pub unchanged: Vec<RecordRef>,
    pub archived: Vec<RecordRef>,
    pub failed: Vec<RecordFailure>,
    pub dry_run: bool,
}

impl ReconciliationReport {
    pub fn counts(&self) -> SyncCounts {
        SyncCounts {
            new: self.new.len(),
            updated: self.updated.len(),
            unchanged: self.unchanged.len(),
            archived: self.archived.len(),
            failed: self.failed.len(),
        }
    }
}

/// Issue the plan's upserts against `store`, sequentially.
///
/// With `dry_run` nothing is written and the report shows what would be.
pub fn apply<S>(plan: Plan, store: &mut S, dry_run: bool) -> ReconciliationReport
where
    S: OrderStore + ?Sized,
{
    let mut report = ReconciliationReport {
        archived: plan.archived,
        failed: plan.failed,
        dry_run,
        ..ReconciliationReport::default()
    };

    for planned in plan.records {
        let entry = RecordRef::new(planned.id, planned.label);
        let is_new = match planned.decision {
            Decision::Unchanged => {
                report.unchanged.push(entry);
                continue;
            }
            Decision::New => true,
            Decision::Updated { .. } => false,
        };

        if dry_run {
            tracing::info!("[dry-run] would upsert order {}", entry.id);
        } else if let Err(err) = store.upsert_by_id(entry.id, &planned.record) {
            tracing::warn!("upsert of order {} failed: {err}", entry.id);
            report
                .failed
                .push(RecordFailure::new(Some(entry.id), entry.label, err.to_string()));
            continue;
        }

        if is_new {
            report.new.push(entry);
        } else {
            report.updated.push(entry);
        }
    }

    for archived in &report.archived {
        tracing::info!("order {} no longer in snapshot", archived.id);
    }
    report
}

// ---------------------------------------------------------------------------
// Report mode
// ---------------------------------------------------------------------------

/// Either a field diff or one of the fixed markers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ComparisonDiff {
    Fields(Diff),
    Marker(&'static str),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonEntry {
    pub id: OrderId,
    pub label: String,
    pub diff: ComparisonDiff,
}

/// Serializes as `{"comparisonData": [...], "failed": [...]}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ComparisonReport {
    #[serde(rename = "comparisonData")]
    pub comparison_data: Vec<ComparisonEntry>,
    pub failed: Vec<RecordFailure>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ordersync_core::{MemoryOrderStore, StoreError, UnreadableRecord};
    use serde_json::json;

    fn schema() -> FieldSchema {
        FieldSchema::new()
            .scalar("id")
            .scalar("name")
            .scalar("total_price")
            .scalar("updated_at")
    }

    fn stored(order: Value) -> StoredRecord {
        StoredRecord {
            key: "k".into(),
            version: 0,
            id: OrderId::of(&order).unwrap(),
            stored_at: Utc::now(),
            order,
        }
    }

    /// Store whose upserts fail for one id.
    struct FailingStore {
        inner: MemoryOrderStore,
        fail_on: OrderId,
    }

    impl OrderStore for FailingStore {
        fn find_all(&self) -> Result<StoredSet, StoreError> {
            self.inner.find_all()
        }
        fn find_by_id(&self, id: OrderId) -> Result<Option<StoredRecord>, StoreError> {
            self.inner.find_by_id(id)
        }
        fn upsert_by_id(&mut self, id: OrderId, order: &Value) -> Result<StoredRecord, StoreError> {
            if id == self.fail_on {
                return Err(StoreError::InvalidRecord {
                    reason: "disk full".into(),
                });
            }
            self.inner.upsert_by_id(id, order)
        }
    }

    #[test]
    fn classifies_new_updated_unchanged_archived() {
        let fetched = vec![
            json!({"id": 1, "name": "#1", "total_price": "10.00"}),
            json!({"id": 2, "name": "#2", "total_price": "25.00"}),
            json!({"id": 4, "name": "#4"}),
        ];
        let existing = vec![
            stored(json!({"id": 1, "name": "#1", "total_price": "10.00"})),
            stored(json!({"id": 2, "name": "#2", "total_price": "20.00"})),
            stored(json!({"id": 3, "name": "#3"})),
        ];
        let plan = plan(&fetched, existing.into(), &schema());

        let decisions: Vec<_> = plan.records.iter().map(|r| (r.id.0, &r.decision)).collect();
        assert!(matches!(decisions[0], (1, Decision::Unchanged)));
        assert!(matches!(decisions[1], (2, Decision::Updated { .. })));
        assert!(matches!(decisions[2], (4, Decision::New)));
        assert_eq!(plan.archived, vec![RecordRef::new(OrderId(3), "#3")]);
        assert_eq!(plan.pending_upserts(), 2);
    }

    #[test]
    fn equivalent_timestamps_in_other_offsets_are_unchanged() {
        let fetched = vec![json!({"id": 1, "updated_at": "2024-01-01T15:30:00+05:30"})];
        let existing = vec![stored(json!({"id": 1, "updated_at": "2024-01-01T10:00:00.000Z"}))];
        let plan = plan(&fetched, existing.into(), &schema());
        assert_eq!(plan.records[0].decision, Decision::Unchanged);
    }

    #[test]
    fn invalid_and_duplicate_records_fail_individually() {
        let fetched = vec![
            json!("not an order"),
            json!({"name": "#x"}),
            json!({"id": 5, "name": "#5"}),
            json!({"id": 5, "name": "#5 again"}),
        ];
        let plan = plan(&fetched, StoredSet::default(), &schema());
        assert_eq!(plan.records.len(), 1);
        assert_eq!(plan.failed.len(), 3);
        assert_eq!(plan.failed[1].label, "#x");
        assert_eq!(plan.failed[2].id, Some(OrderId(5)));
    }

    #[test]
    fn unreadable_stored_copy_is_neither_new_nor_archived() {
        let fetched = vec![json!({"id": 1, "name": "#1"}), json!({"id": 2, "name": "#2"})];
        let existing = StoredSet {
            records: vec![stored(json!({"id": 1, "name": "#1"}))],
            unreadable: vec![
                UnreadableRecord {
                    id: Some(OrderId(2)),
                    reason: "2.json: EOF".into(),
                },
                UnreadableRecord {
                    id: Some(OrderId(7)),
                    reason: "7.json: EOF".into(),
                },
            ],
        };
        let plan = plan(&fetched, existing, &schema());

        assert_eq!(plan.records.len(), 1);
        assert_eq!(plan.records[0].decision, Decision::Unchanged);
        assert!(plan.archived.is_empty());
        assert_eq!(plan.pending_upserts(), 0);
        let failed: Vec<_> = plan.failed.iter().map(|f| (f.id, f.label.as_str())).collect();
        assert_eq!(failed, [(Some(OrderId(2)), "#2"), (Some(OrderId(7)), "")]);
        assert!(plan.failed[0].reason.contains("stored copy unreadable"));
    }

    #[test]
    fn apply_persists_raw_record_not_normalized_copy() {
        let raw = json!({"id": 1, "updated_at": "2024-01-01T15:30:00+05:30"});
        let plan = plan(std::slice::from_ref(&raw), StoredSet::default(), &schema());
        let mut store = MemoryOrderStore::new();
        let report = apply(plan, &mut store, false);

        assert_eq!(report.new, vec![RecordRef::new(OrderId(1), "")]);
        assert_eq!(store.find_by_id(OrderId(1)).unwrap().unwrap().order, raw);
    }

    #[test]
    fn dry_run_writes_nothing_but_reports_the_same() {
        let fetched = vec![json!({"id": 1, "name": "#1"})];
        let mut store = MemoryOrderStore::new();
        let report = apply(plan(&fetched, StoredSet::default(), &schema()), &mut store, true);
        assert!(report.dry_run);
        assert_eq!(report.new.len(), 1);
        assert_eq!(store.upsert_count(), 0);
    }

    #[test]
    fn upsert_failure_is_isolated() {
        let fetched = vec![json!({"id": 1, "name": "#1"}), json!({"id": 2, "name": "#2"})];
        let mut store = FailingStore {
            inner: MemoryOrderStore::new(),
            fail_on: OrderId(1),
        };
        let report = apply(plan(&fetched, StoredSet::default(), &schema()), &mut store, false);
        assert_eq!(report.new, vec![RecordRef::new(OrderId(2), "#2")]);
        assert_eq!(report.failed.len(), 1);
        assert!(report.failed[0].reason.contains("disk full"));
        assert_eq!(report.counts().failed, 1);
    }

    #[test]
    fn comparison_lists_diffs_then_markers() {
        let fetched = vec![
            json!({"id": 2, "name": "#2", "total_price": "25.00"}),
            json!({"id": 9, "name": "#9"}),
            json!({"id": 1, "name": "#1"}),
        ];
        let existing = vec![
            stored(json!({"id": 1, "name": "#1"})),
            stored(json!({"id": 2, "name": "#2", "total_price": "20.00"})),
            stored(json!({"id": 3, "name": "#3"})),
        ];
        let report = plan(&fetched, existing.into(), &schema()).comparison();
        assert_eq!(
            serde_json::to_value(&report).unwrap(),
            json!({
                "comparisonData": [
                    {"id": 2, "label": "#2", "diff": {"total_price": {"oldValue": "20.00", "newValue": "25.00"}}},
                    {"id": 9, "label": "#9", "diff": "New Order"},
                    {"id": 3, "label": "#3", "diff": "Order archived or no longer in API response"},
                ],
                "failed": [],
            })
        );
    }

    #[test]
    fn report_json_shape() {
        let report = ReconciliationReport {
            new: vec![RecordRef::new(OrderId(1), "#1")],
            failed: vec![RecordFailure::new(None, "", "no id")],
            ..ReconciliationReport::default()
        };
        assert_eq!(
            serde_json::to_value(&report).unwrap(),
            json!({
                "new": [{"id": 1, "label": "#1"}],
                "updated": [],
                "unchanged": [],
                "archived": [],
                "failed": [{"label": "", "reason": "no id"}],
                "dry_run": false,
            })
        );
    }
}
