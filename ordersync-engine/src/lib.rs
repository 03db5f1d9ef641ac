//! # ordersync-engine
//!
//! Reconciliation of a fetched order snapshot against the stored mirror.
//!
//! The leaf passes are [`normalize`] (canonical instants), [`equality`]
//! (order-insensitive structural comparison) and [`differ`] (schema-scoped
//! field diffs). [`reconcile`] classifies a snapshot as new / updated /
//! unchanged / archived and applies the resulting upserts; [`pipeline`] wires
//! those phases to a [`SourceFeed`](ordersync_core::SourceFeed) and an
//! [`OrderStore`](ordersync_core::OrderStore).

pub mod differ;
pub mod equality;
pub mod error;
pub mod normalize;
pub mod pipeline;
pub mod reconcile;
pub mod shipment;
pub mod state;

pub use differ::{changed_paths_in, diff_records, Diff, DiffEntry};
pub use equality::structurally_equal;
pub use error::SyncError;
pub use normalize::{normalize_timestamps, normalized, NormalizeError};
pub use pipeline::IngestReport;
pub use reconcile::{
    apply, plan, ComparisonDiff, ComparisonEntry, ComparisonReport, Decision, Plan,
    PlannedRecord, ReconciliationReport, RecordFailure,
};
pub use shipment::{map_order, MappingOutcome, ShipmentIssue, ShipmentReport};
pub use state::{SyncCounts, SyncState};
