//! Domain types for orders and their persisted mirror.
//!
//! Orders themselves stay dynamically shaped (`serde_json::Value`); only the
//! identifier and the storage envelope are strongly typed.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Keys a document store adds to a persisted body. Never compared.
pub const STORAGE_METADATA_KEYS: [&str; 2] = ["_id", "__v"];

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// The platform's stable integer order identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub u64);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<u64> for OrderId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl OrderId {
    /// Read the `id` field of an order body. Only non-negative integers qualify.
    pub fn of(order: &Value) -> Option<Self> {
        order.get("id").and_then(Value::as_u64).map(Self)
    }
}

/// Human-readable label of an order (its `name`, e.g. `"#1001"`).
pub fn order_label(order: &Value) -> String {
    order
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned()
}

// ---------------------------------------------------------------------------
// Report references
// ---------------------------------------------------------------------------

/// An order as it appears in a classification list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordRef {
    pub id: OrderId,
    pub label: String,
}

impl RecordRef {
    pub fn new(id: OrderId, label: impl Into<String>) -> Self {
        Self {
            id,
            label: label.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Stored record
// ---------------------------------------------------------------------------

/// Persisted counterpart of a fetched order.
///
/// `key`, `version` and `stored_at` are storage-only metadata; only `order`
/// takes part in comparison, and then via [`StoredRecord::comparable`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    /// Internal surrogate key, assigned on first insert.
    pub key: String,
    /// Incremented on every replace; 0 after insert.
    pub version: u64,
    pub id: OrderId,
    pub stored_at: DateTime<Utc>,
    /// The order exactly as the source delivered it.
    pub order: Value,
}

impl StoredRecord {
    pub fn label(&self) -> String {
        order_label(&self.order)
    }

    pub fn to_ref(&self) -> RecordRef {
        RecordRef::new(self.id, self.label())
    }

    /// Copy of the order body with any document-store metadata keys removed.
    pub fn comparable(&self) -> Value {
        let mut body = self.order.clone();
        if let Value::Object(map) = &mut body {
            for key in STORAGE_METADATA_KEYS {
                map.remove(key);
            }
        }
        body
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
