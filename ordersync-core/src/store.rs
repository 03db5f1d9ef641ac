//! Order persistence.
//!
//! # Storage layout
//!
//! ```text
//! ~/.ordersync/orders/
//!   <id>.json     ({key, version, id, stored_at, order}: mode 0600)
//! ```
//!
//! Writes serialize to a `.json.tmp` sibling and rename over the target, so a
//! reader never observes a half-written record.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use crate::error::{io_err, json_err, StoreError};
use crate::paths::{self, set_dir_permissions, set_file_permissions};
use crate::types::{OrderId, StoredRecord};

/// Persistence seam used by the reconciliation engine.
///
/// `upsert_by_id` has insert-or-replace semantics: the stored body is always
/// the full given order, never a partial patch.
pub trait OrderStore {
    /// Every stored order. A record that cannot be read lands in
    /// [`StoredSet::unreadable`]; only a failure to list the store is an error.
    fn find_all(&self) -> Result<StoredSet, StoreError>;
    fn find_by_id(&self, id: OrderId) -> Result<Option<StoredRecord>, StoreError>;
    fn upsert_by_id(&mut self, id: OrderId, order: &Value) -> Result<StoredRecord, StoreError>;
}

/// The stored set as loaded at the start of a pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoredSet {
    pub records: Vec<StoredRecord>,
    pub unreadable: Vec<UnreadableRecord>,
}

/// A persisted order whose document could not be read or parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnreadableRecord {
    /// Taken from the file name; `None` when that is not an order id.
    pub id: Option<OrderId>,
    pub reason: String,
}

impl StoredSet {
    pub fn len(&self) -> usize {
        self.records.len() + self.unreadable.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty() && self.unreadable.is_empty()
    }
}

impl From<Vec<StoredRecord>> for StoredSet {
    fn from(records: Vec<StoredRecord>) -> Self {
        Self {
            records,
            unreadable: Vec::new(),
        }
    }
}

/// Build the record that replaces `existing` (or is inserted fresh).
fn next_record(
    existing: Option<StoredRecord>,
    id: OrderId,
    order: &Value,
) -> Result<StoredRecord, StoreError> {
    if !order.is_object() {
        return Err(StoreError::InvalidRecord {
            reason: format!("order {id} is not a JSON object"),
        });
    }
    match OrderId::of(order) {
        Some(body_id) if body_id == id => {}
        Some(body_id) => {
            return Err(StoreError::InvalidRecord {
                reason: format!("order body id {body_id} does not match key {id}"),
            })
        }
        None => {
            return Err(StoreError::InvalidRecord {
                reason: format!("order {id} has no integer `id` field"),
            })
        }
    }

    let (key, version) = match existing {
        Some(prev) => (prev.key, prev.version + 1),
        None => (Uuid::new_v4().simple().to_string(), 0),
    };
    Ok(StoredRecord {
        key,
        version,
        id,
        stored_at: Utc::now(),
        order: order.clone(),
    })
}

// ---------------------------------------------------------------------------
// File store
// ---------------------------------------------------------------------------

/// One JSON document per order under `<home>/.ordersync/orders/`.
#[derive(Debug, Clone)]
pub struct FileOrderStore {
    dir: PathBuf,
}

impl FileOrderStore {
    /// Store rooted at an explicit home; used by tests with `TempDir`.
    pub fn open_at(home: &Path) -> Self {
        Self {
            dir: paths::orders_dir(home),
        }
    }

    /// Store rooted at `dirs::home_dir()`.
    pub fn open() -> Result<Self, StoreError> {
        let home = dirs::home_dir().ok_or(StoreError::HomeNotFound)?;
        Ok(Self::open_at(&home))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `<dir>/<id>.json`: pure, no I/O.
    pub fn record_path(&self, id: OrderId) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    fn ensure_dir(&self) -> Result<(), StoreError> {
        if !self.dir.exists() {
            std::fs::create_dir_all(&self.dir).map_err(|e| io_err(&self.dir, e))?;
            set_dir_permissions(&self.dir).map_err(|e| io_err(&self.dir, e))?;
        }
        Ok(())
    }

    fn read_record(path: &Path) -> Result<StoredRecord, StoreError> {
        let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
        serde_json::from_str(&contents).map_err(|e| json_err(path, e))
    }

    fn write_record(&self, record: &StoredRecord) -> Result<(), StoreError> {
        self.ensure_dir()?;
        let path = self.record_path(record.id);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(record).map_err(|e| json_err(&path, e))?;
        std::fs::write(&tmp, json).map_err(|e| io_err(&tmp, e))?;
        set_file_permissions(&tmp).map_err(|e| io_err(&tmp, e))?;
        if let Err(e) = std::fs::rename(&tmp, &path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(io_err(&path, e));
        }
        Ok(())
    }
}

/// `<dir>/1001.json` → `OrderId(1001)`.
fn id_from_file_name(path: &Path) -> Option<OrderId> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .and_then(|stem| stem.parse().ok())
        .map(OrderId)
}

impl OrderStore for FileOrderStore {
    /// All stored orders, sorted by id. Leftover `.tmp` files are ignored.
    fn find_all(&self) -> Result<StoredSet, StoreError> {
        let mut set = StoredSet::default();
        if !self.dir.exists() {
            return Ok(set);
        }
        for entry in std::fs::read_dir(&self.dir).map_err(|e| io_err(&self.dir, e))? {
            let entry = entry.map_err(|e| io_err(&self.dir, e))?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            match Self::read_record(&path) {
                Ok(record) => set.records.push(record),
                Err(err) => set.unreadable.push(UnreadableRecord {
                    id: id_from_file_name(&path),
                    reason: err.to_string(),
                }),
            }
        }
        set.records.sort_by_key(|r| r.id);
        set.unreadable.sort_by_key(|u| u.id);
        Ok(set)
    }

    fn find_by_id(&self, id: OrderId) -> Result<Option<StoredRecord>, StoreError> {
        let path = self.record_path(id);
        if !path.exists() {
            return Ok(None);
        }
        Self::read_record(&path).map(Some)
    }

    fn upsert_by_id(&mut self, id: OrderId, order: &Value) -> Result<StoredRecord, StoreError> {
        let existing = self.find_by_id(id)?;
        let record = next_record(existing, id, order)?;
        self.write_record(&record)?;
        Ok(record)
    }
}

// ---------------------------------------------------------------------------
// Memory store
// ---------------------------------------------------------------------------

/// In-process store keyed by id.
#[derive(Debug, Clone, Default)]
pub struct MemoryOrderStore {
    records: BTreeMap<OrderId, StoredRecord>,
    upserts: usize,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with order bodies, bypassing the upsert counter.
    pub fn with_orders(orders: impl IntoIterator<Item = Value>) -> Result<Self, StoreError> {
        let mut store = Self::new();
        for order in orders {
            let id = OrderId::of(&order).ok_or_else(|| StoreError::InvalidRecord {
                reason: "seed order has no integer `id` field".to_string(),
            })?;
            let record = next_record(None, id, &order)?;
            store.records.insert(id, record);
        }
        Ok(store)
    }

    /// Number of `upsert_by_id` calls that succeeded.
    pub fn upsert_count(&self) -> usize {
        self.upserts
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl OrderStore for MemoryOrderStore {
    fn find_all(&self) -> Result<StoredSet, StoreError> {
        Ok(self.records.values().cloned().collect::<Vec<_>>().into())
    }

    fn find_by_id(&self, id: OrderId) -> Result<Option<StoredRecord>, StoreError> {
        Ok(self.records.get(&id).cloned())
    }

    fn upsert_by_id(&mut self, id: OrderId, order: &Value) -> Result<StoredRecord, StoreError> {
        let record = next_record(self.records.get(&id).cloned(), id, order)?;
        self.records.insert(id, record.clone());
        self.upserts += 1;
        Ok(record)
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn record_path_is_correct() {
        let home = TempDir::new().expect("tempdir");
        let store = FileOrderStore::open_at(home.path());
        assert!(store
            .record_path(OrderId(1001))
            .ends_with(".ordersync/orders/1001.json"));
    }

    #[test]
    fn find_all_empty_when_dir_missing() {
        let home = TempDir::new().expect("tempdir");
        let store = FileOrderStore::open_at(home.path());
        assert!(store.find_all().expect("find_all").is_empty());
    }

    #[test]
    fn insert_then_replace_keeps_key_and_bumps_version() {
        let home = TempDir::new().expect("tempdir");
        let mut store = FileOrderStore::open_at(home.path());

        let first = store
            .upsert_by_id(OrderId(1), &json!({"id": 1, "total_price": "10.00"}))
            .expect("insert");
        assert_eq!(first.version, 0);

        let second = store
            .upsert_by_id(OrderId(1), &json!({"id": 1, "total_price": "12.00"}))
            .expect("replace");
        assert_eq!(second.key, first.key);
        assert_eq!(second.version, 1);

        let loaded = store.find_by_id(OrderId(1)).expect("find").expect("present");
        assert_eq!(loaded.order, json!({"id": 1, "total_price": "12.00"}));
    }

    #[test]
    fn replace_is_whole_document_not_patch() {
        let mut store = MemoryOrderStore::new();
        store
            .upsert_by_id(OrderId(5), &json!({"id": 5, "note": "gift", "tags": "vip"}))
            .unwrap();
        store
            .upsert_by_id(OrderId(5), &json!({"id": 5, "tags": "vip"}))
            .unwrap();
        let rec = store.find_by_id(OrderId(5)).unwrap().unwrap();
        assert!(rec.order.get("note").is_none());
    }

    #[test]
    fn mismatched_body_id_is_rejected() {
        let mut store = MemoryOrderStore::new();
        let err = store
            .upsert_by_id(OrderId(1), &json!({"id": 2}))
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidRecord { .. }));
        assert_eq!(store.upsert_count(), 0);
    }

    #[test]
    fn find_all_sorted_and_ignores_tmp_files() {
        let home = TempDir::new().expect("tempdir");
        let mut store = FileOrderStore::open_at(home.path());
        for id in [30u64, 10, 20] {
            store.upsert_by_id(OrderId(id), &json!({"id": id})).unwrap();
        }
        std::fs::write(store.dir().join("40.json.tmp"), "{").unwrap();

        let set = store.find_all().unwrap();
        let ids: Vec<_> = set.records.iter().map(|r| r.id.0).collect();
        assert_eq!(ids, [10, 20, 30]);
        assert!(set.unreadable.is_empty());
    }

    #[test]
    fn corrupt_record_is_reported_beside_readable_ones() {
        let home = TempDir::new().expect("tempdir");
        let mut store = FileOrderStore::open_at(home.path());
        store.upsert_by_id(OrderId(1), &json!({"id": 1})).unwrap();
        std::fs::write(store.record_path(OrderId(9)), "not json").unwrap();
        std::fs::write(store.dir().join("notes.json"), "{").unwrap();

        let set = store.find_all().expect("listing succeeds");
        assert_eq!(set.records.len(), 1);
        assert_eq!(set.records[0].id, OrderId(1));
        assert_eq!(set.unreadable.len(), 2);
        assert_eq!(set.unreadable[0].id, None);
        assert_eq!(set.unreadable[1].id, Some(OrderId(9)));
        assert!(set.unreadable[1].reason.contains("9.json"));
        assert_eq!(set.len(), 3);

        let err = store.find_by_id(OrderId(9)).unwrap_err();
        assert!(matches!(err, StoreError::Json { .. }));
    }

    #[test]
    fn seeded_memory_store_does_not_count_upserts() {
        let store = MemoryOrderStore::with_orders([json!({"id": 1}), json!({"id": 2})]).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.upsert_count(), 0);
    }
}
