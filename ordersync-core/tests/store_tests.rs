//! File store integration tests: on-disk layout, atomic writes, permissions.

use assert_fs::prelude::*;
use ordersync_core::{
    paths, FileOrderStore, FileShipmentStore, OrderId, OrderStore, ShipmentStore, StoreError,
};
use predicates::prelude::predicate;
use rstest::rstest;
use serde_json::json;

// ---------------------------------------------------------------------------
// 1. Layout
// ---------------------------------------------------------------------------

#[test]
fn upsert_writes_one_document_per_order() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let mut store = FileOrderStore::open_at(home.path());
    store
        .upsert_by_id(OrderId(1001), &json!({"id": 1001, "name": "#1001"}))
        .expect("upsert");

    home.child(".ordersync/orders/1001.json")
        .assert(predicate::path::is_file());
    home.child(".ordersync/orders/1001.json")
        .assert(predicate::str::contains("\"#1001\""));
    home.child(".ordersync/orders/1001.json.tmp")
        .assert(predicate::path::missing());
}

#[test]
fn persisted_envelope_keeps_raw_order_body() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let mut store = FileOrderStore::open_at(home.path());
    let raw = json!({"id": 7, "updated_at": "2024-01-01T10:00:00+05:30"});
    store.upsert_by_id(OrderId(7), &raw).expect("upsert");

    let text = std::fs::read_to_string(paths::orders_dir(home.path()).join("7.json")).unwrap();
    let doc: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(doc["order"], raw, "store must keep the source representation");
    assert_eq!(doc["version"], 0);
    assert!(doc["key"].as_str().is_some_and(|k| !k.is_empty()));
}

#[cfg(unix)]
#[test]
fn order_documents_are_private() {
    use std::os::unix::fs::PermissionsExt;

    let home = assert_fs::TempDir::new().expect("tempdir");
    let mut store = FileOrderStore::open_at(home.path());
    store.upsert_by_id(OrderId(3), &json!({"id": 3})).unwrap();

    let mode = std::fs::metadata(store.record_path(OrderId(3)))
        .unwrap()
        .permissions()
        .mode()
        & 0o777;
    assert_eq!(mode, 0o600);
    let dir_mode = std::fs::metadata(store.dir()).unwrap().permissions().mode() & 0o777;
    assert_eq!(dir_mode, 0o700);
}

// ---------------------------------------------------------------------------
// 2. Rejected records
// ---------------------------------------------------------------------------

#[rstest]
#[case::array(json!([1, 2]))]
#[case::missing_id(json!({"name": "#1"}))]
#[case::string_id(json!({"id": "1"}))]
#[case::other_id(json!({"id": 2}))]
fn invalid_orders_are_rejected_without_writing(#[case] order: serde_json::Value) {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let mut store = FileOrderStore::open_at(home.path());
    let err = store.upsert_by_id(OrderId(1), &order).unwrap_err();
    assert!(matches!(err, StoreError::InvalidRecord { .. }), "got: {err}");
    home.child(".ordersync/orders/1.json")
        .assert(predicate::path::missing());
}

// ---------------------------------------------------------------------------
// 3. Shipments
// ---------------------------------------------------------------------------

#[test]
fn corrupt_shipments_file_reports_path() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    home.child(".ordersync/shipments.json")
        .write_str("{ not an array")
        .unwrap();
    let store = FileShipmentStore::open_at(home.path());
    let err = store.find_by_order("#1").unwrap_err();
    assert!(err.to_string().contains("shipments.json"), "got: {err}");
}
