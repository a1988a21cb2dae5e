//! Snapshot store tests: import, scan pushdown, isolation.

use chrono::NaiveDate;
use ledger_core::{
    error::LedgerError,
    record::parse_ledger_json,
    sample::synthetic_ledger,
    store::{LedgerStore, RecordSource, ScanFilter},
};
use rust_decimal_macros::dec;

// ── Helpers ──────────────────────────────────────────────────────────────────

fn store() -> LedgerStore {
    let s = LedgerStore::in_memory().expect("in-memory store");
    s.migrate().expect("migrate");
    s
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

// ── Tests ────────────────────────────────────────────────────────────────────

/// Records come back exactly as written, decimals included, in order.
#[test]
fn import_then_scan_returns_identical_records() {
    let s = store();
    let records = synthetic_ledger(9, 500);
    let id = s.import_snapshot("batch", &records).unwrap();

    let back = s.snapshot(&id).unwrap().scan(&ScanFilter::all()).unwrap();
    assert_eq!(back, records);
    assert_eq!(s.record_count(&id).unwrap(), 500);
}

/// The SQL filter selects exactly what `ScanFilter::matches` selects.
#[test]
fn pushdown_agrees_with_in_memory_filter() {
    let s = store();
    let records = synthetic_ledger(17, 1_500);
    let id = s.import_snapshot("batch", &records).unwrap();
    let view = s.snapshot(&id).unwrap();

    let filters = vec![
        ScanFilter::between(date(2023, 1, 1), date(2023, 12, 31)),
        ScanFilter { region: Some("West".into()), ..ScanFilter::all() },
        ScanFilter {
            category: Some("Furniture".into()),
            from: Some(date(2022, 6, 15)),
            ..ScanFilter::all()
        },
        ScanFilter { product: Some(records[0].product_name.clone()), ..ScanFilter::all() },
        ScanFilter { region: Some("Atlantis".into()), ..ScanFilter::all() },
    ];

    for f in &filters {
        let from_db = view.scan(f).unwrap();
        let from_slice = records.as_slice().scan(f).unwrap();
        assert_eq!(from_db, from_slice, "filter {f:?} disagrees");
    }
}

/// Importing a second batch leaves the first snapshot untouched.
#[test]
fn snapshots_are_isolated() {
    let s = store();
    let first = synthetic_ledger(1, 100);
    let second = synthetic_ledger(2, 40);

    let a = s.import_snapshot("first", &first).unwrap();
    let b = s.import_snapshot("second", &second).unwrap();
    assert_ne!(a, b);

    assert_eq!(s.snapshot(&a).unwrap().scan(&ScanFilter::all()).unwrap(), first);
    assert_eq!(s.snapshot(&b).unwrap().scan(&ScanFilter::all()).unwrap(), second);

    let catalog = s.snapshots().unwrap();
    assert_eq!(catalog.len(), 2);
    assert_eq!(catalog[0].label, "first");
    assert_eq!(catalog[0].import_seq, 1);
    assert_eq!(catalog[1].record_count, 40);
    assert_eq!(s.latest_snapshot().unwrap(), Some(b));
}

#[test]
fn empty_store_has_no_latest_snapshot() {
    assert_eq!(store().latest_snapshot().unwrap(), None);
}

#[test]
fn unknown_snapshot_is_an_error() {
    let err = store().snapshot("no-such-id").err().expect("should fail");
    assert!(matches!(err, LedgerError::SnapshotNotFound { .. }));
}

/// Ingestion rejects bad rows and names the offending index.
#[test]
fn invalid_rows_are_rejected_at_ingestion() {
    let json = r#"[
        {"order_date": "2023-01-02", "product_name": "Stapler", "category": "Office",
         "region": "East", "quantity": 2, "sales": "19.98", "profit": "4.00"},
        {"order_date": "2023-01-03", "product_name": "Stapler", "category": "Office",
         "region": null, "quantity": 1, "sales": "9.99", "profit": "2.00"}
    ]"#;
    match parse_ledger_json(json) {
        Err(LedgerError::InvalidRecord { index, reason }) => {
            assert_eq!(index, 1);
            assert!(reason.contains("region"), "{reason}");
        }
        other => panic!("expected InvalidRecord, got {other:?}"),
    }
}

#[test]
fn valid_json_ledger_round_trips_through_the_store() {
    let json = r#"[
        {"order_date": "2023-01-02", "product_name": "Stapler", "category": "Office",
         "region": "East", "quantity": 2, "sales": "19.98", "profit": "-0.01"}
    ]"#;
    let records = parse_ledger_json(json).unwrap();
    let s = store();
    let id = s.import_snapshot("file.json", &records).unwrap();

    let back = s.snapshot(&id).unwrap().scan(&ScanFilter::all()).unwrap();
    assert_eq!(back[0].sales, dec!(19.98));
    assert_eq!(back[0].profit, dec!(-0.01));
    assert_eq!(back[0].order_date, date(2023, 1, 2));
}
