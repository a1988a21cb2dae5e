//! SQLite record store.
//!
//! RULE: Only the store talks to the database.
//! Engine modules receive plain `TransactionRecord` slices; they never
//! execute SQL directly.
//!
//! Every import becomes an immutable snapshot. A scan always reads
//! exactly one snapshot, so concurrent report runs each see a consistent
//! view without any engine-side locking.

use crate::{
    error::{LedgerError, LedgerResult},
    record::TransactionRecord,
    types::SnapshotId,
};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

mod transactions;

/// Structured filter pushed down to the record source.
///
/// Date bounds are inclusive. Arbitrary predicates are applied by the
/// aggregation engine on top of whatever the source returns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanFilter {
    pub from:     Option<NaiveDate>,
    pub to:       Option<NaiveDate>,
    pub category: Option<String>,
    pub region:   Option<String>,
    pub product:  Option<String>,
}

impl ScanFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn between(from: NaiveDate, to: NaiveDate) -> Self {
        Self { from: Some(from), to: Some(to), ..Self::default() }
    }

    pub fn matches(&self, r: &TransactionRecord) -> bool {
        self.from.map_or(true, |d| r.order_date >= d)
            && self.to.map_or(true, |d| r.order_date <= d)
            && self.category.as_deref().map_or(true, |c| r.category == c)
            && self.region.as_deref().map_or(true, |g| r.region == g)
            && self.product.as_deref().map_or(true, |p| r.product_name == p)
    }
}

/// Anything that can enumerate transaction records.
pub trait RecordSource {
    fn scan(&self, filter: &ScanFilter) -> LedgerResult<Vec<TransactionRecord>>;
}

impl RecordSource for [TransactionRecord] {
    fn scan(&self, filter: &ScanFilter) -> LedgerResult<Vec<TransactionRecord>> {
        Ok(self.iter().filter(|r| filter.matches(r)).cloned().collect())
    }
}

/// Catalog row for one imported snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotInfo {
    pub snapshot_id:  SnapshotId,
    pub label:        String,
    pub import_seq:   i64,
    pub record_count: i64,
}

pub struct LedgerStore {
    conn: Connection,
}

impl LedgerStore {
    pub fn open(path: &str) -> LedgerResult<Self> {
        let conn = Connection::open(path)?;
        // WAL mode only matters for real files; :memory: ignores it.
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> LedgerResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> LedgerResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_ledger.sql"))?;
        Ok(())
    }

    // ── Snapshot catalog ───────────────────────────────────────

    pub fn snapshots(&self) -> LedgerResult<Vec<SnapshotInfo>> {
        let mut stmt = self.conn.prepare(
            "SELECT snapshot_id, label, import_seq, record_count
             FROM snapshot ORDER BY import_seq ASC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(SnapshotInfo {
                    snapshot_id: row.get(0)?,
                    label: row.get(1)?,
                    import_seq: row.get(2)?,
                    record_count: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn latest_snapshot(&self) -> LedgerResult<Option<SnapshotId>> {
        let id = self
            .conn
            .query_row(
                "SELECT snapshot_id FROM snapshot ORDER BY import_seq DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    pub fn record_count(&self, snapshot_id: &str) -> LedgerResult<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM transactions WHERE snapshot_id = ?1",
            params![snapshot_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// A read view pinned to one snapshot.
    pub fn snapshot(&self, snapshot_id: &str) -> LedgerResult<SnapshotView<'_>> {
        let exists: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM snapshot WHERE snapshot_id = ?1",
                params![snapshot_id],
                |row| row.get(0),
            )
            .optional()?;
        match exists {
            Some(_) => Ok(SnapshotView {
                store: self,
                snapshot_id: snapshot_id.to_string(),
            }),
            None => Err(LedgerError::SnapshotNotFound { id: snapshot_id.to_string() }),
        }
    }
}

/// `RecordSource` over one snapshot of a `LedgerStore`.
pub struct SnapshotView<'a> {
    store:       &'a LedgerStore,
    snapshot_id: SnapshotId,
}

impl SnapshotView<'_> {
    pub fn id(&self) -> &str {
        &self.snapshot_id
    }
}

impl RecordSource for SnapshotView<'_> {
    fn scan(&self, filter: &ScanFilter) -> LedgerResult<Vec<TransactionRecord>> {
        self.store.scan_snapshot(&self.snapshot_id, filter)
    }
}
