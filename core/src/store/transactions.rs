use super::{LedgerStore, ScanFilter};
use crate::{error::LedgerResult, record::TransactionRecord, types::{Money, SnapshotId}};
use rusqlite::{params, params_from_iter, types::Type, Row};
use std::str::FromStr;

impl LedgerStore {
    // ── Import ─────────────────────────────────────────────────

    /// Write `records` as a new immutable snapshot. All-or-nothing.
    pub fn import_snapshot(
        &self,
        label: &str,
        records: &[TransactionRecord],
    ) -> LedgerResult<SnapshotId> {
        let snapshot_id = uuid::Uuid::new_v4().to_string();
        let tx = self.conn.unchecked_transaction()?;

        let next_seq: i64 = tx.query_row(
            "SELECT COALESCE(MAX(import_seq), 0) + 1 FROM snapshot",
            [],
            |row| row.get(0),
        )?;
        tx.execute(
            "INSERT INTO snapshot (snapshot_id, label, import_seq, record_count)
             VALUES (?1, ?2, ?3, ?4)",
            params![snapshot_id, label, next_seq, records.len() as i64],
        )?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO transactions (
                    snapshot_id, order_date, product_name, category, region,
                    quantity, sales, profit
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for r in records {
                stmt.execute(params![
                    snapshot_id,
                    r.order_date,
                    r.product_name,
                    r.category,
                    r.region,
                    r.quantity,
                    r.sales.to_string(),
                    r.profit.to_string(),
                ])?;
            }
        }

        tx.commit()?;
        log::info!(
            "imported snapshot {} '{}' ({} records, seq {})",
            snapshot_id,
            label,
            records.len(),
            next_seq
        );
        Ok(snapshot_id)
    }

    // ── Scan ───────────────────────────────────────────────────

    /// Records of one snapshot matching `filter`, in insertion order.
    pub fn scan_snapshot(
        &self,
        snapshot_id: &str,
        filter: &ScanFilter,
    ) -> LedgerResult<Vec<TransactionRecord>> {
        let mut sql = String::from(
            "SELECT order_date, product_name, category, region, quantity, sales, profit
             FROM transactions WHERE snapshot_id = ?1",
        );
        let mut args: Vec<String> = vec![snapshot_id.to_string()];

        let mut push = |clause: &str, value: String| {
            args.push(value);
            sql.push_str(&format!(" AND {clause} ?{}", args.len()));
        };
        if let Some(d) = filter.from {
            push("order_date >=", d.format("%Y-%m-%d").to_string());
        }
        if let Some(d) = filter.to {
            push("order_date <=", d.format("%Y-%m-%d").to_string());
        }
        if let Some(c) = &filter.category {
            push("category =", c.clone());
        }
        if let Some(g) = &filter.region {
            push("region =", g.clone());
        }
        if let Some(p) = &filter.product {
            push("product_name =", p.clone());
        }
        sql.push_str(" ORDER BY id ASC");

        let mut stmt = self.conn.prepare(&sql)?;
        let records = stmt
            .query_map(params_from_iter(args.iter()), record_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        log::debug!("scan {}: {} records", snapshot_id, records.len());
        Ok(records)
    }
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<TransactionRecord> {
    Ok(TransactionRecord {
        order_date:   row.get(0)?,
        product_name: row.get(1)?,
        category:     row.get(2)?,
        region:       row.get(3)?,
        quantity:     row.get(4)?,
        sales:        money(row, 5)?,
        profit:       money(row, 6)?,
    })
}

fn money(row: &Row<'_>, idx: usize) -> rusqlite::Result<Money> {
    let text: String = row.get(idx)?;
    Money::from_str(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
