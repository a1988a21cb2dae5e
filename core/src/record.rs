//! Transaction records: the immutable input unit.
//!
//! RULE: validation happens once, at ingestion. Everything downstream of
//! `TransactionRecord::from_raw` trusts the record and never re-checks it.

use crate::{
    error::{LedgerError, LedgerResult},
    types::Money,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One sale event. No record references another.
///
/// `sales` and `profit` are independent inputs; profit is given, not
/// derived from a cost column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub order_date:   NaiveDate,
    pub product_name: String,
    pub category:     String,
    pub region:       String,
    pub quantity:     u32,
    pub sales:        Money,
    pub profit:       Money,
}

/// Wire shape of a record as it arrives from a ledger file.
/// Nothing is trusted until `TransactionRecord::from_raw` accepts it.
#[derive(Debug, Clone, Deserialize)]
pub struct RawTransaction {
    pub order_date:   String,
    pub product_name: Option<String>,
    pub category:     Option<String>,
    pub region:       Option<String>,
    pub quantity:     i64,
    pub sales:        Money,
    pub profit:       Money,
}

impl TransactionRecord {
    /// Validate one raw row. `index` is the row's position in its batch and
    /// is carried into the error so the caller can point at the bad line.
    pub fn from_raw(index: usize, raw: RawTransaction) -> LedgerResult<Self> {
        let invalid = |reason: String| LedgerError::InvalidRecord { index, reason };

        let order_date = NaiveDate::parse_from_str(raw.order_date.trim(), "%Y-%m-%d")
            .map_err(|e| invalid(format!("order_date '{}': {e}", raw.order_date)))?;

        let product_name = required(raw.product_name, "product_name").map_err(invalid)?;
        let category = required(raw.category, "category").map_err(invalid)?;
        let region = required(raw.region, "region").map_err(invalid)?;

        if raw.quantity <= 0 {
            return Err(invalid(format!("quantity must be positive, got {}", raw.quantity)));
        }
        let quantity = u32::try_from(raw.quantity)
            .map_err(|_| invalid(format!("quantity {} out of range", raw.quantity)))?;

        if raw.sales < Money::ZERO {
            return Err(invalid(format!("sales must be non-negative, got {}", raw.sales)));
        }

        Ok(Self {
            order_date,
            product_name,
            category,
            region,
            quantity,
            sales: raw.sales,
            profit: raw.profit,
        })
    }

    /// Per-transaction margin. `None` when the sale carried no revenue.
    pub fn margin(&self) -> Option<Money> {
        if self.sales.is_zero() {
            None
        } else {
            self.profit.checked_div(self.sales)
        }
    }
}

fn required(value: Option<String>, field: &str) -> Result<String, String> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(format!("missing required dimension '{field}'")),
    }
}

/// Validate a whole batch. Fails on the first bad row; a partially valid
/// batch is never returned.
pub fn validate_batch(raws: Vec<RawTransaction>) -> LedgerResult<Vec<TransactionRecord>> {
    raws.into_iter()
        .enumerate()
        .map(|(i, raw)| TransactionRecord::from_raw(i, raw))
        .collect()
}

/// Parse and validate a JSON array of raw transactions.
pub fn parse_ledger_json(json: &str) -> LedgerResult<Vec<TransactionRecord>> {
    let raws: Vec<RawTransaction> = serde_json::from_str(json)?;
    validate_batch(raws)
}
