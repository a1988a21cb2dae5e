//! Shared primitive types used across the entire ledger engine.

use serde::{Deserialize, Serialize};

/// Identifier of one immutable imported snapshot of the ledger.
pub type SnapshotId = String;

/// Currency and ratio values. Exact base-10, at least 2 fractional digits.
pub type Money = rust_decimal::Decimal;

/// Time-bucket size used to truncate `order_date`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    Month,
    Year,
}

/// Which definition of "margin" a call site reads.
///
/// `RatioOfSums` is `total_profit / total_sales`; `MeanOfRatios` is the
/// unweighted mean of per-transaction `profit / sales`. They are not
/// interchangeable: a few large low-margin orders pull the first down
/// without moving the second much.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarginConvention {
    RatioOfSums,
    MeanOfRatios,
}
