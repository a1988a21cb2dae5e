//! Benchmark engine: population reference statistics.
//!
//! A benchmark is one scalar computed over per-entity values (one value
//! per product, per month, ...). Entities whose metric is undefined are
//! excluded before computing, never counted as zero.

use crate::{
    aggregation::{AggregateMetrics, Aggregation},
    error::{LedgerError, LedgerResult},
    types::Money,
};
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Per-entity metric a benchmark or threshold scan reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    TransactionCount,
    Units,
    Sales,
    Profit,
    /// Ratio of sums, `total_profit / total_sales`.
    Margin,
    /// Mean of per-transaction ratios.
    MeanTransactionMargin,
    ProfitShare,
    AverageOrderValue,
}

impl Metric {
    pub fn value(self, m: &AggregateMetrics) -> Option<Money> {
        match self {
            Metric::TransactionCount => Some(Money::from(m.transaction_count)),
            Metric::Units => Some(Money::from(m.total_units)),
            Metric::Sales => Some(m.total_sales),
            Metric::Profit => Some(m.total_profit),
            Metric::Margin => m.profit_margin,
            Metric::MeanTransactionMargin => m.mean_transaction_margin,
            Metric::ProfitShare => m.profit_share,
            Metric::AverageOrderValue => Some(m.average_order_value),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Metric::TransactionCount => "transaction_count",
            Metric::Units => "total_units",
            Metric::Sales => "total_sales",
            Metric::Profit => "total_profit",
            Metric::Margin => "profit_margin",
            Metric::MeanTransactionMargin => "mean_transaction_margin",
            Metric::ProfitShare => "profit_share",
            Metric::AverageOrderValue => "average_order_value",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Statistic requested from the benchmark engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Statistic {
    Mean,
    /// Continuous percentile at fraction `p` in `[0, 1]`.
    Percentile(Money),
}

impl fmt::Display for Statistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statistic::Mean => write!(f, "mean"),
            Statistic::Percentile(p) => write!(f, "p{}", (*p * Money::ONE_HUNDRED).normalize()),
        }
    }
}

/// A computed benchmark, kept with what it was computed from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Benchmark {
    pub metric:    Metric,
    pub statistic: Statistic,
    pub value:     Money,
    /// Entities that contributed (undefined values excluded).
    pub sample_size: usize,
}

/// Unweighted arithmetic mean.
pub fn mean(values: &[Money]) -> LedgerResult<Money> {
    mean_of("values", values)
}

fn mean_of(metric: &str, values: &[Money]) -> LedgerResult<Money> {
    if values.is_empty() {
        return Err(empty(metric));
    }
    let sum: Money = values.iter().sum();
    Ok(sum / Money::from(values.len()))
}

/// Continuous percentile with linear interpolation between closest ranks.
///
/// `r = p * (n - 1)`; result is `v[floor(r)] + (v[ceil(r)] - v[floor(r)]) * frac(r)`
/// over the ascending sort of `values`.
pub fn percentile(values: &[Money], p: Money) -> LedgerResult<Money> {
    percentile_of("values", values, p)
}

fn percentile_of(metric: &str, values: &[Money], p: Money) -> LedgerResult<Money> {
    if p < Money::ZERO || p > Money::ONE {
        return Err(LedgerError::InvalidPercentile { p: p.to_string() });
    }
    if values.is_empty() {
        return Err(empty(metric));
    }

    let mut sorted = values.to_vec();
    sorted.sort();

    let rank = p * Money::from(sorted.len() - 1);
    let lower = rank.floor();
    let frac = rank - lower;
    let lo = index(lower, sorted.len());
    let hi = index(rank.ceil(), sorted.len());

    Ok(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

// rank is within [0, n-1] once p is validated.
fn index(rank: Money, len: usize) -> usize {
    rank.to_usize().unwrap_or(0).min(len - 1)
}

fn empty(metric: &str) -> LedgerError {
    LedgerError::EmptyInput { metric: metric.to_string() }
}

/// Apply `statistic` to raw values.
pub fn compute(values: &[Money], statistic: Statistic) -> LedgerResult<Money> {
    match statistic {
        Statistic::Mean => mean(values),
        Statistic::Percentile(p) => percentile(values, p),
    }
}

/// Defined values of `metric`, one per entity, in key order.
pub fn metric_values(aggregation: &Aggregation, metric: Metric) -> Vec<Money> {
    aggregation
        .iter()
        .filter_map(|(_, m)| metric.value(m))
        .collect()
}

/// Benchmark `metric` across the entities of an aggregation.
pub fn benchmark(
    aggregation: &Aggregation,
    metric: Metric,
    statistic: Statistic,
) -> LedgerResult<Benchmark> {
    let values = metric_values(aggregation, metric);
    let value = match statistic {
        Statistic::Mean => mean_of(metric.name(), &values)?,
        Statistic::Percentile(p) => percentile_of(metric.name(), &values, p)?,
    };

    log::debug!(
        "benchmark {} {} = {} over {} entities",
        statistic,
        metric,
        value,
        values.len()
    );

    Ok(Benchmark {
        metric,
        statistic,
        value,
        sample_size: values.len(),
    })
}
