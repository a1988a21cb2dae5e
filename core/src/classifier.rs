//! Outlier classifier: volume vs. margin triage.
//!
//! Joins per-entity aggregates with two benchmarks and keeps the entities
//! in the requested tail. The default tail is "margin-light": at least
//! benchmark volume, at most benchmark margin. Entities with an undefined
//! margin cannot be compared and are always excluded.
//!
//! Ordering is part of the contract: the most dangerous entity comes
//! first, and equal inputs always produce the same order.

use crate::{
    aggregation::{AggregateMetrics, Aggregation, GroupKey},
    benchmark::{benchmark, Benchmark, Metric, Statistic},
    error::LedgerResult,
    types::Money,
};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tail {
    /// `units >= volume AND margin <= margin`.
    /// Ordered by ascending margin, then descending units.
    HighVolumeLowMargin,
    /// `units <= volume AND margin >= margin`.
    /// Ordered by descending margin, then ascending units.
    LowVolumeHighMargin,
}

impl Tail {
    fn admits(self, units: Money, margin: Money, volume_bm: Money, margin_bm: Money) -> bool {
        match self {
            Tail::HighVolumeLowMargin => units >= volume_bm && margin <= margin_bm,
            Tail::LowVolumeHighMargin => units <= volume_bm && margin >= margin_bm,
        }
    }

    fn order(self, a: &FlaggedEntity, b: &FlaggedEntity) -> Ordering {
        let primary = match self {
            Tail::HighVolumeLowMargin => a
                .margin
                .cmp(&b.margin)
                .then_with(|| b.metrics.total_units.cmp(&a.metrics.total_units)),
            Tail::LowVolumeHighMargin => b
                .margin
                .cmp(&a.margin)
                .then_with(|| a.metrics.total_units.cmp(&b.metrics.total_units)),
        };
        primary.then_with(|| a.key.cmp(&b.key))
    }
}

/// One entity that met the rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlaggedEntity {
    pub key:     GroupKey,
    /// The margin that was compared (always defined here).
    pub margin:  Money,
    pub metrics: AggregateMetrics,
}

/// Benchmarks plus tail choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutlierRule {
    pub volume: Statistic,
    pub margin: Statistic,
    pub tail:   Tail,
}

impl Default for OutlierRule {
    fn default() -> Self {
        Self {
            volume: Statistic::Mean,
            margin: Statistic::Percentile(Money::new(25, 2)),
            tail:   Tail::HighVolumeLowMargin,
        }
    }
}

/// Result of running an `OutlierRule` end to end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutlierReport {
    pub volume_benchmark: Benchmark,
    pub margin_benchmark: Benchmark,
    pub tail:             Tail,
    pub flagged:          Vec<FlaggedEntity>,
}

/// Entities of `aggregation` satisfying `tail` against the given
/// benchmark values, in triage order.
pub fn classify(
    aggregation: &Aggregation,
    volume_benchmark: Money,
    margin_benchmark: Money,
    tail: Tail,
) -> Vec<FlaggedEntity> {
    let mut flagged: Vec<FlaggedEntity> = aggregation
        .iter()
        .filter_map(|(key, metrics)| {
            let margin = metrics.profit_margin?;
            let units = Money::from(metrics.total_units);
            tail.admits(units, margin, volume_benchmark, margin_benchmark)
                .then(|| FlaggedEntity {
                    key: key.clone(),
                    margin,
                    metrics: metrics.clone(),
                })
        })
        .collect();

    flagged.sort_by(|a, b| tail.order(a, b));
    flagged
}

/// Compute both benchmarks from `aggregation` itself, then classify.
///
/// Entities with an undefined margin take no part in either benchmark.
pub fn detect_outliers(aggregation: &Aggregation, rule: &OutlierRule) -> LedgerResult<OutlierReport> {
    let comparable = aggregation.filtered(|_, m| m.profit_margin.is_some());
    let volume_benchmark = benchmark(&comparable, Metric::Units, rule.volume)?;
    let margin_benchmark = benchmark(&comparable, Metric::Margin, rule.margin)?;

    let flagged = classify(
        &comparable,
        volume_benchmark.value,
        margin_benchmark.value,
        rule.tail,
    );

    log::info!(
        "{:?}: {} of {} entities flagged (units {} {}, margin {} {})",
        rule.tail,
        flagged.len(),
        aggregation.len(),
        volume_benchmark.statistic,
        volume_benchmark.value.round_dp(2),
        margin_benchmark.statistic,
        margin_benchmark.value.round_dp(4),
    );

    Ok(OutlierReport {
        volume_benchmark,
        margin_benchmark,
        tail: rule.tail,
        flagged,
    })
}
