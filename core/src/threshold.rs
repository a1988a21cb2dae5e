//! Threshold scan: fixed-scalar checks over a grouped aggregate.
//!
//! Used for "unusually low margin month" and "unprofitable product".
//! The comparison operator is always explicit at the call site: margin
//! floors use strict `<`, the unprofitable check uses `<=`.

use crate::{
    aggregation::{AggregateMetrics, Aggregation, GroupKey},
    benchmark::Metric,
    types::Money,
};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    Lt,
    Le,
    Gt,
    Ge,
}

impl Comparison {
    pub fn holds(self, value: Money, threshold: Money) -> bool {
        match self {
            Comparison::Lt => value < threshold,
            Comparison::Le => value <= threshold,
            Comparison::Gt => value > threshold,
            Comparison::Ge => value >= threshold,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Comparison::Lt => "<",
            Comparison::Le => "<=",
            Comparison::Gt => ">",
            Comparison::Ge => ">=",
        }
    }
}

/// `metric <comparison> threshold`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdRule {
    pub metric:     Metric,
    pub comparison: Comparison,
    pub threshold:  Money,
}

impl fmt::Display for ThresholdRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.metric, self.comparison.symbol(), self.threshold)
    }
}

impl ThresholdRule {
    pub fn new(metric: Metric, comparison: Comparison, threshold: Money) -> Self {
        Self { metric, comparison, threshold }
    }

    /// Groups whose metric satisfies the rule, in natural key order.
    /// Groups where the metric is undefined never match.
    pub fn scan<'a>(&self, aggregation: &'a Aggregation) -> Vec<(&'a GroupKey, &'a AggregateMetrics)> {
        let hits: Vec<_> = aggregation
            .iter()
            .filter(|(_, m)| {
                self.metric
                    .value(m)
                    .is_some_and(|v| self.comparison.holds(v, self.threshold))
            })
            .collect();

        log::debug!("threshold {}: {} of {} groups", self, hits.len(), aggregation.len());
        hits
    }
}
