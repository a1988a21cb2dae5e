//! Aggregation engine: grouped sums and ratio metrics.
//!
//! One engine serves every grouping: yearly, monthly, by category, by
//! product, by region, or any combination. Callers describe the grouping
//! as a key-extraction function (usually a `GroupBy`), and the engine
//! returns one `AggregateMetrics` per key actually present in the
//! filtered input. No group is invented; none with a contributing record
//! is dropped.
//!
//! Two passes:
//!   1. Fold records into per-key accumulators (exact decimal sums).
//!   2. Finalize ratios, then compute each group's share of the
//!      partition's total profit.
//!
//! The result is a mapping. Presentation order belongs to `report`.

use crate::{
    record::TransactionRecord,
    types::{Granularity, MarginConvention, Money},
};
use chrono::{Datelike, Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ── Grouping keys ────────────────────────────────────────────────────────────

/// One component of a grouping key.
///
/// Periods compare by their start date, so time keys order
/// chronologically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum KeyPart {
    Period { start: NaiveDate, granularity: Granularity },
    Label { value: String },
}

impl fmt::Display for KeyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyPart::Period { start, granularity: Granularity::Year } => {
                write!(f, "{}", start.format("%Y"))
            }
            KeyPart::Period { start, granularity: Granularity::Month } => {
                write!(f, "{}", start.format("%Y-%m"))
            }
            KeyPart::Label { value } => write!(f, "{value}"),
        }
    }
}

/// Ordered tuple of dimension values identifying one bucket.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupKey(pub Vec<KeyPart>);

impl GroupKey {
    /// The empty key: every record falls into one bucket.
    pub fn whole() -> Self {
        GroupKey(Vec::new())
    }

    pub fn label(value: impl Into<String>) -> Self {
        GroupKey(vec![KeyPart::Label { value: value.into() }])
    }

    pub fn parts(&self) -> &[KeyPart] {
        &self.0
    }

    /// Human-readable components, e.g. `["2023-04", "West"]`.
    pub fn labels(&self) -> Vec<String> {
        self.0.iter().map(|p| p.to_string()).collect()
    }

    /// Start date of the leading period component, if any.
    pub fn period_start(&self) -> Option<NaiveDate> {
        self.period().map(|(start, _)| start)
    }

    fn period(&self) -> Option<(NaiveDate, Granularity)> {
        self.0.iter().find_map(|p| match p {
            KeyPart::Period { start, granularity } => Some((*start, *granularity)),
            KeyPart::Label { .. } => None,
        })
    }

    /// True when `self` is the calendar period right after `previous`
    /// and every other component matches.
    pub fn immediately_follows(&self, previous: &GroupKey) -> bool {
        let (Some((start, g)), Some((prev_start, prev_g))) = (self.period(), previous.period())
        else {
            return false;
        };
        let labels_match = self
            .0
            .iter()
            .filter(|p| matches!(p, KeyPart::Label { .. }))
            .eq(previous.0.iter().filter(|p| matches!(p, KeyPart::Label { .. })));
        g == prev_g && next_period(prev_start, g) == Some(start) && labels_match
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "(all)");
        }
        write!(f, "{}", self.labels().join(" / "))
    }
}

/// Truncate a date to the first day of its period.
pub fn truncate_date(date: NaiveDate, granularity: Granularity) -> NaiveDate {
    match granularity {
        Granularity::Month => date - Days::new(u64::from(date.day0())),
        Granularity::Year => date - Days::new(u64::from(date.ordinal0())),
    }
}

/// Start of the period after the one starting at `start`.
pub fn next_period(start: NaiveDate, granularity: Granularity) -> Option<NaiveDate> {
    let months = match granularity {
        Granularity::Month => 1,
        Granularity::Year => 12,
    };
    start.checked_add_months(Months::new(months))
}

// ── Composable dimensions ────────────────────────────────────────────────────

/// A non-time dimension of a transaction record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Category,
    Product,
    Region,
}

impl Dimension {
    pub fn extract(self, record: &TransactionRecord) -> KeyPart {
        let value = match self {
            Dimension::Category => &record.category,
            Dimension::Product => &record.product_name,
            Dimension::Region => &record.region,
        };
        KeyPart::Label { value: value.clone() }
    }

    pub fn name(self) -> &'static str {
        match self {
            Dimension::Category => "category",
            Dimension::Product => "product",
            Dimension::Region => "region",
        }
    }
}

/// Declarative grouping: an optional time bucket followed by any number
/// of dimensions, in key order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupBy {
    pub granularity: Option<Granularity>,
    pub dimensions:  Vec<Dimension>,
}

impl GroupBy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn by_period(granularity: Granularity) -> Self {
        Self { granularity: Some(granularity), dimensions: Vec::new() }
    }

    pub fn by(dimension: Dimension) -> Self {
        Self::new().then(dimension)
    }

    pub fn with_period(mut self, granularity: Granularity) -> Self {
        self.granularity = Some(granularity);
        self
    }

    pub fn then(mut self, dimension: Dimension) -> Self {
        self.dimensions.push(dimension);
        self
    }

    pub fn key(&self, record: &TransactionRecord) -> GroupKey {
        let mut parts = Vec::with_capacity(self.dimensions.len() + 1);
        if let Some(g) = self.granularity {
            parts.push(KeyPart::Period {
                start: truncate_date(record.order_date, g),
                granularity: g,
            });
        }
        parts.extend(self.dimensions.iter().map(|d| d.extract(record)));
        GroupKey(parts)
    }
}

// ── Metrics ──────────────────────────────────────────────────────────────────

/// Summary statistics for one group.
///
/// Ratios are `None` when their denominator is zero. They are never
/// clamped: a margin above 1 means profit exceeded sales in the data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateMetrics {
    pub transaction_count: u64,
    pub total_units:       u64,
    pub total_sales:       Money,
    pub total_profit:      Money,
    /// `total_profit / total_sales`.
    pub profit_margin:     Option<Money>,
    /// This group's fraction of the partition's total profit.
    pub profit_share:      Option<Money>,
    /// `total_sales / transaction_count`.
    pub average_order_value: Money,
    /// Unweighted mean of per-transaction `profit / sales`, over
    /// transactions with non-zero sales.
    pub mean_transaction_margin: Option<Money>,
}

impl AggregateMetrics {
    pub fn margin(&self, convention: MarginConvention) -> Option<Money> {
        match convention {
            MarginConvention::RatioOfSums => self.profit_margin,
            MarginConvention::MeanOfRatios => self.mean_transaction_margin,
        }
    }
}

#[derive(Debug, Default)]
struct Accumulator {
    count:        u64,
    units:        u64,
    sales:        Money,
    profit:       Money,
    margin_sum:   Money,
    margin_count: u64,
}

impl Accumulator {
    fn add(&mut self, record: &TransactionRecord) {
        self.count += 1;
        self.units += u64::from(record.quantity);
        self.sales += record.sales;
        self.profit += record.profit;
        if let Some(m) = record.margin() {
            self.margin_sum += m;
            self.margin_count += 1;
        }
    }

    fn finish(self) -> AggregateMetrics {
        let profit_margin = ratio(self.profit, self.sales);
        let mean_transaction_margin = ratio(self.margin_sum, Money::from(self.margin_count));
        let average_order_value =
            ratio(self.sales, Money::from(self.count)).unwrap_or(Money::ZERO);
        AggregateMetrics {
            transaction_count: self.count,
            total_units: self.units,
            total_sales: self.sales,
            total_profit: self.profit,
            profit_margin,
            profit_share: None,
            average_order_value,
            mean_transaction_margin,
        }
    }
}

/// `numerator / denominator`, undefined on a zero denominator.
///
/// A quotient outside `Decimal` range is also `None`; that case is logged
/// so it cannot pass silently for a zero-sales group.
pub fn ratio(numerator: Money, denominator: Money) -> Option<Money> {
    if denominator.is_zero() {
        return None;
    }
    let quotient = numerator.checked_div(denominator);
    if quotient.is_none() {
        log::warn!("ratio {numerator} / {denominator} overflows; reported as undefined");
    }
    quotient
}

// ── Aggregation result ───────────────────────────────────────────────────────

/// Mapping from grouping key to metrics for one partition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Aggregation {
    groups: BTreeMap<GroupKey, AggregateMetrics>,
}

impl Aggregation {
    pub fn get(&self, key: &GroupKey) -> Option<&AggregateMetrics> {
        self.groups.get(key)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Groups in natural key order (chronological for time keys).
    pub fn iter(&self) -> impl Iterator<Item = (&GroupKey, &AggregateMetrics)> {
        self.groups.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &GroupKey> {
        self.groups.keys()
    }

    pub fn total_transactions(&self) -> u64 {
        self.groups.values().map(|m| m.transaction_count).sum()
    }

    pub fn total_profit(&self) -> Money {
        self.groups.values().map(|m| m.total_profit).sum()
    }

    /// Sub-mapping of groups accepted by `keep`. Metrics, shares included,
    /// are carried over unchanged from the full partition.
    pub fn filtered<F>(&self, keep: F) -> Aggregation
    where
        F: Fn(&GroupKey, &AggregateMetrics) -> bool,
    {
        Aggregation {
            groups: self
                .groups
                .iter()
                .filter(|&(k, m)| keep(k, m))
                .map(|(k, m)| (k.clone(), m.clone()))
                .collect(),
        }
    }

    pub fn into_inner(self) -> BTreeMap<GroupKey, AggregateMetrics> {
        self.groups
    }

    /// Second pass: each group's share of the partition's total profit.
    /// If the total is zero every share is undefined.
    fn assign_profit_shares(&mut self) {
        let total = self.total_profit();
        for metrics in self.groups.values_mut() {
            metrics.profit_share = ratio(metrics.total_profit, total);
        }
    }
}

// ── Engine entry points ──────────────────────────────────────────────────────

/// Group `records` passing `predicate` by `key_fn` and summarize each group.
///
/// Single pass over the input; no random access is assumed.
pub fn aggregate<'a, I, P, K>(records: I, predicate: P, key_fn: K) -> Aggregation
where
    I: IntoIterator<Item = &'a TransactionRecord>,
    P: Fn(&TransactionRecord) -> bool,
    K: Fn(&TransactionRecord) -> GroupKey,
{
    let mut accs: BTreeMap<GroupKey, Accumulator> = BTreeMap::new();
    let mut seen = 0u64;

    for record in records.into_iter().filter(|r| predicate(*r)) {
        accs.entry(key_fn(record)).or_default().add(record);
        seen += 1;
    }

    let mut aggregation = Aggregation {
        groups: accs.into_iter().map(|(k, acc)| (k, acc.finish())).collect(),
    };
    aggregation.assign_profit_shares();

    log::debug!(
        "aggregated {} records into {} groups",
        seen,
        aggregation.len()
    );
    aggregation
}

/// `aggregate` with a declarative `GroupBy`.
pub fn aggregate_by<'a, I, P>(records: I, predicate: P, group_by: &GroupBy) -> Aggregation
where
    I: IntoIterator<Item = &'a TransactionRecord>,
    P: Fn(&TransactionRecord) -> bool,
{
    aggregate(records, predicate, |r| group_by.key(r))
}

/// Whole-ledger summary: one group under the empty key.
pub fn summarize<'a, I>(records: I) -> Option<AggregateMetrics>
where
    I: IntoIterator<Item = &'a TransactionRecord>,
{
    aggregate(records, |_| true, |_| GroupKey::whole())
        .into_inner()
        .into_values()
        .next()
}
