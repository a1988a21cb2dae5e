//! Report assembler: packages engine output into named result sets.
//!
//! A `ReportSession` materializes one scan of the record source and owns
//! it for the life of the session; every section is re-derived from that
//! buffer. Nothing persists between sessions.
//!
//! This is the presentation boundary: ratios are rounded to
//! `ratio_decimals` and currency to `currency_decimals` here and nowhere
//! else.

use crate::{
    aggregation::{
        aggregate_by, ratio, summarize, AggregateMetrics, Aggregation, Dimension, GroupBy, GroupKey,
    },
    classifier::{detect_outliers, OutlierRule},
    config::{MarginCheck, ReportConfig},
    error::{LedgerError, LedgerResult},
    record::TransactionRecord,
    store::{RecordSource, ScanFilter},
    types::{Granularity, Money},
};
use chrono::NaiveDate;
use rust_decimal::RoundingStrategy;
use serde::Serialize;
use std::collections::BTreeSet;

// ── Public types ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRow {
    pub key: Vec<String>,
    pub transaction_count: u64,
    pub total_units: u64,
    pub total_sales: Money,
    pub total_profit: Money,
    pub profit_margin: Option<Money>,
    pub profit_share: Option<Money>,
    pub average_order_value: Money,
    pub mean_transaction_margin: Option<Money>,
}

/// A time-bucket row with change against the previous bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrendRow {
    #[serde(flatten)]
    pub row: ReportRow,
    pub sales_growth: Option<Money>,
    pub profit_growth: Option<Money>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverallSummary {
    pub transaction_count: u64,
    pub total_units: u64,
    pub total_sales: Money,
    pub total_profit: Money,
    pub profit_margin: Option<Money>,
    pub average_order_value: Money,
    pub distinct_products: usize,
    pub first_order: Option<NaiveDate>,
    pub last_order: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutlierSection {
    pub volume_statistic: String,
    pub volume_benchmark: Money,
    pub margin_statistic: String,
    pub margin_benchmark: Money,
    pub rows: Vec<ReportRow>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThresholdSection {
    pub rule: String,
    pub rows: Vec<ReportRow>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisReport {
    pub overall: OverallSummary,
    pub yearly_trend: Vec<TrendRow>,
    pub monthly_trend: Vec<TrendRow>,
    pub category_breakdown: Vec<ReportRow>,
    pub region_breakdown: Vec<ReportRow>,
    pub region_category_breakdown: Vec<ReportRow>,
    pub top_products: Vec<ReportRow>,
    pub margin_light_products: OutlierSection,
    pub low_margin_months: ThresholdSection,
    pub unprofitable_products: ThresholdSection,
}

// ── Session ──────────────────────────────────────────────────────────────────

pub struct ReportSession {
    records: Vec<TransactionRecord>,
    config: ReportConfig,
}

impl ReportSession {
    pub fn new(records: Vec<TransactionRecord>, config: ReportConfig) -> Self {
        Self { records, config }
    }

    /// Scan `source` once and keep the result for the whole session.
    pub fn from_source<S>(source: &S, filter: &ScanFilter, config: ReportConfig) -> LedgerResult<Self>
    where
        S: RecordSource + ?Sized,
    {
        let records = source.scan(filter)?;
        log::info!("report session over {} records", records.len());
        Ok(Self::new(records, config))
    }

    pub fn records(&self) -> &[TransactionRecord] {
        &self.records
    }

    pub fn config(&self) -> &ReportConfig {
        &self.config
    }

    pub fn aggregate(&self, group_by: &GroupBy) -> Aggregation {
        aggregate_by(&self.records, |_| true, group_by)
    }

    /// Build every section. Fails as a whole if any section fails.
    pub fn run(&self) -> LedgerResult<AnalysisReport> {
        let overall = self.overall()?;

        let yearly = self.aggregate(&GroupBy::by_period(Granularity::Year));
        let monthly = self.aggregate(&GroupBy::by_period(Granularity::Month));
        let by_category = self.aggregate(&GroupBy::by(Dimension::Category));
        let by_region = self.aggregate(&GroupBy::by(Dimension::Region));
        let by_region_category =
            self.aggregate(&GroupBy::by(Dimension::Region).then(Dimension::Category));
        let by_product = self.aggregate(&GroupBy::by(Dimension::Product));

        let mut top_products = self.rows(by_profit_desc(&by_product));
        top_products.truncate(self.config.top_products);

        let report = AnalysisReport {
            overall,
            yearly_trend: self.trend(&yearly),
            monthly_trend: self.trend(&monthly),
            category_breakdown: self.rows(by_profit_desc(&by_category)),
            region_breakdown: self.rows(by_profit_desc(&by_region)),
            region_category_breakdown: self.rows(leading_key_then_profit_desc(&by_region_category)),
            top_products,
            margin_light_products: self.outliers(&by_product)?,
            low_margin_months: self.threshold(&monthly, &self.config.low_margin_month),
            unprofitable_products: self.threshold(&by_product, &self.config.unprofitable_product),
        };

        log::info!(
            "report: {} months ({} below floor), {} products ({} margin-light, {} unprofitable)",
            report.monthly_trend.len(),
            report.low_margin_months.rows.len(),
            by_product.len(),
            report.margin_light_products.rows.len(),
            report.unprofitable_products.rows.len(),
        );
        Ok(report)
    }

    // ── Sections ───────────────────────────────────────────────

    fn overall(&self) -> LedgerResult<OverallSummary> {
        let metrics = summarize(&self.records).ok_or_else(|| LedgerError::EmptyInput {
            metric: "transactions".into(),
        })?;
        let products: BTreeSet<&str> =
            self.records.iter().map(|r| r.product_name.as_str()).collect();

        Ok(OverallSummary {
            transaction_count: metrics.transaction_count,
            total_units: metrics.total_units,
            total_sales: self.currency(metrics.total_sales),
            total_profit: self.currency(metrics.total_profit),
            profit_margin: metrics.profit_margin.map(|m| self.ratio(m)),
            average_order_value: self.currency(metrics.average_order_value),
            distinct_products: products.len(),
            first_order: self.records.iter().map(|r| r.order_date).min(),
            last_order: self.records.iter().map(|r| r.order_date).max(),
        })
    }

    /// Growth compares against the immediately preceding period only; a
    /// bucket after a gap in the data has undefined growth.
    fn trend(&self, aggregation: &Aggregation) -> Vec<TrendRow> {
        let mut previous: Option<(&GroupKey, &AggregateMetrics)> = None;
        let mut rows = Vec::with_capacity(aggregation.len());
        for (key, m) in aggregation.iter() {
            let prior = previous
                .filter(|(prev_key, _)| key.immediately_follows(prev_key))
                .map(|(_, p)| p);
            let sales_growth = prior.and_then(|p| growth(m.total_sales, p.total_sales));
            let profit_growth = prior.and_then(|p| growth(m.total_profit, p.total_profit));
            rows.push(TrendRow {
                row: self.row(key, m),
                sales_growth: sales_growth.map(|g| self.ratio(g)),
                profit_growth: profit_growth.map(|g| self.ratio(g)),
            });
            previous = Some((key, m));
        }
        rows
    }

    fn outliers(&self, by_product: &Aggregation) -> LedgerResult<OutlierSection> {
        let rule: OutlierRule = self.config.outlier.into();
        let found = detect_outliers(by_product, &rule)?;
        Ok(OutlierSection {
            volume_statistic: found.volume_benchmark.statistic.to_string(),
            volume_benchmark: self.currency(found.volume_benchmark.value),
            margin_statistic: found.margin_benchmark.statistic.to_string(),
            margin_benchmark: self.ratio(found.margin_benchmark.value),
            rows: found
                .flagged
                .iter()
                .map(|f| self.row(&f.key, &f.metrics))
                .collect(),
        })
    }

    fn threshold(&self, aggregation: &Aggregation, check: &MarginCheck) -> ThresholdSection {
        let rule = check.rule();
        ThresholdSection {
            rule: rule.to_string(),
            rows: self.rows(rule.scan(aggregation)),
        }
    }

    // ── Presentation ───────────────────────────────────────────

    fn rows(&self, entries: Vec<(&GroupKey, &AggregateMetrics)>) -> Vec<ReportRow> {
        entries.into_iter().map(|(k, m)| self.row(k, m)).collect()
    }

    fn row(&self, key: &GroupKey, m: &AggregateMetrics) -> ReportRow {
        ReportRow {
            key: key.labels(),
            transaction_count: m.transaction_count,
            total_units: m.total_units,
            total_sales: self.currency(m.total_sales),
            total_profit: self.currency(m.total_profit),
            profit_margin: m.profit_margin.map(|v| self.ratio(v)),
            profit_share: m.profit_share.map(|v| self.ratio(v)),
            average_order_value: self.currency(m.average_order_value),
            mean_transaction_margin: m.mean_transaction_margin.map(|v| self.ratio(v)),
        }
    }

    fn ratio(&self, v: Money) -> Money {
        round_half_away(v, self.config.ratio_decimals)
    }

    fn currency(&self, v: Money) -> Money {
        round_half_away(v, self.config.currency_decimals)
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

pub fn round_half_away(v: Money, dp: u32) -> Money {
    v.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero)
}

/// `(current - previous) / |previous|`; undefined when previous is zero.
pub fn growth(current: Money, previous: Money) -> Option<Money> {
    ratio(current - previous, previous.abs())
}

/// Groups by descending total profit; ties by ascending key.
pub fn by_profit_desc(aggregation: &Aggregation) -> Vec<(&GroupKey, &AggregateMetrics)> {
    let mut entries: Vec<_> = aggregation.iter().collect();
    entries.sort_by(|a, b| b.1.total_profit.cmp(&a.1.total_profit).then_with(|| a.0.cmp(b.0)));
    entries
}

/// Groups by leading key component, then descending profit within it.
pub fn leading_key_then_profit_desc(aggregation: &Aggregation) -> Vec<(&GroupKey, &AggregateMetrics)> {
    let mut entries: Vec<_> = aggregation.iter().collect();
    entries.sort_by(|a, b| {
        a.0.parts()
            .first()
            .cmp(&b.0.parts().first())
            .then_with(|| b.1.total_profit.cmp(&a.1.total_profit))
            .then_with(|| a.0.cmp(b.0))
    });
    entries
}
