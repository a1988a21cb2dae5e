//! Benchmark and outlier classifier tests.

use chrono::NaiveDate;
use ledger_core::{
    aggregation::{aggregate_by, Aggregation, Dimension, GroupBy, GroupKey},
    benchmark::{benchmark, mean, percentile, Metric, Statistic},
    classifier::{classify, detect_outliers, OutlierRule, Tail},
    error::LedgerError,
    record::TransactionRecord,
    sample::synthetic_ledger,
    types::Money,
};
use rust_decimal_macros::dec;

// ── Helpers ──────────────────────────────────────────────────────────────────

fn rec(product: &str, qty: u32, sales: Money, profit: Money) -> TransactionRecord {
    TransactionRecord {
        order_date: NaiveDate::from_ymd_opt(2023, 6, 1).unwrap(),
        product_name: product.into(),
        category: "General".into(),
        region: "West".into(),
        quantity: qty,
        sales,
        profit,
    }
}

fn by_product(records: &[TransactionRecord]) -> Aggregation {
    aggregate_by(records, |_| true, &GroupBy::by(Dimension::Product))
}

/// A:(50 units, 0.20), B:(120, 0.10), C:(90, 0.05).
fn three_products() -> Vec<TransactionRecord> {
    vec![
        rec("A", 50, dec!(100), dec!(20)),
        rec("B", 120, dec!(100), dec!(10)),
        rec("C", 90, dec!(100), dec!(5)),
    ]
}

fn keys(flagged: &[ledger_core::classifier::FlaggedEntity]) -> Vec<String> {
    flagged.iter().map(|f| f.key.to_string()).collect()
}

// ── Benchmarks ───────────────────────────────────────────────────────────────

#[test]
fn continuous_percentile_matches_reference_values() {
    let v = [dec!(1), dec!(2), dec!(3), dec!(4)];
    assert_eq!(percentile(&v, dec!(0.5)).unwrap(), dec!(2.5));
    assert_eq!(percentile(&v, dec!(0.25)).unwrap(), dec!(1.75));
    assert_eq!(mean(&v).unwrap(), dec!(2.5));
}

/// Zero-sales entities are excluded from margin benchmarks, not treated as 0.
#[test]
fn undefined_margins_do_not_enter_benchmarks() {
    let mut records = three_products();
    records.push(rec("Freebie", 500, dec!(0), dec!(0)));
    let agg = by_product(&records);

    let bm = benchmark(&agg, Metric::Margin, Statistic::Mean).unwrap();
    assert_eq!(bm.sample_size, 3);
    assert_eq!(bm.value.round_dp(10), dec!(0.1166666667));

    let p25 = benchmark(&agg, Metric::Margin, Statistic::Percentile(dec!(0.25))).unwrap();
    assert_eq!(p25.value, dec!(0.075));
}

#[test]
fn benchmark_over_only_undefined_values_is_empty_input() {
    let agg = by_product(&[rec("Freebie", 5, dec!(0), dec!(0))]);
    let err = benchmark(&agg, Metric::Margin, Statistic::Percentile(dec!(0.5))).unwrap_err();
    match err {
        LedgerError::EmptyInput { metric } => assert_eq!(metric, "profit_margin"),
        other => panic!("expected EmptyInput, got {other:?}"),
    }
}

// ── Classifier ───────────────────────────────────────────────────────────────

/// Volume benchmark = mean(50, 120, 90) = 86.67, margin benchmark = p25 of
/// [0.05, 0.10, 0.20] = 0.075. B fails the margin test, A fails volume,
/// C passes both.
#[test]
fn three_product_scenario_flags_only_c() {
    let agg = by_product(&three_products());
    let report = detect_outliers(&agg, &OutlierRule::default()).unwrap();

    assert_eq!(report.volume_benchmark.value.round_dp(1), dec!(86.7));
    assert_eq!(report.margin_benchmark.value, dec!(0.075));
    assert_eq!(keys(&report.flagged), vec!["C"]);
    assert_eq!(report.flagged[0].margin, dec!(0.05));
}

/// A zero-sales product is excluded from classification entirely, even
/// when its volume would otherwise qualify.
#[test]
fn zero_sales_product_is_never_flagged() {
    let mut records = three_products();
    records.push(rec("Freebie", 10_000, dec!(0), dec!(0)));
    let agg = by_product(&records);

    let flagged = classify(&agg, dec!(0), dec!(1_000_000), Tail::HighVolumeLowMargin);
    assert!(!keys(&flagged).contains(&"Freebie".to_string()));
    assert_eq!(flagged.len(), 3);

    let report = detect_outliers(&agg, &OutlierRule::default()).unwrap();
    assert!(report.flagged.iter().all(|f| f.key != GroupKey::label("Freebie")));
    assert_eq!(report.volume_benchmark.sample_size, 3);
}

/// Ascending margin, then descending volume, then key.
#[test]
fn flagged_entities_order_by_margin_then_volume() {
    let records = vec![
        rec("P1", 100, dec!(100), dec!(5)),
        rec("P2", 300, dec!(100), dec!(5)),
        rec("P3", 200, dec!(100), dec!(1)),
        rec("P4", 300, dec!(100), dec!(5)),
    ];
    let agg = by_product(&records);
    let flagged = classify(&agg, dec!(0), dec!(1), Tail::HighVolumeLowMargin);
    assert_eq!(keys(&flagged), vec!["P3", "P2", "P4", "P1"]);

    // Same input, same order.
    let again = classify(&agg, dec!(0), dec!(1), Tail::HighVolumeLowMargin);
    assert_eq!(flagged, again);
}

/// Comparisons are inclusive on both benchmarks.
#[test]
fn benchmark_boundaries_are_inclusive() {
    let agg = by_product(&[rec("Edge", 80, dec!(100), dec!(10))]);
    let flagged = classify(&agg, dec!(80), dec!(0.1), Tail::HighVolumeLowMargin);
    assert_eq!(keys(&flagged), vec!["Edge"]);
}

/// Raising the margin percentile never shrinks the flagged set.
#[test]
fn outlier_set_is_monotone_in_margin_percentile() {
    let agg = by_product(&synthetic_ledger(5, 4_000));

    let mut previous: Vec<String> = Vec::new();
    for p in [dec!(0.10), dec!(0.25), dec!(0.50), dec!(0.75), dec!(1)] {
        let rule = OutlierRule { margin: Statistic::Percentile(p), ..OutlierRule::default() };
        let current = keys(&detect_outliers(&agg, &rule).unwrap().flagged);
        for k in &previous {
            assert!(current.contains(k), "{k} dropped when raising percentile to {p}");
        }
        previous = current;
    }
}

/// Opposite tail: low volume, high margin; descending margin first.
#[test]
fn low_volume_high_margin_tail() {
    let agg = by_product(&three_products());
    let rule = OutlierRule {
        volume: Statistic::Mean,
        margin: Statistic::Percentile(dec!(0.5)),
        tail: Tail::LowVolumeHighMargin,
    };
    let report = detect_outliers(&agg, &rule).unwrap();
    // units <= 86.67 and margin >= 0.10: only A.
    assert_eq!(keys(&report.flagged), vec!["A"]);
}

/// Opposite tail order: descending margin, then ascending units, then key.
#[test]
fn low_volume_high_margin_order_breaks_ties_by_units_then_key() {
    let records = vec![
        rec("P1", 10, dec!(100), dec!(50)),
        rec("P2", 5, dec!(100), dec!(50)),
        rec("P3", 8, dec!(100), dec!(90)),
        rec("P4", 5, dec!(100), dec!(50)),
        rec("P5", 2, dec!(100), dec!(20)),
    ];
    let agg = by_product(&records);
    let flagged = classify(&agg, dec!(100), dec!(0.5), Tail::LowVolumeHighMargin);
    // P5 sits below the margin benchmark.
    assert_eq!(keys(&flagged), vec!["P3", "P2", "P4", "P1"]);
}

#[test]
fn outliers_over_empty_aggregation_fail_with_empty_input() {
    let agg = by_product(&[]);
    let err = detect_outliers(&agg, &OutlierRule::default()).unwrap_err();
    assert!(matches!(err, LedgerError::EmptyInput { .. }));
}
