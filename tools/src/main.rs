//! ledger-runner: headless report runner for the transaction ledger.
//!
//! Usage:
//!   ledger-runner --synthetic 5000 --seed 42
//!   ledger-runner --db ledger.db --import orders.json --config report.json
//!   ledger-runner --db ledger.db --format json
//!
//! Without --import or --synthetic, the latest snapshot in --db is reported.

use anyhow::{bail, Result};
use ledger_core::{
    config::ReportConfig,
    record::parse_ledger_json,
    report::{AnalysisReport, ReportRow, ReportSession},
    sample::synthetic_ledger,
    store::{LedgerStore, ScanFilter},
};
use std::env;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Json,
    Text,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let db = string_arg(&args, "--db").unwrap_or(":memory:");
    let import = string_arg(&args, "--import");
    let synthetic = parse_arg(&args, "--synthetic", 0usize);
    let seed = parse_arg(&args, "--seed", 42u64);
    let format = match string_arg(&args, "--format").unwrap_or("text") {
        "json" => OutputFormat::Json,
        "text" => OutputFormat::Text,
        other => bail!("unknown --format '{other}' (expected json or text)"),
    };

    let config = match string_arg(&args, "--config") {
        Some(path) => ReportConfig::load(path)?,
        None => ReportConfig::default(),
    };

    let store = LedgerStore::open(db)?;
    store.migrate()?;

    let snapshot_id = if let Some(path) = import {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let records = parse_ledger_json(&content)?;
        store.import_snapshot(path, &records)?
    } else if synthetic > 0 {
        let records = synthetic_ledger(seed, synthetic);
        store.import_snapshot(&format!("synthetic-{seed}-{synthetic}"), &records)?
    } else {
        match store.latest_snapshot()? {
            Some(id) => id,
            None => bail!("no snapshot in {db}; pass --import FILE or --synthetic N"),
        }
    };

    let view = store.snapshot(&snapshot_id)?;
    let session = ReportSession::from_source(&view, &ScanFilter::all(), config)?;
    let report = session.run()?;
    log::info!(
        "report built for snapshot {} ({} records)",
        snapshot_id,
        session.records().len()
    );

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => print_summary(&snapshot_id, &report),
    }
    Ok(())
}

fn print_summary(snapshot_id: &str, report: &AnalysisReport) {
    let o = &report.overall;
    println!("=== LEDGER SUMMARY ===");
    println!("  snapshot:       {snapshot_id}");
    println!("  transactions:   {}", o.transaction_count);
    println!("  units:          {}", o.total_units);
    println!("  sales:          {}", o.total_sales);
    println!("  profit:         {}", o.total_profit);
    println!("  margin:         {}", pct(o.profit_margin));
    println!("  avg order:      {}", o.average_order_value);
    println!("  products:       {}", o.distinct_products);
    if let (Some(first), Some(last)) = (o.first_order, o.last_order) {
        println!("  period:         {first} .. {last}");
    }

    println!();
    println!("=== YEARLY TREND ===");
    for t in &report.yearly_trend {
        println!(
            "  {} | Sales: {} | Profit: {} | Margin: {} | Growth: {}",
            t.row.key.join(" / "),
            t.row.total_sales,
            t.row.total_profit,
            pct(t.row.profit_margin),
            pct(t.sales_growth),
        );
    }

    section("CATEGORY BREAKDOWN", &report.category_breakdown);
    section("REGION BREAKDOWN", &report.region_breakdown);
    section("TOP PRODUCTS", &report.top_products);

    let ml = &report.margin_light_products;
    println!();
    println!(
        "=== MARGIN-LIGHT PRODUCTS (units >= {} {}, margin <= {} {}) ===",
        ml.volume_statistic,
        ml.volume_benchmark,
        ml.margin_statistic,
        pct(Some(ml.margin_benchmark)),
    );
    print_rows(&ml.rows);

    println!();
    println!("=== LOW-MARGIN MONTHS ({}) ===", report.low_margin_months.rule);
    print_rows(&report.low_margin_months.rows);

    println!();
    println!("=== UNPROFITABLE PRODUCTS ({}) ===", report.unprofitable_products.rule);
    print_rows(&report.unprofitable_products.rows);
}

fn section(title: &str, rows: &[ReportRow]) {
    println!();
    println!("=== {title} ===");
    print_rows(rows);
}

fn print_rows(rows: &[ReportRow]) {
    if rows.is_empty() {
        println!("  (none)");
        return;
    }
    for r in rows {
        println!(
            "  {} | Units: {} | Sales: {} | Profit: {} | Margin: {} | Share: {}",
            r.key.join(" / "),
            r.total_units,
            r.total_sales,
            r.total_profit,
            pct(r.profit_margin),
            pct(r.profit_share),
        );
    }
}

fn pct(ratio: Option<ledger_core::types::Money>) -> String {
    match ratio {
        Some(r) => format!("{:.2}%", r * ledger_core::types::Money::ONE_HUNDRED),
        None => "n/a".to_string(),
    }
}

fn string_arg<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
