//! Flat-file output: listing JSON arrays and timestamped snapshot CSVs.
//!
//! Output is written once, after a whole batch finishes; re-running a batch
//! creates a new timestamped file instead of mutating a previous one.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use csv::Writer;
use tracing::info;

use crate::models::{FinancialSnapshot, StockRecord};

/// Write a listing (or chunk) as a pretty-printed JSON array.
pub fn write_records_json(path: &Path, records: &[StockRecord]) -> Result<()> {
    ensure_parent(path)?;

    let file = File::create(path).with_context(|| format!("Could not create {path:?}"))?;
    serde_json::to_writer_pretty(BufWriter::new(file), records)
        .with_context(|| format!("Could not write {path:?}"))?;
    Ok(())
}

/// Snapshot file path: `{dir}/financials_{stem}_{YYYYMMDD_HHMMSS}.csv`,
/// where the stem drops the listing's `stocks_` prefix.
pub fn snapshot_csv_path(dir: &Path, input: &Path, now: DateTime<Local>) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("stocks");
    let base = stem.replace("stocks_", "");

    dir.join(format!("financials_{}_{}.csv", base, now.format("%Y%m%d_%H%M%S")))
}

/// Write the snapshot batch as CSV. Column order is the struct's field
/// order; absent values become empty cells.
pub fn write_snapshots_csv(
    dir: &Path,
    input: &Path,
    snapshots: &[FinancialSnapshot],
) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("Could not create dir {dir:?}"))?;
    let path = snapshot_csv_path(dir, input, Local::now());

    let mut writer = Writer::from_path(&path).with_context(|| format!("Could not create {path:?}"))?;
    for snapshot in snapshots {
        writer
            .serialize(snapshot)
            .with_context(|| format!("Could not write the row for {}", snapshot.code))?;
    }
    writer.flush().with_context(|| format!("Could not flush {path:?}"))?;

    info!("Saved {} rows to {:?}", snapshots.len(), path);
    Ok(path)
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).with_context(|| format!("Could not create dir {parent:?}"))?;
        }
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StockCode;
    use chrono::TimeZone;

    fn snapshot(code: &str) -> FinancialSnapshot {
        FinancialSnapshot {
            company_name: Some("Example Motor".to_string()),
            code: StockCode::new(code),
            industry: Some("Autos".to_string()),
            market_segment: "Prime".to_string(),
            fiscal_period: Some("2025-03-31".to_string()),
            prefecture: None,
            market_cap: Some(2_000_000.0),
            price_to_book: Some(1.1),
            revenue: None,
            operating_income: None,
            operating_margin: None,
            net_income: None,
            profit_margin: None,
            roe: None,
            equity_ratio: Some(0.4),
            forward_pe: None,
            total_liabilities: Some(3_000_000.0),
            current_liabilities: None,
            current_assets: Some(10_000_000.0),
            total_debt: None,
            cash_and_equivalents: None,
            investments: None,
            net_cash: Some(7_000_000.0),
            net_cash_ratio: Some(3.5),
            prior_year_eps: None,
            prior_year_pe: None,
        }
    }

    #[test]
    fn snapshot_path_drops_the_listing_prefix() {
        let now = Local.with_ymd_and_hms(2026, 8, 7, 12, 30, 5).unwrap();
        assert_eq!(
            snapshot_csv_path(Path::new("export"), Path::new("stocks_1.json"), now),
            Path::new("export/financials_1_20260807_123005.csv")
        );
        assert_eq!(
            snapshot_csv_path(Path::new("export"), Path::new("us_stocks_all.json"), now),
            Path::new("export/financials_us_all_20260807_123005.csv")
        );
    }

    #[test]
    fn csv_keeps_the_fixed_column_order_and_empty_absences() {
        let dir = std::env::temp_dir().join(format!("jpx_storage_test_{}", std::process::id()));
        let path = write_snapshots_csv(&dir, Path::new("stocks_sample.json"), &[snapshot("7203")])
            .unwrap();

        let body = fs::read_to_string(&path).unwrap();
        let mut lines = body.lines();
        let header = lines.next().unwrap();

        assert!(header.starts_with("company_name,code,industry,market_segment,fiscal_period"));
        assert!(header.ends_with("net_cash,net_cash_ratio,prior_year_eps,prior_year_pe"));

        let row = lines.next().unwrap();
        assert!(row.starts_with("Example Motor,7203,Autos,Prime,2025-03-31,"));
        // absent revenue stays an empty cell between market fields
        assert!(row.contains(",1.1,,,,"));

        fs::remove_dir_all(&dir).unwrap();
    }
}
