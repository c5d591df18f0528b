//! Exchange listing source: the published spreadsheet of listed companies.
//!
//! The exchange serves one `.xls` with every listed instrument; the listing
//! command keeps the three domestic-equity segments and reshapes the rows
//! into [`StockRecord`]s.

use std::io::Cursor;

use anyhow::{Context, Result, anyhow};
use calamine::{Reader, open_workbook_auto_from_rs};
use tracing::{info, warn};
use url::Url;

use crate::config::SourcesConfig;
use crate::models::{StockCode, StockRecord};
use crate::provider::http_client::HttpClient;

/// Column titles as published in the spreadsheet header row.
const CODE_COLUMN: &str = "コード";
const NAME_COLUMN: &str = "銘柄名";
const SEGMENT_COLUMN: &str = "市場・商品区分";
const INDUSTRY_COLUMN: &str = "33業種区分";

/// Download and parse the exchange listing.
pub async fn fetch_listing(
    config: &SourcesConfig,
    client: &HttpClient,
) -> Result<Vec<StockRecord>> {
    let url = Url::parse(&config.listing_url)
        .with_context(|| format!("Bad listing url {:?}", config.listing_url))?;

    info!("Downloading listing spreadsheet ({url})");
    let bytes = client
        .get_bytes(url)
        .await
        .context("Failed to download the listing spreadsheet")?;

    let records = parse_listing(&bytes, &config.segments)?;
    info!("{} companies in the selected segments", records.len());
    Ok(records)
}

/// Decode the spreadsheet and keep rows whose segment is selected.
fn parse_listing(bytes: &[u8], segments: &[String]) -> Result<Vec<StockRecord>> {
    let cursor = Cursor::new(bytes);
    let mut workbook = open_workbook_auto_from_rs(cursor)
        .map_err(|err| anyhow!("Failed to open the listing spreadsheet: {err}"))?;

    let sheet_names = workbook.sheet_names().to_vec();
    let first = sheet_names
        .first()
        .ok_or_else(|| anyhow!("Listing spreadsheet has no sheets"))?;

    let range = workbook
        .worksheet_range(first)
        .map_err(|err| anyhow!("Failed to read sheet {first:?}: {err}"))?;

    let rows: Vec<Vec<String>> = range.rows().map(decode_row).collect();
    records_from_rows(rows, segments)
}

fn records_from_rows(rows: Vec<Vec<String>>, segments: &[String]) -> Result<Vec<StockRecord>> {
    let mut rows = rows.into_iter();
    let header = rows.next().ok_or_else(|| anyhow!("Listing spreadsheet is empty"))?;

    let code_idx = column(&header, CODE_COLUMN)?;
    let name_idx = column(&header, NAME_COLUMN)?;
    let segment_idx = column(&header, SEGMENT_COLUMN)?;
    let industry_idx = column(&header, INDUSTRY_COLUMN)?;

    let mut records = Vec::new();
    for row in rows {
        let Some(segment) = row.get(segment_idx) else {
            continue;
        };
        if !segments.iter().any(|wanted| wanted == segment) {
            continue;
        }

        let code = row.get(code_idx).map(|s| s.trim()).unwrap_or_default();
        if code.is_empty() {
            warn!("Listing row without a code skipped: {row:?}");
            continue;
        }

        records.push(StockRecord {
            code: StockCode::new(code),
            name: row
                .get(name_idx)
                .map(|s| s.trim().to_string())
                .unwrap_or_default(),
            market_segment: segment.clone(),
            industry: row
                .get(industry_idx)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            market_type: None,
        });
    }

    Ok(records)
}

fn decode_row(row: &[calamine::Data]) -> Vec<String> {
    row.iter()
        .map(|cell| match cell {
            calamine::Data::String(s) => s.clone(),
            calamine::Data::Float(f) => format!("{}", f),
            calamine::Data::Int(i) => format!("{}", i),
            calamine::Data::Bool(b) => format!("{}", b),
            calamine::Data::DateTime(dt) => format!("{}", dt),
            calamine::Data::Error(e) => format!("{:?}", e),
            calamine::Data::Empty => String::new(),
            _ => String::new(),
        })
        .collect()
}

fn column(header: &[String], title: &str) -> Result<usize> {
    header
        .iter()
        .position(|cell| cell.trim() == title)
        .ok_or_else(|| anyhow!("Column {title:?} not found in the spreadsheet header"))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn segments() -> Vec<String> {
        vec![
            "プライム（内国株式）".to_string(),
            "スタンダード（内国株式）".to_string(),
            "グロース（内国株式）".to_string(),
        ]
    }

    fn header() -> Vec<String> {
        ["日付", "コード", "銘柄名", "市場・商品区分", "33業種コード", "33業種区分"]
            .map(str::to_string)
            .to_vec()
    }

    fn row(code: &str, name: &str, segment: &str, industry: &str) -> Vec<String> {
        ["20250801", code, name, segment, "3700", industry]
            .map(str::to_string)
            .to_vec()
    }

    #[test]
    fn keeps_only_selected_segments() {
        let rows = vec![
            header(),
            row("7203", "トヨタ自動車", "プライム（内国株式）", "輸送用機器"),
            row("1305", "ｉＦｒｅｅＥＴＦ", "ETF・ETN", "-"),
            row("130A", "Ｖｅｒｉｔａｓ", "グロース（内国株式）", "情報・通信業"),
        ];

        let records = records_from_rows(rows, &segments()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].code.as_str(), "7203");
        assert_eq!(records[0].market_segment, "プライム（内国株式）");
        assert_eq!(records[0].industry.as_deref(), Some("輸送用機器"));
        assert_eq!(records[1].code.as_str(), "130A");
        assert_eq!(records[1].market_type, None);
    }

    #[test]
    fn missing_column_is_an_error() {
        let rows = vec![vec!["コード".to_string(), "銘柄名".to_string()]];
        assert!(records_from_rows(rows, &segments()).is_err());
    }

    #[test]
    fn numeric_cells_decode_without_a_trailing_fraction() {
        let decoded = decode_row(&[
            calamine::Data::Float(7203.0),
            calamine::Data::String("トヨタ自動車".to_string()),
            calamine::Data::Empty,
        ]);
        assert_eq!(decoded, vec!["7203", "トヨタ自動車", ""]);
    }
}
