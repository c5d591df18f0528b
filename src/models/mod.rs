use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

use crate::statement::FinancialStatement;

// ── Market type ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketType {
    #[serde(rename = "JP")]
    Jp,
    #[serde(rename = "US")]
    Us,
}

impl fmt::Display for MarketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketType::Jp => f.write_str("JP"),
            MarketType::Us => f.write_str("US"),
        }
    }
}

// ── Stock code ────────────────────────────────────────────────────────────────

/// Security code as it appears in listing files.
///
/// The exchange spreadsheet yields plain integers for numeric codes (7203)
/// and strings for alphanumeric ones ("130A"); the registry always yields
/// strings. Both forms deserialize into the same type and serialize back as
/// a string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct StockCode(String);

impl StockCode {
    pub fn new(code: impl Into<String>) -> Self {
        StockCode(code.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StockCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for StockCode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct CodeVisitor;

        impl Visitor<'_> for CodeVisitor {
            type Value = StockCode;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a stock code as a string or an integer")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<StockCode, E> {
                Ok(StockCode::new(v))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<StockCode, E> {
                Ok(StockCode(v.to_string()))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<StockCode, E> {
                Ok(StockCode(v.to_string()))
            }

            // Spreadsheet round-trips can surface 7203 as 7203.0.
            fn visit_f64<E: de::Error>(self, v: f64) -> Result<StockCode, E> {
                if v.fract() == 0.0 {
                    Ok(StockCode((v as i64).to_string()))
                } else {
                    Ok(StockCode(v.to_string()))
                }
            }
        }

        deserializer.deserialize_any(CodeVisitor)
    }
}

// ── Stock record ──────────────────────────────────────────────────────────────

/// One listed company, as produced by the listing commands and consumed by
/// `summarize`. Identity is the code.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StockRecord {
    pub code: StockCode,
    pub name: String,
    #[serde(default)]
    pub market_segment: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_type: Option<MarketType>,
}

// ── Company profile ───────────────────────────────────────────────────────────

/// Info blob returned by the market-data provider. Every field is optional;
/// absence here is ordinary, not an error.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompanyProfile {
    pub long_name: Option<String>,
    pub short_name: Option<String>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub exchange: Option<String>,
    pub zip: Option<String>,
    pub market_cap: Option<f64>,
    pub price_to_book: Option<f64>,
    pub forward_pe: Option<f64>,
    pub return_on_equity: Option<f64>,
    pub operating_margin: Option<f64>,
    pub profit_margin: Option<f64>,
}

/// The two annual statements the extractor reads. A failed statement fetch
/// degrades to empty tables; the profile alone still yields a snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompanyStatements {
    pub income: FinancialStatement,
    pub balance: FinancialStatement,
}

// ── Financial snapshot ────────────────────────────────────────────────────────

/// Flat per-company output row. Field order is the CSV column order; absent
/// values serialize as empty cells, never as zero.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FinancialSnapshot {
    pub company_name: Option<String>,
    pub code: StockCode,
    pub industry: Option<String>,
    pub market_segment: String,
    pub fiscal_period: Option<String>,
    pub prefecture: Option<String>,
    pub market_cap: Option<f64>,
    pub price_to_book: Option<f64>,
    pub revenue: Option<f64>,
    pub operating_income: Option<f64>,
    pub operating_margin: Option<f64>,
    pub net_income: Option<f64>,
    pub profit_margin: Option<f64>,
    pub roe: Option<f64>,
    pub equity_ratio: Option<f64>,
    pub forward_pe: Option<f64>,
    pub total_liabilities: Option<f64>,
    pub current_liabilities: Option<f64>,
    pub current_assets: Option<f64>,
    pub total_debt: Option<f64>,
    pub cash_and_equivalents: Option<f64>,
    pub investments: Option<f64>,
    pub net_cash: Option<f64>,
    pub net_cash_ratio: Option<f64>,
    pub prior_year_eps: Option<f64>,
    pub prior_year_pe: Option<f64>,
}

// ── Tests ─────────────────────────────────────────────────────────────────────
