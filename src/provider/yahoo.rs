//! Market-data provider client.
//!
//! Three endpoints, consumed as black boxes: `quoteSummary` for the company
//! profile modules (crumb-authenticated), the fundamentals `timeseries` for
//! annual statement metrics, and `chart` for the daily closes backing the
//! historical price lookup.
//!
//! The crumb token is fetched lazily once per process: the cookie endpoint
//! is visited to seed the session cookie (it answers 404 but still sets
//! it), then the crumb endpoint returns the token. A stale crumb fails the
//! record like any other provider error; there is no retry.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime, TimeDelta, Utc};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;
use url::Url;

use super::http_client::HttpClient;
use super::{FundamentalsProvider, ProviderError};
use crate::config::AppConfig;
use crate::models::{CompanyProfile, CompanyStatements};
use crate::statement::{FinancialStatement, fields};

const COOKIE_URL: &str = "https://fc.yahoo.com";
const PROFILE_MODULES: &str =
    "price,summaryDetail,defaultKeyStatistics,financialData,assetProfile,quoteType";

/// Metrics requested for the annual income statement. Fallback names are
/// requested alongside the primary ones; the extractor decides which row
/// wins.
fn income_metrics() -> Vec<&'static str> {
    let mut names = vec![
        fields::TOTAL_REVENUE,
        fields::OPERATING_INCOME,
        fields::NET_INCOME,
        fields::DILUTED_SHARES,
    ];
    names.extend_from_slice(fields::DILUTED_SHARES_FALLBACKS);
    names
}

/// Metrics requested for the annual balance sheet.
fn balance_metrics() -> Vec<&'static str> {
    let mut names = vec![
        fields::TOTAL_ASSETS,
        fields::TOTAL_LIABILITIES,
        fields::CURRENT_LIABILITIES,
        fields::CURRENT_ASSETS,
        fields::EQUITY,
        fields::TOTAL_DEBT,
        fields::CASH,
        fields::INVESTMENTS,
    ];
    names.extend_from_slice(fields::TOTAL_LIABILITIES_FALLBACKS);
    names.extend_from_slice(fields::CURRENT_LIABILITIES_FALLBACKS);
    names.extend_from_slice(fields::CURRENT_ASSETS_FALLBACKS);
    names.extend_from_slice(fields::EQUITY_FALLBACKS);
    names.extend_from_slice(fields::CASH_FALLBACKS);
    names.extend_from_slice(fields::INVESTMENTS_FALLBACKS);
    names
}

// ── Provider ──────────────────────────────────────────────────────────────────

pub struct YahooProvider {
    http: HttpClient,
    base_url: String,
    statement_years: i64,
    crumb: Mutex<Option<String>>,
}

impl YahooProvider {
    pub fn new(config: &AppConfig) -> anyhow::Result<Self> {
        Ok(Self {
            http: HttpClient::new(&config.http)?,
            base_url: config.sources.provider_base_url.trim_end_matches('/').to_string(),
            statement_years: config.pipeline.statement_years,
            crumb: Mutex::new(None),
        })
    }

    async fn crumb(&self) -> Result<String, ProviderError> {
        let mut cached = self.crumb.lock().await;
        if let Some(crumb) = cached.as_ref() {
            return Ok(crumb.clone());
        }

        // Seed the session cookie. The endpoint answers 404; only the
        // Set-Cookie matters.
        if let Err(err) = self.http.get_text(parse_url(COOKIE_URL)?).await {
            debug!("cookie priming answered with an error (expected): {err}");
        }

        let crumb_url = parse_url(&format!("{}/v1/test/getcrumb", self.base_url))?;
        let body = self.http.get_text(crumb_url).await?;
        let crumb = body.trim();

        if crumb.is_empty() || crumb.len() >= 100 || crumb.contains(' ') || crumb.contains('<') {
            return Err(ProviderError::Malformed(
                "crumb endpoint did not return a token".to_string(),
            ));
        }

        *cached = Some(crumb.to_string());
        Ok(crumb.to_string())
    }

    async fn fetch_timeseries(
        &self,
        symbol: &str,
        metrics: &[&str],
    ) -> Result<FinancialStatement, ProviderError> {
        let period2 = Utc::now().timestamp();
        let period1 = period2 - self.statement_years * 365 * 86_400;
        let types = metrics
            .iter()
            .map(|name| format!("annual{name}"))
            .collect::<Vec<_>>()
            .join(",");

        let url = Url::parse_with_params(
            &format!(
                "{}/ws/fundamentals-timeseries/v1/finance/timeseries/{symbol}",
                self.base_url
            ),
            &[
                ("symbol", symbol),
                ("type", types.as_str()),
                ("period1", period1.to_string().as_str()),
                ("period2", period2.to_string().as_str()),
            ],
        )
        .map_err(|err| ProviderError::Malformed(format!("bad timeseries url: {err}")))?;

        let resp: TimeseriesResponse = self.http.get_json(url).await?;
        Ok(statement_from_timeseries(resp))
    }
}

#[async_trait]
impl FundamentalsProvider for YahooProvider {
    async fn fetch_profile(&self, symbol: &str) -> Result<CompanyProfile, ProviderError> {
        let crumb = self.crumb().await?;
        let url = Url::parse_with_params(
            &format!("{}/v10/finance/quoteSummary/{symbol}", self.base_url),
            &[("modules", PROFILE_MODULES), ("crumb", crumb.as_str())],
        )
        .map_err(|err| ProviderError::Malformed(format!("bad quoteSummary url: {err}")))?;

        let resp: QuoteSummaryResponse = self.http.get_json(url).await?;
        let result = resp
            .quote_summary
            .result
            .and_then(|results| results.into_iter().next())
            .ok_or_else(|| ProviderError::NoData(symbol.to_string()))?;

        Ok(profile_from_summary(result))
    }

    async fn fetch_statements(&self, symbol: &str) -> Result<CompanyStatements, ProviderError> {
        let income = self.fetch_timeseries(symbol, &income_metrics()).await?;
        let balance = self.fetch_timeseries(symbol, &balance_metrics()).await?;
        Ok(CompanyStatements { income, balance })
    }

    async fn close_price_near(
        &self,
        symbol: &str,
        target: NaiveDate,
        window_days: i64,
    ) -> Result<Option<f64>, ProviderError> {
        let pad = TimeDelta::days(window_days + 1);
        let period1 = (target - pad).and_time(NaiveTime::MIN).and_utc().timestamp();
        let period2 = (target + pad).and_time(NaiveTime::MIN).and_utc().timestamp();

        let url = Url::parse_with_params(
            &format!("{}/v8/finance/chart/{symbol}", self.base_url),
            &[
                ("period1", period1.to_string().as_str()),
                ("period2", period2.to_string().as_str()),
                ("interval", "1d"),
            ],
        )
        .map_err(|err| ProviderError::Malformed(format!("bad chart url: {err}")))?;

        let resp: ChartResponse = self.http.get_json(url).await?;
        Ok(closest_close(resp, target, window_days))
    }
}

fn parse_url(raw: &str) -> Result<Url, ProviderError> {
    Url::parse(raw).map_err(|err| ProviderError::Malformed(format!("bad url {raw:?}: {err}")))
}

// ── Response mapping ──────────────────────────────────────────────────────────

fn profile_from_summary(result: QuoteSummaryResult) -> CompanyProfile {
    let mut profile = CompanyProfile::default();

    if let Some(quote_type) = result.quote_type {
        profile.long_name = quote_type.long_name;
        profile.short_name = quote_type.short_name;
    }

    if let Some(asset_profile) = result.asset_profile {
        profile.sector = asset_profile.sector;
        profile.industry = asset_profile.industry;
        profile.zip = asset_profile.zip;
    }

    if let Some(price) = result.price {
        profile.market_cap = raw(price.market_cap);
        profile.exchange = price.exchange_name;
    }

    if let Some(detail) = result.summary_detail {
        profile.forward_pe = raw(detail.forward_pe);
    }

    if let Some(stats) = result.key_statistics {
        profile.price_to_book = raw(stats.price_to_book);
        if profile.forward_pe.is_none() {
            profile.forward_pe = raw(stats.forward_pe);
        }
    }

    if let Some(financial) = result.financial_data {
        profile.return_on_equity = raw(financial.return_on_equity);
        profile.operating_margin = raw(financial.operating_margins);
        profile.profit_margin = raw(financial.profit_margins);
    }

    profile
}

fn statement_from_timeseries(resp: TimeseriesResponse) -> FinancialStatement {
    let mut cells = Vec::new();

    for block in resp.timeseries.result.unwrap_or_default() {
        for (key, series) in block.series {
            let field = match key.strip_prefix("annual") {
                Some(stripped) => stripped.to_string(),
                None => key.clone(),
            };

            for cell in series.into_iter().flatten() {
                let value = cell.reported_value.and_then(|v| v.raw);
                let (Some(date_str), Some(value)) = (cell.as_of_date, value) else {
                    continue;
                };
                if let Ok(date) = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d") {
                    cells.push((field.clone(), date, value));
                }
            }
        }
    }

    FinancialStatement::from_cells(cells)
}

fn closest_close(resp: ChartResponse, target: NaiveDate, window_days: i64) -> Option<f64> {
    let result = resp.chart.result?.into_iter().next()?;
    let quote = result.indicators.quote.into_iter().next()?;

    let mut best: Option<(i64, f64)> = None;
    for (ts, close) in result.timestamp.iter().zip(quote.close.iter()) {
        let Some(close) = close else { continue };
        let Some(date) = chrono::DateTime::from_timestamp(*ts, 0) else {
            continue;
        };
        let distance = (date.date_naive() - target).num_days().abs();
        if distance <= window_days && best.is_none_or(|(d, _)| distance < d) {
            best = Some((distance, *close));
        }
    }

    best.map(|(_, close)| close)
}

fn raw(value: Option<RawNum>) -> Option<f64> {
    value.and_then(|v| v.raw)
}

// ── Wire types ────────────────────────────────────────────────────────────────

/// `{ raw, fmt }` number wrapper used across the provider's payloads.
#[derive(Debug, Deserialize)]
struct RawNum {
    raw: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct QuoteSummaryResponse {
    #[serde(rename = "quoteSummary")]
    quote_summary: QuoteSummaryBody,
}

#[derive(Debug, Deserialize)]
struct QuoteSummaryBody {
    result: Option<Vec<QuoteSummaryResult>>,
}

#[derive(Debug, Default, Deserialize)]
struct QuoteSummaryResult {
    price: Option<PriceModule>,
    #[serde(rename = "summaryDetail")]
    summary_detail: Option<SummaryDetailModule>,
    #[serde(rename = "defaultKeyStatistics")]
    key_statistics: Option<KeyStatisticsModule>,
    #[serde(rename = "financialData")]
    financial_data: Option<FinancialDataModule>,
    #[serde(rename = "assetProfile")]
    asset_profile: Option<AssetProfileModule>,
    #[serde(rename = "quoteType")]
    quote_type: Option<QuoteTypeModule>,
}

#[derive(Debug, Deserialize)]
struct PriceModule {
    #[serde(rename = "marketCap")]
    market_cap: Option<RawNum>,
    #[serde(rename = "exchangeName")]
    exchange_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SummaryDetailModule {
    #[serde(rename = "forwardPE")]
    forward_pe: Option<RawNum>,
}

#[derive(Debug, Deserialize)]
struct KeyStatisticsModule {
    #[serde(rename = "priceToBook")]
    price_to_book: Option<RawNum>,
    #[serde(rename = "forwardPE")]
    forward_pe: Option<RawNum>,
}

#[derive(Debug, Deserialize)]
struct FinancialDataModule {
    #[serde(rename = "returnOnEquity")]
    return_on_equity: Option<RawNum>,
    #[serde(rename = "operatingMargins")]
    operating_margins: Option<RawNum>,
    #[serde(rename = "profitMargins")]
    profit_margins: Option<RawNum>,
}

#[derive(Debug, Deserialize)]
struct AssetProfileModule {
    sector: Option<String>,
    industry: Option<String>,
    zip: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QuoteTypeModule {
    #[serde(rename = "longName")]
    long_name: Option<String>,
    #[serde(rename = "shortName")]
    short_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TimeseriesResponse {
    timeseries: TimeseriesBody,
}

#[derive(Debug, Deserialize)]
struct TimeseriesBody {
    result: Option<Vec<TimeseriesBlock>>,
}

#[derive(Debug, Deserialize)]
struct TimeseriesBlock {
    #[serde(default)]
    meta: serde_json::Value,
    #[serde(default)]
    timestamp: Option<Vec<i64>>,
    #[serde(flatten)]
    series: HashMap<String, Vec<Option<TimeseriesCell>>>,
}

#[derive(Debug, Deserialize)]
struct TimeseriesCell {
    #[serde(rename = "asOfDate")]
    as_of_date: Option<String>,
    #[serde(rename = "reportedValue")]
    reported_value: Option<RawNum>,
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartResult>>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    quote: Vec<ChartQuote>,
}

#[derive(Debug, Deserialize)]
struct ChartQuote {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn timeseries_payload_becomes_a_statement() {
        let json = r#"{
            "timeseries": {
                "result": [
                    {
                        "meta": {"symbol": ["7203.T"], "type": ["annualTotalRevenue"]},
                        "timestamp": [1711843200, 1743379200],
                        "annualTotalRevenue": [
                            {"asOfDate": "2024-03-31", "reportedValue": {"raw": 45.1e12, "fmt": "45.1T"}},
                            {"asOfDate": "2025-03-31", "reportedValue": {"raw": 48.0e12, "fmt": "48T"}}
                        ]
                    },
                    {
                        "meta": {"symbol": ["7203.T"], "type": ["annualNetIncome"]},
                        "timestamp": [1743379200],
                        "annualNetIncome": [
                            null,
                            {"asOfDate": "2025-03-31", "reportedValue": {"raw": 4.9e12, "fmt": "4.9T"}}
                        ]
                    }
                ],
                "error": null
            }
        }"#;

        let resp: TimeseriesResponse = serde_json::from_str(json).unwrap();
        let stmt = statement_from_timeseries(resp);

        assert_eq!(stmt.periods(), &[date(2025, 3, 31), date(2024, 3, 31)]);
        assert_eq!(stmt.latest("TotalRevenue"), Some(48.0e12));
        assert_eq!(stmt.value_at("TotalRevenue", 1), Some(45.1e12));
        assert_eq!(stmt.latest("NetIncome"), Some(4.9e12));
        assert_eq!(stmt.value_at("NetIncome", 1), None);
    }

    #[test]
    fn empty_timeseries_yields_empty_statement() {
        let resp: TimeseriesResponse =
            serde_json::from_str(r#"{"timeseries": {"result": null, "error": null}}"#).unwrap();
        assert!(statement_from_timeseries(resp).is_empty());
    }

    #[test]
    fn profile_mapping_pulls_each_module() {
        let json = r#"{
            "quoteSummary": {
                "result": [{
                    "price": {"marketCap": {"raw": 4.5e13}, "exchangeName": "Tokyo"},
                    "summaryDetail": {"forwardPE": {"raw": 9.8}},
                    "defaultKeyStatistics": {"priceToBook": {"raw": 1.1}},
                    "financialData": {
                        "returnOnEquity": {"raw": 0.11},
                        "operatingMargins": {"raw": 0.1},
                        "profitMargins": {"raw": 0.08}
                    },
                    "assetProfile": {"sector": "Consumer Cyclical", "industry": "Auto Manufacturers", "zip": "471-8571"},
                    "quoteType": {"longName": "Toyota Motor Corporation", "shortName": "TOYOTA"}
                }],
                "error": null
            }
        }"#;

        let resp: QuoteSummaryResponse = serde_json::from_str(json).unwrap();
        let profile = profile_from_summary(resp.quote_summary.result.unwrap().remove(0));

        assert_eq!(profile.long_name.as_deref(), Some("Toyota Motor Corporation"));
        assert_eq!(profile.market_cap, Some(4.5e13));
        assert_eq!(profile.forward_pe, Some(9.8));
        assert_eq!(profile.price_to_book, Some(1.1));
        assert_eq!(profile.return_on_equity, Some(0.11));
        assert_eq!(profile.zip.as_deref(), Some("471-8571"));
        assert_eq!(profile.exchange.as_deref(), Some("Tokyo"));
    }

    #[test]
    fn missing_modules_leave_the_profile_blank() {
        let json = r#"{"quoteSummary": {"result": [{}], "error": null}}"#;
        let resp: QuoteSummaryResponse = serde_json::from_str(json).unwrap();
        let profile = profile_from_summary(resp.quote_summary.result.unwrap().remove(0));
        assert_eq!(profile, CompanyProfile::default());
    }

    #[test]
    fn closest_close_respects_the_window() {
        // 2024-03-29 and 2024-04-03 around a 2024-03-31 target
        let resp: ChartResponse = serde_json::from_str(
            r#"{
                "chart": {
                    "result": [{
                        "timestamp": [1711670400, 1712102400],
                        "indicators": {"quote": [{"close": [2500.0, 2550.0]}]}
                    }],
                    "error": null
                }
            }"#,
        )
        .unwrap();

        assert_eq!(closest_close(resp, date(2024, 3, 31), 3), Some(2500.0));
    }

    #[test]
    fn closest_close_skips_null_bars_and_far_dates() {
        let resp: ChartResponse = serde_json::from_str(
            r#"{
                "chart": {
                    "result": [{
                        "timestamp": [1711670400, 1712102400],
                        "indicators": {"quote": [{"close": [null, 2550.0]}]}
                    }],
                    "error": null
                }
            }"#,
        )
        .unwrap();

        // only the null bar is inside ±1 day of the target
        assert_eq!(closest_close(resp, date(2024, 3, 30), 1), None);
    }
}
