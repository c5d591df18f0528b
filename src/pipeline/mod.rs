//! Snapshot pipeline: listing JSON → per-company fundamentals → one CSV.
//!
//! Companies are visited strictly one at a time, with the provider's polite
//! delay between calls and a longer pause between companies. A provider
//! failure drops that one company (logged, counted); a statement failure
//! degrades to empty tables; field-level absence is ordinary data. Only a
//! missing or malformed input file aborts the run.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::loader;
use crate::market;
use crate::metrics;
use crate::models::{CompanyProfile, CompanyStatements, FinancialSnapshot, StockRecord};
use crate::provider::yahoo::YahooProvider;
use crate::provider::{FundamentalsProvider, ProviderError};
use crate::sources::postal::PostalClient;
use crate::statement::{FinancialStatement, fields};
use crate::storage;
use crate::utils;

pub struct Pipeline {
    config: AppConfig,
    provider: Box<dyn FundamentalsProvider>,
    postal: Option<PostalClient>,
}

impl Pipeline {
    pub fn new(config: AppConfig) -> Result<Self> {
        let provider = YahooProvider::new(&config)?;
        let postal = PostalClient::new(&config)?;
        Ok(Self::with_provider(config, Box::new(provider), Some(postal)))
    }

    /// Assemble a pipeline over any provider implementation.
    pub fn with_provider(
        config: AppConfig,
        provider: Box<dyn FundamentalsProvider>,
        postal: Option<PostalClient>,
    ) -> Self {
        Self {
            config,
            provider,
            postal,
        }
    }

    pub async fn run(&self, input: &Path) -> Result<RunStats> {
        let _t = utils::Timer::start("Financial snapshot batch");

        let records = loader::load_stock_records(input)?;
        let total = records.len();
        let started = std::time::Instant::now();

        let mut snapshots = Vec::new();
        let mut failed = 0usize;

        for (i, record) in records.iter().enumerate() {
            info!("[{}/{}] {} ({})", i + 1, total, record.name, record.code);

            match self.collect(record).await {
                Ok(snapshot) => snapshots.push(snapshot),
                Err(err) => {
                    warn!("{} ({}): {err}", record.name, record.code);
                    failed += 1;
                }
            }

            if i + 1 < total {
                sleep(Duration::from_millis(self.config.pipeline.item_delay_ms)).await;
            }
        }

        let output = if snapshots.is_empty() {
            warn!("No snapshots collected, nothing to write");
            None
        } else {
            Some(storage::write_snapshots_csv(&self.config.export.dir, input, &snapshots)?)
        };

        info!("Done: {} succeeded / {} failed (of {})", snapshots.len(), failed, total);
        if total > 0 {
            let elapsed = started.elapsed().as_secs_f64();
            info!(
                "Total {} ({} per company)",
                utils::fmt_duration(elapsed),
                utils::fmt_duration(elapsed / total as f64)
            );
        }

        Ok(RunStats {
            processed: total,
            succeeded: snapshots.len(),
            failed,
            output,
        })
    }

    /// One company: classify → format → fetch → extract → derive.
    async fn collect(&self, record: &StockRecord) -> Result<FinancialSnapshot, ProviderError> {
        let market = record
            .market_type
            .unwrap_or_else(|| market::classify(record.code.as_str()));
        let symbol = market::format_symbol(record.code.as_str(), market);

        let profile = self.provider.fetch_profile(&symbol).await?;

        // Statement trouble is not fatal; the profile alone still yields a row.
        let statements = match self.provider.fetch_statements(&symbol).await {
            Ok(statements) => statements,
            Err(err) => {
                warn!("{symbol}: statements unavailable ({err})");
                CompanyStatements::default()
            }
        };

        Ok(self.snapshot(record, &profile, &statements, &symbol).await)
    }

    async fn snapshot(
        &self,
        record: &StockRecord,
        profile: &CompanyProfile,
        statements: &CompanyStatements,
        symbol: &str,
    ) -> FinancialSnapshot {
        let income = &statements.income;
        let balance = &statements.balance;

        let revenue = income.latest(fields::TOTAL_REVENUE);
        let operating_income = income.latest(fields::OPERATING_INCOME);
        let net_income = income.latest(fields::NET_INCOME);

        let total_liabilities =
            balance.latest_with_fallbacks(fields::TOTAL_LIABILITIES, fields::TOTAL_LIABILITIES_FALLBACKS);
        let current_liabilities = balance
            .latest_with_fallbacks(fields::CURRENT_LIABILITIES, fields::CURRENT_LIABILITIES_FALLBACKS);
        let current_assets =
            balance.latest_with_fallbacks(fields::CURRENT_ASSETS, fields::CURRENT_ASSETS_FALLBACKS);
        let equity = balance.latest_with_fallbacks(fields::EQUITY, fields::EQUITY_FALLBACKS);
        let total_assets = balance.latest(fields::TOTAL_ASSETS);
        let total_debt = balance.latest(fields::TOTAL_DEBT);
        let cash_and_equivalents = balance.latest_with_fallbacks(fields::CASH, fields::CASH_FALLBACKS);
        let investments =
            balance.latest_with_fallbacks(fields::INVESTMENTS, fields::INVESTMENTS_FALLBACKS);

        let equity_ratio = metrics::equity_ratio(equity, total_assets);
        let net_cash = metrics::net_cash(current_assets, investments, total_liabilities);
        let net_cash_ratio = metrics::net_cash_ratio(net_cash, profile.market_cap);

        let (prior_year_eps, prior_year_pe) = self.prior_earnings(income, symbol).await;

        let prefecture = match (&self.postal, &profile.zip) {
            (Some(postal), Some(zip)) => postal.prefecture_for_zip(zip).await,
            _ => None,
        };

        FinancialSnapshot {
            company_name: non_empty(&record.name)
                .or_else(|| profile.long_name.clone())
                .or_else(|| profile.short_name.clone()),
            code: record.code.clone(),
            industry: record
                .industry
                .clone()
                .or_else(|| profile.industry.clone())
                .or_else(|| profile.sector.clone()),
            market_segment: record.market_segment.clone(),
            fiscal_period: balance
                .latest_period()
                .map(|d| d.format("%Y-%m-%d").to_string()),
            prefecture,
            market_cap: profile.market_cap,
            price_to_book: profile.price_to_book,
            revenue,
            operating_income,
            operating_margin: profile.operating_margin,
            net_income,
            profit_margin: profile.profit_margin,
            roe: profile.return_on_equity,
            equity_ratio,
            forward_pe: profile.forward_pe,
            total_liabilities,
            current_liabilities,
            current_assets,
            total_debt,
            cash_and_equivalents,
            investments,
            net_cash,
            net_cash_ratio,
            prior_year_eps,
            prior_year_pe,
        }
    }

    /// Prior-year EPS with the PE against a close near that period's end.
    /// Any missing input anywhere makes the whole pair absent.
    async fn prior_earnings(
        &self,
        income: &FinancialStatement,
        symbol: &str,
    ) -> (Option<f64>, Option<f64>) {
        let Some(prior) = metrics::prior_year_eps(income) else {
            return (None, None);
        };

        let price = match self
            .provider
            .close_price_near(symbol, prior.period, self.config.pipeline.price_window_days)
            .await
        {
            Ok(price) => price,
            Err(err) => {
                warn!("{symbol}: historical price lookup failed ({err})");
                None
            }
        };

        match price.and_then(|p| metrics::price_earnings(p, prior.eps)) {
            Some(pe) => (Some(prior.eps), Some(pe)),
            None => (None, None),
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[derive(Debug)]
pub struct RunStats {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub output: Option<PathBuf>,
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::NaiveDate;

    struct MockProvider {
        fail_statements: bool,
    }

    fn period(year: i32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, 3, 31).unwrap()
    }

    #[async_trait]
    impl FundamentalsProvider for MockProvider {
        async fn fetch_profile(&self, symbol: &str) -> Result<CompanyProfile, ProviderError> {
            if symbol == "9999.T" {
                return Err(ProviderError::NoData(symbol.to_string()));
            }
            Ok(CompanyProfile {
                long_name: Some("Example Motor".to_string()),
                market_cap: Some(2_000_000.0),
                ..Default::default()
            })
        }

        async fn fetch_statements(&self, symbol: &str) -> Result<CompanyStatements, ProviderError> {
            if self.fail_statements {
                return Err(ProviderError::NoData(symbol.to_string()));
            }

            let income = FinancialStatement::from_cells(vec![
                ("NetIncome".to_string(), period(2025), 120.0),
                ("NetIncome".to_string(), period(2024), 100.0),
                ("DilutedAverageShares".to_string(), period(2024), 50.0),
            ]);
            let balance = FinancialStatement::from_cells(vec![
                ("TotalCurrentAssets".to_string(), period(2025), 10_000_000.0),
                ("AvailableForSaleSecurities".to_string(), period(2025), 5_000_000.0),
                ("TotalLiabilitiesNetMinorityInterest".to_string(), period(2025), 3_000_000.0),
                ("TotalAssets".to_string(), period(2025), 20_000_000.0),
                ("StockholdersEquity".to_string(), period(2025), 8_000_000.0),
            ]);
            Ok(CompanyStatements { income, balance })
        }

        async fn close_price_near(
            &self,
            _symbol: &str,
            _target: NaiveDate,
            _window_days: i64,
        ) -> Result<Option<f64>, ProviderError> {
            Ok(Some(40.0))
        }
    }

    fn test_config(tag: &str) -> AppConfig {
        let mut config = AppConfig::default();
        config.pipeline.item_delay_ms = 0;
        config.export.dir =
            std::env::temp_dir().join(format!("jpx_pipeline_{tag}_{}", std::process::id()));
        config
    }

    fn write_listing(dir: &Path) -> PathBuf {
        std::fs::create_dir_all(dir).unwrap();
        let input = dir.join("stocks_test.json");
        let listing = serde_json::json!([
            {"code": 7203, "name": "Example Motor", "market_segment": "Prime", "industry": "Autos"},
            {"code": 9999, "name": "Gone Inc", "market_segment": "Standard"}
        ]);
        std::fs::write(&input, serde_json::to_string(&listing).unwrap()).unwrap();
        input
    }

    #[tokio::test]
    async fn one_failure_leaves_one_row_and_both_counts() {
        let config = test_config("counts");
        let export_dir = config.export.dir.clone();
        let input = write_listing(&export_dir);

        let pipeline = Pipeline::with_provider(
            config,
            Box::new(MockProvider { fail_statements: false }),
            None,
        );
        let stats = pipeline.run(&input).await.unwrap();

        assert_eq!(stats.processed, 2);
        assert_eq!(stats.succeeded, 1);
        assert_eq!(stats.failed, 1);

        let body = std::fs::read_to_string(stats.output.unwrap()).unwrap();
        assert_eq!(body.lines().count(), 2);

        let row = body.lines().nth(1).unwrap();
        assert!(row.contains("Example Motor"));
        // current assets 10M + 0.7 × 5M investments − 3M liabilities
        assert!(row.contains("10500000"));
        // net cash over the 2M market cap
        assert!(row.contains("5.25"));
        // prior year: EPS 100/50, PE 40/2
        assert!(row.contains(",2.0,20.0"));
        // equity ratio 8M / 20M
        assert!(row.contains("0.4"));

        std::fs::remove_dir_all(&export_dir).unwrap();
    }

    #[tokio::test]
    async fn statement_failure_still_yields_a_row() {
        let config = test_config("nostmt");
        let export_dir = config.export.dir.clone();
        let input = write_listing(&export_dir);

        let pipeline = Pipeline::with_provider(
            config,
            Box::new(MockProvider { fail_statements: true }),
            None,
        );
        let stats = pipeline.run(&input).await.unwrap();

        assert_eq!(stats.succeeded, 1);
        let body = std::fs::read_to_string(stats.output.unwrap()).unwrap();
        let row = body.lines().nth(1).unwrap();

        // profile fields survive, statement-derived fields are all empty
        assert!(row.contains("Example Motor"));
        assert!(row.contains("2000000"));
        assert!(row.ends_with(",,"));

        std::fs::remove_dir_all(&export_dir).unwrap();
    }
}
