pub mod http_client;
pub mod yahoo;

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use crate::models::{CompanyProfile, CompanyStatements};

// ── Errors ────────────────────────────────────────────────────────────────────

/// Failure reaching or reading a remote data source. Any of these aborts the
/// record being processed, never the batch.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected status {status} from {url}")]
    Status {
        status: reqwest::StatusCode,
        url: String,
    },

    #[error("malformed payload: {0}")]
    Malformed(String),

    #[error("no data for {0}")]
    NoData(String),
}

// ── Provider trait ────────────────────────────────────────────────────────────

/// Swappable market-data provider abstraction.
#[async_trait]
pub trait FundamentalsProvider: Send + Sync {
    /// Company info blob for a formatted symbol.
    async fn fetch_profile(&self, symbol: &str) -> Result<CompanyProfile, ProviderError>;

    /// Annual income statement and balance sheet.
    async fn fetch_statements(&self, symbol: &str) -> Result<CompanyStatements, ProviderError>;

    /// Daily close nearest to `target` within ±`window_days`; `Ok(None)`
    /// when no bar lands inside the window.
    async fn close_price_near(
        &self,
        symbol: &str,
        target: NaiveDate,
        window_days: i64,
    ) -> Result<Option<f64>, ProviderError>;
}
