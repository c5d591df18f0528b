use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub sources: SourcesConfig,
    pub export: ExportConfig,
    pub pipeline: PipelineConfig,
}

/// Outbound HTTP configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Fixed pause before every provider call, to respect rate limits.
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,

    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Remote data-source endpoints
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourcesConfig {
    /// Exchange listing spreadsheet (.xls).
    #[serde(default = "default_listing_url")]
    pub listing_url: String,

    /// Government company-ticker registry.
    #[serde(default = "default_registry_url")]
    pub registry_url: String,

    /// Market-data provider API root.
    #[serde(default = "default_provider_base_url")]
    pub provider_base_url: String,

    /// Postal-code → region lookup root.
    #[serde(default = "default_postal_base_url")]
    pub postal_base_url: String,

    /// Market segments kept when filtering the exchange listing.
    #[serde(default = "default_segments")]
    pub segments: Vec<String>,
}

/// Output file configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExportConfig {
    /// Directory for timestamped snapshot CSVs.
    #[serde(default = "default_export_dir")]
    pub dir: PathBuf,

    /// Directory for listing / chunk JSON files.
    #[serde(default = "default_listing_dir")]
    pub listing_dir: PathBuf,
}

/// Batch pacing configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    /// Pause between two consecutive companies.
    #[serde(default = "default_item_delay_ms")]
    pub item_delay_ms: u64,

    /// Tolerance around a period end date for the historical price lookup.
    #[serde(default = "default_price_window_days")]
    pub price_window_days: i64,

    /// How many years of annual statements to request.
    #[serde(default = "default_statement_years")]
    pub statement_years: i64,
}

// ── Defaults ─────────────────────────────────────────────────────────────────

fn default_timeout_secs() -> u64 {
    20
}
fn default_request_delay_ms() -> u64 {
    500
}
fn default_jitter_ms() -> u64 {
    150
}
fn default_user_agent() -> String {
    "jpx-screener/0.1 (listing and fundamentals research)".to_string()
}
fn default_listing_url() -> String {
    "https://www.jpx.co.jp/markets/statistics-equities/misc/tvdivq0000001vg2-att/data_j.xls"
        .to_string()
}
fn default_registry_url() -> String {
    "https://www.sec.gov/files/company_tickers.json".to_string()
}
fn default_provider_base_url() -> String {
    "https://query2.finance.yahoo.com".to_string()
}
fn default_postal_base_url() -> String {
    "https://digital-address.app".to_string()
}
fn default_segments() -> Vec<String> {
    vec![
        "プライム（内国株式）".to_string(),
        "スタンダード（内国株式）".to_string(),
        "グロース（内国株式）".to_string(),
    ]
}
fn default_export_dir() -> PathBuf {
    PathBuf::from("export")
}
fn default_listing_dir() -> PathBuf {
    PathBuf::from(".")
}
fn default_item_delay_ms() -> u64 {
    2000
}
fn default_price_window_days() -> i64 {
    3
}
fn default_statement_years() -> i64 {
    5
}

// ── Loader ───────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from file + environment overrides
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let cfg = config::Config::builder()
            .add_source(
                config::File::with_name("config/default")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::File::with_name("config/local")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(config::Environment::with_prefix("JPX").separator("__"))
            .build()?;

        let app_cfg: AppConfig = cfg.try_deserialize().unwrap_or_else(|_| AppConfig::default());
        Ok(app_cfg)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            http: HttpConfig {
                timeout_secs: default_timeout_secs(),
                request_delay_ms: default_request_delay_ms(),
                jitter_ms: default_jitter_ms(),
                user_agent: default_user_agent(),
            },
            sources: SourcesConfig {
                listing_url: default_listing_url(),
                registry_url: default_registry_url(),
                provider_base_url: default_provider_base_url(),
                postal_base_url: default_postal_base_url(),
                segments: default_segments(),
            },
            export: ExportConfig {
                dir: default_export_dir(),
                listing_dir: default_listing_dir(),
            },
            pipeline: PipelineConfig {
                item_delay_ms: default_item_delay_ms(),
                price_window_days: default_price_window_days(),
                statement_years: default_statement_years(),
            },
        }
    }
}
