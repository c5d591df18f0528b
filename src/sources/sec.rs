//! Government company-ticker registry source.
//!
//! The registry payload is a map keyed by row number
//! (`"0": {"cik_str": ..., "ticker": ..., "title": ...}`), so it is
//! deserialized through a map visitor into a plain vector. The endpoint's
//! usage terms require a contact address in the `User-Agent`.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use serde::de::{MapAccess, Visitor};
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::models::{MarketType, StockCode, StockRecord};
use crate::provider::FundamentalsProvider;

/// Environment variable carrying the contact address for the registry's
/// identification header.
pub const CONTACT_ENV: &str = "SEC_USER_AGENT_CONTACT";
const CONTACT_PLACEHOLDER: &str = "your@email.com";

// ── Registry fetch ────────────────────────────────────────────────────────────

/// Fetch the registry and return its ticker symbols, deduplicated and
/// sorted.
pub async fn fetch_registry(config: &AppConfig) -> Result<Vec<String>> {
    let client = build_client(config)?;

    info!("Fetching the company-ticker registry ({})", config.sources.registry_url);
    let resp = client
        .get(&config.sources.registry_url)
        .send()
        .await
        .context("Failed to reach the ticker registry")?;

    if resp.status() == reqwest::StatusCode::FORBIDDEN {
        bail!(
            "the registry answered 403 Forbidden; set {CONTACT_ENV} to a real contact address"
        );
    }
    if !resp.status().is_success() {
        bail!("the registry answered {}", resp.status());
    }

    let registry: Registry = resp
        .json()
        .await
        .context("Failed to parse the registry payload")?;

    let mut tickers: Vec<String> = registry
        .0
        .into_iter()
        .map(|entry| entry.ticker.trim().to_string())
        .filter(|ticker| !ticker.is_empty())
        .collect();
    tickers.sort_unstable();
    tickers.dedup();

    info!("{} registered tickers", tickers.len());
    Ok(tickers)
}

fn build_client(config: &AppConfig) -> Result<reqwest::Client> {
    let contact = std::env::var(CONTACT_ENV)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| CONTACT_PLACEHOLDER.to_string());

    if contact == CONTACT_PLACEHOLDER {
        warn!("{CONTACT_ENV} is not set; the registry may answer 403 without a real contact");
    }

    reqwest::Client::builder()
        .user_agent(format!("jpx-screener/0.1 (contact: {contact})"))
        .timeout(Duration::from_secs(config.http.timeout_secs.max(30)))
        .gzip(true)
        .build()
        .context("Failed to build the registry client")
}

// ── Listing enrichment ────────────────────────────────────────────────────────

/// Walk every registered ticker through the market-data provider and build
/// the foreign-market listing. Per-ticker failures are counted and skipped;
/// the provider's polite delay paces the loop.
pub async fn build_us_listing(
    config: &AppConfig,
    provider: &dyn FundamentalsProvider,
) -> Result<Vec<StockRecord>> {
    let tickers = fetch_registry(config).await?;
    let total = tickers.len();
    info!("Enriching {total} tickers via the market-data provider");

    let mut records = Vec::new();
    let mut failed = 0usize;

    for (i, ticker) in tickers.iter().enumerate() {
        if (i + 1) % 100 == 0 {
            info!(
                "[{}/{}] progress ({} ok, {} failed)",
                i + 1,
                total,
                records.len(),
                failed
            );
        } else {
            debug!("[{}/{}] {}", i + 1, total, ticker);
        }

        match provider.fetch_profile(ticker).await {
            Ok(profile) => {
                let name = profile
                    .long_name
                    .or(profile.short_name)
                    .filter(|name| !name.trim().is_empty())
                    .unwrap_or_else(|| ticker.clone());

                records.push(StockRecord {
                    code: StockCode::new(ticker.clone()),
                    name,
                    market_segment: market_label(profile.exchange.as_deref().unwrap_or_default())
                        .to_string(),
                    industry: Some(
                        profile
                            .sector
                            .or(profile.industry)
                            .unwrap_or_else(|| "Unknown".to_string()),
                    ),
                    market_type: Some(MarketType::Us),
                });
            }
            Err(err) => {
                warn!("{ticker}: {err}");
                failed += 1;
            }
        }
    }

    info!("{} enriched, {} failed", records.len(), failed);
    Ok(records)
}

/// Map the provider's exchange name onto the three market labels.
fn market_label(exchange: &str) -> &'static str {
    let exchange = exchange.to_ascii_uppercase();
    if exchange.contains("NASDAQ") {
        "NASDAQ"
    } else if exchange.contains("NYSE") {
        "NYSE"
    } else if exchange.contains("AMEX") || exchange.contains("AMERICAN") {
        "AMEX"
    } else {
        "NASDAQ"
    }
}

// ── Wire types ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
struct RegistryEntry {
    #[serde(rename = "cik_str")]
    cik: u64,
    ticker: String,
    title: String,
}

#[derive(Debug)]
struct Registry(Vec<RegistryEntry>);

impl<'de> Deserialize<'de> for Registry {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct RegistryVisitor;

        impl<'de> Visitor<'de> for RegistryVisitor {
            type Value = Registry;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("a map of row number to registry entry")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries = Vec::new();
                while let Some((_, entry)) = map.next_entry::<u32, RegistryEntry>()? {
                    entries.push(entry);
                }
                Ok(Registry(entries))
            }
        }

        deserializer.deserialize_map(RegistryVisitor)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_map_flattens_to_entries() {
        let json = r#"{
            "0": {"cik_str": 320193, "ticker": "AAPL", "title": "Apple Inc."},
            "1": {"cik_str": 789019, "ticker": "MSFT", "title": "MICROSOFT CORP"}
        }"#;

        let registry: Registry = serde_json::from_str(json).unwrap();
        assert_eq!(registry.0.len(), 2);
        assert_eq!(registry.0[0].ticker, "AAPL");
        assert_eq!(registry.0[0].cik, 320193);
        assert_eq!(registry.0[1].title, "MICROSOFT CORP");
    }

    #[test]
    fn market_label_covers_the_three_boards() {
        assert_eq!(market_label("NasdaqGS"), "NASDAQ");
        assert_eq!(market_label("NYSEArca"), "NYSE");
        assert_eq!(market_label("NYSE American"), "NYSE");
        assert_eq!(market_label("AMEX"), "AMEX");
        // unknown exchanges fall back to NASDAQ
        assert_eq!(market_label(""), "NASDAQ");
        assert_eq!(market_label("Tokyo"), "NASDAQ");
    }
}
