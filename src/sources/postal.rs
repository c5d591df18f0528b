//! Postal-code → prefecture lookup.
//!
//! Best-effort enrichment: every failure path (a short or foreign zip, a
//! transport error, an empty answer) resolves to `None`. Nothing here can
//! fail a record.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;

use crate::config::AppConfig;

const LOOKUP_TIMEOUT_SECS: u64 = 10;

pub struct PostalClient {
    inner: reqwest::Client,
    base_url: String,
}

impl PostalClient {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let inner = reqwest::Client::builder()
            .user_agent(&config.http.user_agent)
            .timeout(Duration::from_secs(LOOKUP_TIMEOUT_SECS))
            .build()
            .context("Failed to build the postal lookup client")?;

        Ok(Self {
            inner,
            base_url: config.sources.postal_base_url.trim_end_matches('/').to_string(),
        })
    }

    pub async fn prefecture_for_zip(&self, zip: &str) -> Option<String> {
        let zip = normalise_zip(zip)?;
        let url = format!("{}/{}", self.base_url, zip);

        let resp = match self.inner.get(&url).send().await {
            Ok(resp) => resp,
            Err(err) => {
                debug!("postal lookup failed ({zip}): {err}");
                return None;
            }
        };

        if !resp.status().is_success() {
            debug!("postal lookup answered {} for {zip}", resp.status());
            return None;
        }

        let body: AddressResponse = match resp.json().await {
            Ok(body) => body,
            Err(err) => {
                debug!("postal payload unreadable ({zip}): {err}");
                return None;
            }
        };

        body.addresses.into_iter().next().and_then(|a| a.pref_name)
    }
}

/// Strip separators (ASCII and full-width) and refuse anything shorter than
/// a full seven-digit code.
pub fn normalise_zip(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, '-' | '−' | ' ' | '　'))
        .collect();

    if cleaned.chars().count() < 7 {
        None
    } else {
        Some(cleaned)
    }
}

// ── Wire types ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct AddressResponse {
    #[serde(default)]
    addresses: Vec<Address>,
}

#[derive(Debug, Deserialize)]
struct Address {
    pref_name: Option<String>,
}

// ── Tests ─────────────────────────────────────────────────────────────────────
