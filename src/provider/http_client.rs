use std::time::Duration;

use anyhow::{Context, Result};
use rand::RngExt;
use serde::de::DeserializeOwned;
use tokio::time::sleep;
use tracing::debug;
use url::Url;

use super::ProviderError;
use crate::config::HttpConfig;

/// Shared outbound HTTP client: fixed timeout, configured User-Agent, and a
/// polite delay with jitter before every call. A failed call fails its
/// record; there is no retry layer.
pub struct HttpClient {
    inner: reqwest::Client,
    request_delay_ms: u64,
    jitter_ms: u64,
}

impl HttpClient {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let inner = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            // The provider's crumb handshake rides on the session cookie
            .cookie_store(true)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            inner,
            request_delay_ms: config.request_delay_ms,
            jitter_ms: config.jitter_ms,
        })
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ProviderError> {
        let resp = self.get(url).await?;
        Ok(resp.json().await?)
    }

    pub async fn get_text(&self, url: Url) -> Result<String, ProviderError> {
        let resp = self.get(url).await?;
        Ok(resp.text().await?)
    }

    pub async fn get_bytes(&self, url: Url) -> Result<Vec<u8>, ProviderError> {
        let resp = self.get(url).await?;
        Ok(resp.bytes().await?.to_vec())
    }

    async fn get(&self, url: Url) -> Result<reqwest::Response, ProviderError> {
        self.polite_delay().await;
        debug!("GET {url}");

        let resp = self.inner.get(url.clone()).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ProviderError::Status {
                status,
                url: url.to_string(),
            });
        }
        Ok(resp)
    }

    /// Sleep for the configured delay + random jitter.
    async fn polite_delay(&self) {
        let jitter = rand::rng().random_range(0..=self.jitter_ms);
        sleep(Duration::from_millis(self.request_delay_ms + jitter)).await;
    }
}
