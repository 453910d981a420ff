//! HTTP page fetcher.
//!
//! One GET per page with a fixed timeout and a fixed identifying
//! `User-Agent`. Non-2xx statuses, transport failures and timeouts all
//! surface as errors; partial bodies are never returned. There are no
//! retries: the caller decides what a failed page means for its site.

pub mod url;

use async_trait::async_trait;
use reqwest::{Client, header};
use std::time::{Duration, Instant};

pub use url::{UrlError, canonicalize};

use tally_core::{AppConfig, Error};

/// Source of page bodies.
///
/// The extractors only ever see this trait, so tests can replay fixture
/// HTML without a network.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch one page and return its decoded body.
    async fn fetch(&self, url: &str) -> Result<String, Error>;
}

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "bbs-tally/0.1")
    pub user_agent: String,

    /// Per-request timeout (default: 10s)
    pub timeout: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self { user_agent: "bbs-tally/0.1".to_string(), timeout: Duration::from_secs(10) }
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self { user_agent: config.user_agent.clone(), timeout: config.timeout() }
    }
}

/// reqwest-backed [`PageFetcher`].
#[derive(Debug, Clone)]
pub struct FetchClient {
    http: Client,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::HttpError(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http })
    }
}

#[async_trait]
impl PageFetcher for FetchClient {
    async fn fetch(&self, url_str: &str) -> Result<String, Error> {
        let start = Instant::now();
        let url = canonicalize(url_str).map_err(|e| Error::InvalidUrl(e.to_string()))?;

        let response = self
            .http
            .get(url.as_str())
            .header(header::ACCEPT, "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8")
            .send()
            .await
            .map_err(|e| classify(&url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpError(format!("{url}: status {}", status.as_u16())));
        }

        let body = response.text().await.map_err(|e| classify(&url, e))?;

        tracing::debug!(url = %url, bytes = body.len(), ms = start.elapsed().as_millis() as u64, "fetched page");

        Ok(body)
    }
}

fn classify(url: &::url::Url, err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::FetchTimeout(format!("{url}: {err}"))
    } else {
        Error::HttpError(format!("{url}: network error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_config_default() {
        let config = FetchConfig::default();
        assert_eq!(config.user_agent, "bbs-tally/0.1");
        assert_eq!(config.timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_fetch_config_from_app_config() {
        let app = AppConfig { user_agent: "tally-test/2".into(), timeout_ms: 2_500, ..Default::default() };
        let config = FetchConfig::from(&app);
        assert_eq!(config.user_agent, "tally-test/2");
        assert_eq!(config.timeout, Duration::from_millis(2_500));
    }

    #[tokio::test]
    async fn test_fetch_client_new() {
        let client = FetchClient::new(FetchConfig::default());
        assert!(client.is_ok());
    }

    #[tokio::test]
    async fn test_fetch_rejects_unsupported_scheme() {
        let client = FetchClient::new(FetchConfig::default()).unwrap();
        let err = client.fetch("ftp://bbs.example/").await.unwrap_err();
        assert!(matches!(err, Error::InvalidUrl(_)));
        assert!(err.is_fetch());
    }
}
