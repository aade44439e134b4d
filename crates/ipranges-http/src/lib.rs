// # HTTP Document Fetcher
//
// This crate provides the reqwest-based `IpRangesFetcher` for the ipranges
// system.
//
// ## Responsibilities
//
// - ✅ GET the provider document URL and return the raw body
// - ✅ Treat any non-2xx status as a failure
// - ❌ NO parsing (owned by the provider adapters)
// - ❌ NO retry logic (a failed refresh is retried on the next cycle by IpRangeManager)
// - ❌ NO caching (owned by IpRangeManager)
//
// The client carries its own request timeout. IpRangeManager additionally
// bounds every fetch with `fetch_timeout_secs`, so the shorter of the two wins.

use async_trait::async_trait;
use ipranges_core::{Error, IpRangesFetcher, Result};
use std::time::Duration;
use tracing::debug;

/// Default HTTP timeout for document requests (30 seconds)
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// User agent sent with every request
const USER_AGENT: &str = concat!("iprangesd/", env!("CARGO_PKG_VERSION"));

/// Fetches provider documents over HTTP(S)
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpFetcher {
    /// Create a fetcher with the default timeout
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_HTTP_TIMEOUT)
    }

    /// Create a fetcher with a custom request timeout
    pub fn with_timeout(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();

        Self { client, timeout }
    }

    /// Configured request timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IpRangesFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        debug!("Fetching ip ranges document from {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::http(format!("Request to {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::http(format!("{} returned {}", url, status)));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::http(format!("Failed to read response from {}: {}", url, e)))?;

        debug!("Fetched {} bytes from {}", body.len(), url);
        Ok(body.to_vec())
    }
}
