// src/ingest/fetcher.rs
use std::time::Duration;

use async_trait::async_trait;
use metrics::{counter, histogram};
use reqwest::Client;

use crate::error::{GatorError, Result};
use crate::ingest::types::FeedSource;

pub const USER_AGENT: &str = "gator";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);
const ENV_TIMEOUT_SECS: &str = "GATOR_HTTP_TIMEOUT_SECS";

/// Plain HTTP GET feed source. One client per process; the timeout covers
/// the whole request including the body.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| GatorError::Config(format!("building http client: {e}")))?;
        Ok(Self { client, timeout })
    }

    /// Timeout from `$GATOR_HTTP_TIMEOUT_SECS`, falling back to 15s.
    pub fn from_env() -> Result<Self> {
        let timeout = std::env::var(ENV_TIMEOUT_SECS)
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TIMEOUT);
        Self::new(timeout)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl FeedSource for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        if url.trim().is_empty() {
            return Err(GatorError::InvalidInput("no URL provided".into()));
        }

        let t0 = std::time::Instant::now();
        let network = |source| GatorError::Network {
            url: url.to_string(),
            source,
        };

        let resp = self.client.get(url).send().await.map_err(network)?;

        // Error statuses are not rejected here: whatever the server sent is
        // handed to the parser, which fails on it if it isn't a feed.
        let status = resp.status();
        if !status.is_success() {
            tracing::warn!(url, status = %status, "non-success status, parsing body anyway");
            counter!("gator_fetch_non_success_total").increment(1);
        }

        let body = resp.bytes().await.map_err(network)?;

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("gator_fetch_ms").record(ms);
        tracing::debug!(url, bytes = body.len(), ms, "feed fetched");

        Ok(body.to_vec())
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
