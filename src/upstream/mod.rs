pub mod page;

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::cache::TtlCache;
use page::PageSet;

/// Largest slice of an upstream body echoed back in error messages.
const EXCERPT_LIMIT: usize = 300;

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("upstream returned {status} for {url}: {excerpt}")]
    Http {
        url: String,
        status: u16,
        excerpt: String,
    },

    #[error("upstream returned an unparsable body for {url}: {excerpt}")]
    Parse { url: String, excerpt: String },

    #[error("pagination exceeded {max} pages starting at {url}")]
    TooManyPages { url: String, max: usize },

    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Truncate a response body for inclusion in an error message.
pub(crate) fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(EXCERPT_LIMIT) {
        Some((idx, _)) => format!("{}…", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

/// Client for the upstream quote provider's REST API.
///
/// Every endpoint goes through the TTL cache, so repeated calls for the
/// same (symbol, expiration) within the TTL window hit the provider once.
pub struct UpstreamClient {
    http: reqwest::Client,
    base_url: String,
    cache: TtlCache<Arc<PageSet>>,
    max_pages: usize,
}

impl UpstreamClient {
    pub fn new(
        base_url: &str,
        cache_ttl: Duration,
        request_timeout: Duration,
        max_pages: usize,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .user_agent("options-chain/0.1")
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            cache: TtlCache::new(cache_ttl),
            max_pages,
        })
    }

    pub async fn list_expirations(&self, symbol: &str) -> Result<Arc<PageSet>, UpstreamError> {
        let url = format!(
            "{}/option/list/expirations?symbol={symbol}&format=json",
            self.base_url
        );
        self.fetch_cached(&format!("exp:{symbol}"), &url).await
    }

    pub async fn snapshot_quote(
        &self,
        symbol: &str,
        exp_iso: &str,
    ) -> Result<Arc<PageSet>, UpstreamError> {
        self.snapshot("quote", "q", symbol, exp_iso).await
    }

    pub async fn snapshot_open_interest(
        &self,
        symbol: &str,
        exp_iso: &str,
    ) -> Result<Arc<PageSet>, UpstreamError> {
        self.snapshot("open_interest", "oi", symbol, exp_iso).await
    }

    pub async fn snapshot_ohlc(
        &self,
        symbol: &str,
        exp_iso: &str,
    ) -> Result<Arc<PageSet>, UpstreamError> {
        self.snapshot("ohlc", "ohlc", symbol, exp_iso).await
    }

    pub async fn snapshot_implied_vol(
        &self,
        symbol: &str,
        exp_iso: &str,
    ) -> Result<Arc<PageSet>, UpstreamError> {
        self.snapshot("implied_volatility", "iv", symbol, exp_iso)
            .await
    }

    async fn snapshot(
        &self,
        endpoint: &str,
        key_prefix: &str,
        symbol: &str,
        exp_iso: &str,
    ) -> Result<Arc<PageSet>, UpstreamError> {
        let url = format!(
            "{}/option/snapshot/{endpoint}?symbol={symbol}&expiration={exp_iso}&format=json",
            self.base_url
        );
        self.fetch_cached(&format!("{key_prefix}:{symbol}:{exp_iso}"), &url)
            .await
    }

    async fn fetch_cached(
        &self,
        cache_key: &str,
        url: &str,
    ) -> Result<Arc<PageSet>, UpstreamError> {
        if let Some(hit) = self.cache.get(cache_key).await {
            tracing::debug!(key = cache_key, "upstream cache hit");
            return Ok(hit);
        }

        let pages = Arc::new(page::fetch_all(&self.http, url, self.max_pages).await?);
        self.cache.set(cache_key, Arc::clone(&pages)).await;
        Ok(pages)
    }
}
