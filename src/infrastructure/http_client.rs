//! HTTP client for web crawling with rate limiting and error handling
//!
//! Provides a rate-limited client shared by every locale pass, the backfill
//! pass and enrichment, with respect for server resources.

use governor::{Quota, RateLimiter, clock::DefaultClock, state::InMemoryState, state::direct::NotKeyed};
use reqwest::{Client, StatusCode, header::{ACCEPT, HeaderMap, HeaderValue}};
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::debug;

use crate::domain::CrawlError;
use crate::infrastructure::config::HttpConfig;

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// Body and status of a fetched page
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub status: StatusCode,
    pub body: String,
}

impl FetchedPage {
    pub fn is_ok(&self) -> bool {
        self.status == StatusCode::OK
    }
}

/// Rate-limited HTTP client for respectful crawling
pub struct HttpClient {
    client: Client,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
}

impl HttpClient {
    /// Create a new HTTP client with the given configuration
    pub fn new(config: HttpConfig) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(&config.user_agent)
            .default_headers(headers)
            .cookie_store(true)
            .gzip(true)
            .redirect(if config.follow_redirects {
                reqwest::redirect::Policy::limited(10)
            } else {
                reqwest::redirect::Policy::none()
            })
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {}", e))?;

        let per_second = NonZeroU32::new(config.max_requests_per_second)
            .ok_or_else(|| anyhow::anyhow!("Rate limit must be greater than 0"))?;
        let rate_limiter = RateLimiter::direct(Quota::per_second(per_second));

        Ok(Self { client, rate_limiter })
    }

    /// Fetch a URL, returning the page whatever its status
    pub async fn fetch(&self, url: &str) -> Result<FetchedPage, CrawlError> {
        self.rate_limiter.until_ready().await;

        debug!("Fetching URL: {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| CrawlError::Network(format!("Failed to fetch {url}: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CrawlError::Network(format!("Failed to read response body from {url}: {e}")))?;

        debug!("Fetched: {} ({}, {} chars)", url, status, body.len());
        Ok(FetchedPage { status, body })
    }

    /// Fetch a URL and require a 200 response
    pub async fn fetch_ok(&self, url: &str) -> Result<FetchedPage, CrawlError> {
        let page = self.fetch(url).await?;
        if !page.is_ok() {
            return Err(CrawlError::ListingUnavailable {
                url: url.to_string(),
                status: page.status.as_u16(),
            });
        }
        Ok(page)
    }
}
