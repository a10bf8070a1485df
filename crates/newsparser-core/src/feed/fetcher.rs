use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use reqwest::{Client, Proxy, StatusCode};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use url::Url;

use super::extractor::extract_article_body;
use super::models::Candidate;
use super::parser::parse_feed;
use super::source::CandidateSource;
use crate::config::{AppConfig, FeedSource};
use crate::{Error, Result};

const MAX_BODY_BYTES: usize = 5 * 1024 * 1024;
const MAX_RETRIES: u32 = 3;
const INITIAL_RETRY_DELAY_MS: u64 = 500;

static USER_AGENT_INDEX: AtomicUsize = AtomicUsize::new(0);
const USER_AGENTS: &[&str] = &[
    // Chrome on Windows
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    // Chrome on macOS
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    // Firefox on Windows
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    // Safari on macOS
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15",
];

/// Get the next User-Agent in rotation
fn next_user_agent() -> &'static str {
    let index = USER_AGENT_INDEX.fetch_add(1, Ordering::Relaxed) % USER_AGENTS.len();
    USER_AGENTS[index]
}

/// HTTP-backed candidate source: RSS feeds plus article page extraction
pub struct FeedFetcher {
    client: Client,
}

impl FeedFetcher {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let client = Self::build_client(config.sync.request_timeout_secs, &config.sync.proxy_url)?;
        Ok(Self { client })
    }

    /// Build HTTP client with optional proxy
    fn build_client(timeout_secs: u64, proxy_url: &Option<String>) -> Result<Client> {
        let mut builder = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(10));

        if let Some(ref proxy) = proxy_url {
            let proxy = Proxy::all(proxy)
                .map_err(|e| Error::Config(format!("Invalid proxy URL: {}", e)))?;
            builder = builder.proxy(proxy);
            tracing::info!("Using HTTP proxy for feed fetching");
        }

        builder.build().map_err(Error::Http)
    }

    fn build_headers(user_agent: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,application/rss+xml,application/atom+xml,*/*;q=0.8",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-GB,en;q=0.9"));
        if let Ok(ua) = HeaderValue::from_str(user_agent) {
            headers.insert(USER_AGENT, ua);
        }
        headers
    }

    /// GET with retry and exponential backoff on 429/503 and transport errors
    async fn get_with_retry(&self, url: &str) -> Result<Bytes> {
        let mut last_error = None;
        let mut delay_ms = INITIAL_RETRY_DELAY_MS;

        for attempt in 0..MAX_RETRIES {
            let user_agent = next_user_agent();
            tracing::debug!(url, attempt = attempt + 1, "Fetching");

            match self
                .client
                .get(url)
                .headers(Self::build_headers(user_agent))
                .send()
                .await
            {
                Ok(response) => {
                    let status = response.status();

                    if status == StatusCode::TOO_MANY_REQUESTS
                        || status == StatusCode::SERVICE_UNAVAILABLE
                    {
                        tracing::warn!(url, %status, delay_ms, "Throttled, retrying");
                        last_error = Some(Error::FeedParse(format!(
                            "HTTP {} for URL: {}",
                            status, url
                        )));
                    } else if !status.is_success() {
                        return Err(Error::FeedParse(format!("HTTP {} for URL: {}", status, url)));
                    } else {
                        match response.bytes().await {
                            Ok(bytes) => {
                                ensure_content_size(bytes.len(), url)?;
                                return Ok(bytes);
                            }
                            Err(e) => {
                                tracing::warn!(url, error = %e, "Failed to read response body");
                                last_error = Some(Error::Http(e));
                            }
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(url, attempt = attempt + 1, error = %e, "Request failed");
                    last_error = Some(Error::Http(e));
                }
            }

            if attempt < MAX_RETRIES - 1 {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                delay_ms *= 2;
            }
        }

        Err(last_error.unwrap_or_else(|| {
            Error::FeedParse(format!("Failed to fetch URL after {} retries: {}", MAX_RETRIES, url))
        }))
    }

    /// Fetch and parse one feed
    pub async fn fetch_feed(&self, feed: &FeedSource) -> Result<Vec<Candidate>> {
        Url::parse(&feed.url)?;
        tracing::info!(feed = %feed.name, url = %feed.url, "Fetching feed");

        let content = self.get_with_retry(&feed.url).await?;
        let candidates = parse_feed(&content, &feed.url)?;

        tracing::info!(feed = %feed.name, count = candidates.len(), "Parsed feed");
        Ok(candidates)
    }

    /// Download an article page and extract its body text
    pub async fn fetch_article_body(&self, link: &str) -> Result<Option<String>> {
        Url::parse(link)?;
        let page = self.get_with_retry(link).await?;
        Ok(extract_article_body(&String::from_utf8_lossy(&page)))
    }
}

fn ensure_content_size(size: usize, url: &str) -> Result<()> {
    if size > MAX_BODY_BYTES {
        return Err(Error::FeedParse(format!(
            "Response too large ({} bytes) for URL: {}",
            size, url
        )));
    }
    Ok(())
}

#[async_trait]
impl CandidateSource for FeedFetcher {
    async fn fetch(&self, feed: &FeedSource) -> Result<Vec<Candidate>> {
        self.fetch_feed(feed).await
    }

    async fn extract_body(&self, link: &str) -> Option<String> {
        match self.fetch_article_body(link).await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(link, error = %e, "Failed to extract article content");
                None
            }
        }
    }
}
