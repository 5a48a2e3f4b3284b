//! HTTP fetcher implementation
//!
//! This module is the single point of network I/O for the crawler:
//! - Building HTTP clients with the configured user agent and timeouts
//! - GET requests with redirect following
//! - Classifying every outcome into a closed `FetchResult`

use crate::config::{Config, CrawlerConfig, UserAgentConfig};
use crate::url::NormalizedUrl;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{redirect::Policy, Client};
use std::time::Duration;
use url::Url;

/// Maximum number of redirect hops followed for one fetch
pub const MAX_REDIRECTS: usize = 10;

/// Upper bound on the TCP connect phase
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Result of a fetch operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchResult {
    /// 2xx response with an HTML body
    Success {
        /// HTTP status code
        status: u16,
        /// Content-Type header value
        content_type: String,
        /// Page body content
        body: String,
        /// Final URL after redirects
        final_url: Url,
    },

    /// Non-2xx response
    HttpError {
        status: u16,
        content_type: Option<String>,
    },

    /// No usable response (timeout, DNS failure, connection refused, ...)
    NetworkError {
        /// Error description
        reason: String,
    },

    /// 2xx response whose content cannot contain links
    NotHtml {
        status: u16,
        content_type: Option<String>,
    },
}

/// Fetches pages for the crawl engine
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetches one URL; never fails, every problem is a `FetchResult` variant
    async fn fetch(&self, url: &NormalizedUrl) -> FetchResult;
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `user_agent` - The user agent configuration
/// * `crawler` - Crawler settings (request timeout)
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use site_mapper::config::{CrawlerConfig, UserAgentConfig};
/// use site_mapper::crawler::build_http_client;
///
/// let client = build_http_client(&UserAgentConfig::default(), &CrawlerConfig::default()).unwrap();
/// ```
pub fn build_http_client(
    user_agent: &UserAgentConfig,
    crawler: &CrawlerConfig,
) -> Result<Client, reqwest::Error> {
    let timeout = crawler.request_timeout();

    Client::builder()
        .user_agent(user_agent.header_value())
        .timeout(timeout)
        .connect_timeout(timeout.min(CONNECT_TIMEOUT))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Production fetcher backed by `reqwest`
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Builds a fetcher from the user agent and crawler sections
    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        Ok(Self::new(build_http_client(
            &config.user_agent,
            &config.crawler,
        )?))
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &NormalizedUrl) -> FetchResult {
        fetch_url(&self.client, url.as_url()).await
    }
}

/// Fetches a URL and classifies the outcome
///
/// | Condition | Result |
/// |-----------|--------|
/// | 2xx + `text/html` or `application/xhtml+xml` | Success |
/// | 2xx + any other or missing Content-Type | NotHtml |
/// | Non-2xx after redirects | HttpError |
/// | Timeout | NetworkError |
/// | Connection refused / DNS failure | NetworkError |
/// | More than `MAX_REDIRECTS` hops | NetworkError |
/// | Body could not be read | NetworkError |
///
/// No retries are attempted; a failure is final for the page within a run.
pub async fn fetch_url(client: &Client, url: &Url) -> FetchResult {
    let response = match client.get(url.clone()).send().await {
        Ok(response) => response,
        Err(e) => {
            return FetchResult::NetworkError {
                reason: describe_error(&e),
            }
        }
    };

    let status = response.status();
    let final_url = response.url().clone();
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    if !status.is_success() {
        return FetchResult::HttpError {
            status: status.as_u16(),
            content_type,
        };
    }

    let content_type = match content_type {
        Some(ct) if is_html(&ct) => ct,
        other => {
            return FetchResult::NotHtml {
                status: status.as_u16(),
                content_type: other,
            }
        }
    };

    match response.text().await {
        Ok(body) => FetchResult::Success {
            status: status.as_u16(),
            content_type,
            body,
            final_url,
        },
        Err(e) => FetchResult::NetworkError {
            reason: describe_error(&e),
        },
    }
}

/// Returns true if the Content-Type names an HTML document
pub fn is_html(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    mime == "text/html" || mime == "application/xhtml+xml"
}

fn describe_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        "Request timeout".to_string()
    } else if e.is_redirect() {
        format!("Too many redirects (limit {})", MAX_REDIRECTS)
    } else if e.is_connect() {
        format!("Connection failed: {}", e)
    } else {
        e.to_string()
    }
}
