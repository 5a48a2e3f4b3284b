//! Records produced by a crawl: pages and the links between them

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What happened when a page was fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageOutcome {
    /// 2xx HTML response; links were extracted
    Ok,

    /// Non-2xx response
    HttpError,

    /// No response at all (timeout, DNS failure, refused connection)
    NetworkError,

    /// 2xx response that is not HTML
    NotHtml,

    /// Redirected to a URL outside the site; links were not followed
    OffSiteRedirect,
}

impl PageOutcome {
    /// Returns true for outcomes reported as errors in progress feeds
    pub fn is_error(&self) -> bool {
        matches!(self, Self::HttpError | Self::NetworkError)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::HttpError => "http_error",
            Self::NetworkError => "network_error",
            Self::NotHtml => "not_html",
            Self::OffSiteRedirect => "off_site_redirect",
        }
    }
}

/// A fetched page, keyed by its normalized URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageNode {
    /// Normalized URL (unique key)
    pub url: String,

    /// HTTP status code, absent when no response was received
    pub status: Option<u16>,

    /// Content-Type header value
    pub content_type: Option<String>,

    /// Text of the `<title>` element
    pub title: Option<String>,

    /// Hops from the seed
    pub depth: u32,

    pub outcome: PageOutcome,

    /// Failure description for network errors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Final URL when the fetch was redirected elsewhere
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirected_to: Option<String>,

    /// The page whose link first introduced this one; absent for the seed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discovered_from: Option<String>,

    /// When the page was dequeued
    pub first_seen: DateTime<Utc>,
}

/// A hyperlink from a fetched page to another normalized URL
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LinkEdge {
    pub source: String,
    pub target: String,

    /// Whether the target belongs to the mapped site
    pub in_scope: bool,
}

/// A recently visited page, for live feeds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentPage {
    pub url: String,
    pub status: Option<u16>,
    pub outcome: PageOutcome,
    pub depth: u32,
}

impl From<&PageNode> for RecentPage {
    fn from(page: &PageNode) -> Self {
        Self {
            url: page.url.clone(),
            status: page.status,
            outcome: page.outcome,
            depth: page.depth,
        }
    }
}
