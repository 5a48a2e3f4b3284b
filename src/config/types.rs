use crate::url::{NormalizeOptions, ScopePolicy};
use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Site-Mapper
///
/// Every section is optional; missing keys fall back to their defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Seed URL; the command line takes precedence
    #[serde(default)]
    pub seed: Option<String>,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default, rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Maximum number of pages to fetch (unbounded when absent)
    #[serde(default, rename = "max-pages")]
    pub max_pages: Option<u64>,

    /// Maximum depth to crawl from the seed (unbounded when absent)
    #[serde(default, rename = "max-depth")]
    pub max_depth: Option<u32>,

    /// Wall-clock budget for the whole run in seconds (unbounded when absent)
    #[serde(default, rename = "time-budget-secs")]
    pub time_budget_secs: Option<u64>,

    /// Pause between consecutive fetches (milliseconds)
    #[serde(default = "default_delay_ms", rename = "delay-ms")]
    pub delay_ms: u64,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout", rename = "request-timeout-secs")]
    pub request_timeout_secs: u64,

    /// Which hosts belong to the site
    #[serde(default)]
    pub scope: ScopePolicy,

    /// Treat `/dir/index.html` as `/dir/`
    #[serde(default, rename = "strip-index")]
    pub strip_index: bool,
}

impl CrawlerConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn time_budget(&self) -> Option<Duration> {
        self.time_budget_secs.map(Duration::from_secs)
    }

    pub fn normalize_options(&self) -> NormalizeOptions {
        NormalizeOptions {
            strip_index: self.strip_index,
        }
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_pages: None,
            max_depth: None,
            time_budget_secs: None,
            delay_ms: default_delay_ms(),
            request_timeout_secs: default_request_timeout(),
            scope: ScopePolicy::default(),
            strip_index: false,
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(default = "default_crawler_name", rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(default = "default_crawler_version", rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(default, rename = "contact-url")]
    pub contact_url: Option<String>,
}

impl UserAgentConfig {
    /// Formats the header value: `Name/Version (+ContactURL)`
    pub fn header_value(&self) -> String {
        match &self.contact_url {
            Some(contact) => format!(
                "{}/{} (+{})",
                self.crawler_name, self.crawler_version, contact
            ),
            None => format!("{}/{}", self.crawler_name, self.crawler_version),
        }
    }
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: default_crawler_name(),
            crawler_version: default_crawler_version(),
            contact_url: None,
        }
    }
}

/// Output configuration for batch runs
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Directory the documents are written to
    #[serde(default = "default_output_directory")]
    pub directory: String,

    /// File name of the JSON graph document
    #[serde(default = "default_graph_file", rename = "graph-file")]
    pub graph_file: String,

    /// File name of the Markdown outline
    #[serde(default = "default_outline_file", rename = "outline-file")]
    pub outline_file: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_directory(),
            graph_file: default_graph_file(),
            outline_file: default_outline_file(),
        }
    }
}

/// Control endpoint configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Socket address to listen on
    #[serde(default = "default_bind")]
    pub bind: String,

    /// How long finished runs stay available, in seconds
    #[serde(default = "default_run_retention", rename = "run-retention-secs")]
    pub run_retention_secs: u64,
}

impl ServerConfig {
    pub fn run_retention(&self) -> Duration {
        Duration::from_secs(self.run_retention_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            run_retention_secs: default_run_retention(),
        }
    }
}

fn default_delay_ms() -> u64 {
    200
}

fn default_request_timeout() -> u64 {
    20
}

fn default_crawler_name() -> String {
    "site-mapper".to_string()
}

fn default_crawler_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_output_directory() -> String {
    "output".to_string()
}

fn default_graph_file() -> String {
    "sitemap.json".to_string()
}

fn default_outline_file() -> String {
    "sitemap.md".to_string()
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

fn default_run_retention() -> u64 {
    3600
}
