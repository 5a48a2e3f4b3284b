//! Site-Mapper: a single-site structure mapper
//!
//! This crate crawls one website breadth-first from a seed URL, follows only
//! in-site hyperlinks, records the graph of pages and links it finds and
//! renders that graph as a JSON document and a Markdown outline. Runs can be
//! driven from the command line or observed live through a small HTTP API.

pub mod config;
pub mod crawler;
pub mod gateway;
pub mod output;
pub mod server;
pub mod state;
pub mod url;

use thiserror::Error;

/// Main error type for Site-Mapper operations
///
/// Only run-level failures live here. Per-page fetch and parse failures are
/// recorded on the page itself and never surface as a `MapperError`.
#[derive(Debug, Error)]
pub enum MapperError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid seed URL '{url}': {source}")]
    SeedInvalid { url: String, source: UrlError },

    #[error("Seed URL {url} is unreachable: {reason}")]
    SeedUnreachable { url: String, reason: String },

    #[error("Crawl state invariant violated: {0}")]
    InvariantViolation(String),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Reasons a raw link is rejected by the normalizer
///
/// A rejection is an ordinary outcome for a discovered link, not a failure of
/// the crawl.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UrlError {
    #[error("Empty URL")]
    Empty,

    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// Result type alias for Site-Mapper operations
pub type Result<T> = std::result::Result<T, MapperError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use state::{CrawlState, RunState, TerminalReason};
pub use crate::url::{in_scope, normalize, NormalizedUrl, ScopePolicy};
