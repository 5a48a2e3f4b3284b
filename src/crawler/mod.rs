//! Crawler module for web page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching behind the `PageFetcher` trait
//! - HTML parsing and link extraction behind the `LinkExtractor` trait
//! - The FIFO frontier
//! - The crawl engine and the one-shot batch entry point

mod batch;
mod engine;
mod fetcher;
mod frontier;
mod parser;

pub use batch::{run_batch, run_batch_with, BatchReport};
pub use engine::CrawlEngine;
pub use fetcher::{
    build_http_client, fetch_url, is_html, FetchResult, HttpFetcher, PageFetcher, MAX_REDIRECTS,
};
pub use frontier::{Frontier, FrontierEntry};
pub use parser::{parse_html, ExtractedPage, ExtractionError, HtmlExtractor, LinkExtractor};

