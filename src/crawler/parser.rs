//! HTML parser for extracting links and metadata
//!
//! This module handles parsing HTML content to extract:
//! - Hyperlink targets from `<a href>` and `<area href>`, in document order
//! - The page title
//! - The document base from `<base href>`

use scraper::{Html, Selector};
use thiserror::Error;
use url::Url;

/// Extracted information from an HTML page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedPage {
    /// The page title (from <title> tag)
    pub title: Option<String>,

    /// Document base declared by `<base href>`, resolved against the page URL
    pub base: Option<Url>,

    /// Raw `href` values, unresolved, duplicates kept
    pub links: Vec<String>,
}

/// Link extraction failure; the engine treats it as "no links found"
#[derive(Debug, Error)]
#[error("Link extraction failed: {0}")]
pub struct ExtractionError(pub String);

/// Extracts hyperlink targets from a document body
pub trait LinkExtractor: Send + Sync {
    /// # Arguments
    ///
    /// * `body` - The document text
    /// * `base_url` - The URL the document was served from
    fn extract(&self, body: &str, base_url: &Url) -> Result<ExtractedPage, ExtractionError>;
}

/// Production extractor backed by `scraper`
///
/// Malformed markup is handled the way browsers do; whatever the HTML5
/// parser recovers is returned.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlExtractor;

impl HtmlExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl LinkExtractor for HtmlExtractor {
    fn extract(&self, body: &str, base_url: &Url) -> Result<ExtractedPage, ExtractionError> {
        parse_html(body, base_url)
    }
}

/// Parses HTML content and extracts links and metadata
///
/// # Arguments
///
/// * `html` - The HTML content to parse
/// * `base_url` - The URL the document was served from
///
/// # Returns
///
/// * `Ok(ExtractedPage)` - Successfully parsed page
/// * `Err(ExtractionError)` - A selector could not be built
///
/// # Example
///
/// ```
/// use site_mapper::crawler::parse_html;
/// use url::Url;
///
/// let html = r#"<html><head><title>Test</title></head><body><a href="/page">Link</a></body></html>"#;
/// let base_url = Url::parse("https://example.test/").unwrap();
/// let parsed = parse_html(html, &base_url).unwrap();
/// assert_eq!(parsed.title, Some("Test".to_string()));
/// assert_eq!(parsed.links, vec!["/page".to_string()]);
/// ```
pub fn parse_html(html: &str, base_url: &Url) -> Result<ExtractedPage, ExtractionError> {
    let document = Html::parse_document(html);

    let title = extract_title(&document)?;
    let base = extract_base(&document, base_url)?;
    let links = extract_links(&document)?;

    Ok(ExtractedPage { title, base, links })
}

fn selector(css: &str) -> Result<Selector, ExtractionError> {
    Selector::parse(css).map_err(|e| ExtractionError(format!("invalid selector '{}': {:?}", css, e)))
}

/// Extracts the page title from the HTML document
fn extract_title(document: &Html) -> Result<Option<String>, ExtractionError> {
    let title_selector = selector("title")?;

    Ok(document
        .select(&title_selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty()))
}

/// Resolves the first `<base href>` against the page URL
fn extract_base(document: &Html, base_url: &Url) -> Result<Option<Url>, ExtractionError> {
    let base_selector = selector("base[href]")?;

    Ok(document
        .select(&base_selector)
        .next()
        .and_then(|element| element.value().attr("href"))
        .and_then(|href| base_url.join(href.trim()).ok()))
}

/// Collects raw hyperlink targets in document order
fn extract_links(document: &Html) -> Result<Vec<String>, ExtractionError> {
    let link_selector = selector("a[href], area[href]")?;

    Ok(document
        .select(&link_selector)
        .filter_map(|element| element.value().attr("href"))
        .map(str::to_string)
        .collect())
}
