//! One-shot crawl: run to completion, then write the sitemap

use crate::config::Config;
use crate::crawler::{CrawlEngine, HtmlExtractor, HttpFetcher, LinkExtractor, PageFetcher};
use crate::output::{CrawlStatistics, SitemapDocuments, WrittenDocuments};
use crate::state::{read, RunState, TerminalReason};
use crate::MapperError;
use std::path::Path;
use tokio_util::sync::CancellationToken;

/// What a finished batch run produced
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub run_state: RunState,
    pub reason: TerminalReason,
    pub documents: SitemapDocuments,
    pub written: WrittenDocuments,
    pub statistics: CrawlStatistics,
}

/// Crawls `seed` over HTTP and writes both documents to the output directory
///
/// # Arguments
///
/// * `seed` - The seed URL
/// * `config` - Full configuration (crawler limits, user agent, output)
/// * `cancel` - Cancelling it stops the run; the partial sitemap is still written
///
/// # Returns
///
/// * `Ok(BatchReport)` - The run ended `Completed` or `Stopped` and the files exist
/// * `Err(MapperError)` - The run `Failed`; nothing was written
pub async fn run_batch(
    seed: &str,
    config: &Config,
    cancel: CancellationToken,
) -> Result<BatchReport, MapperError> {
    let fetcher = HttpFetcher::from_config(config)?;
    run_batch_with(seed, config, fetcher, HtmlExtractor::new(), cancel).await
}

/// Like [`run_batch`], with caller-supplied adapters
pub async fn run_batch_with<F, X>(
    seed: &str,
    config: &Config,
    fetcher: F,
    extractor: X,
    cancel: CancellationToken,
) -> Result<BatchReport, MapperError>
where
    F: PageFetcher,
    X: LinkExtractor,
{
    let mut engine = CrawlEngine::new(seed, config.crawler.clone(), fetcher, extractor)
        .with_cancellation(cancel);

    let reason = engine.run().await?;

    let documents = {
        let state = engine.state();
        let state = read(&state);
        SitemapDocuments::build(&state)
    };
    let written = documents.write_to(Path::new(&config.output.directory), &config.output)?;
    let statistics = documents.statistics();

    Ok(BatchReport {
        run_state: reason.run_state(),
        reason,
        documents,
        written,
        statistics,
    })
}
