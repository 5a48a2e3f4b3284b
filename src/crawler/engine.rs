//! Crawl engine - the breadth-first crawl loop
//!
//! The engine owns one run from start to finish:
//! - Admitting the seed and deriving the site root
//! - Taking URLs from the frontier in FIFO order
//! - Fetching, extracting, normalizing and scope-filtering links
//! - Recording pages and edges in the shared `CrawlState`
//! - Stopping on frontier exhaustion, page limit, time budget or cancellation
//!
//! Limits and cancellation are checked between pages, never mid-fetch, so a
//! stop request takes effect within one fetch timeout plus one polite delay.

use crate::config::CrawlerConfig;
use crate::crawler::{FetchResult, FrontierEntry, LinkExtractor, PageFetcher};
use crate::gateway::ProgressEvent;
use crate::state::{
    read, shared, write, CrawlState, LinkEdge, PageNode, PageOutcome, RunState, SharedState,
    TerminalReason,
};
use crate::url::{in_scope_with, normalize_with, NormalizeOptions, NormalizedUrl};
use crate::MapperError;
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Pages between two progress log lines
const PROGRESS_INTERVAL: u64 = 10;

/// Drives a single crawl run
pub struct CrawlEngine<F, X> {
    seed: String,
    config: CrawlerConfig,
    options: NormalizeOptions,
    fetcher: F,
    extractor: X,
    state: SharedState,
    cancel: CancellationToken,
    events: Option<broadcast::Sender<ProgressEvent>>,
}

impl<F, X> CrawlEngine<F, X>
where
    F: PageFetcher,
    X: LinkExtractor,
{
    /// Creates an idle engine for the given seed
    ///
    /// # Arguments
    ///
    /// * `seed` - The raw seed URL; validated when the run starts
    /// * `config` - Limits, delay and scope policy
    /// * `fetcher` - Network adapter
    /// * `extractor` - Link extraction adapter
    pub fn new(seed: impl Into<String>, config: CrawlerConfig, fetcher: F, extractor: X) -> Self {
        let seed = seed.into();
        let options = config.normalize_options();
        Self {
            state: shared(CrawlState::new(seed.clone())),
            seed,
            config,
            options,
            fetcher,
            extractor,
            cancel: CancellationToken::new(),
            events: None,
        }
    }

    /// Uses an externally owned token for stop requests
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Publishes progress events on the given channel
    pub fn with_events(mut self, events: broadcast::Sender<ProgressEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Handle to the run's state, for observers
    pub fn state(&self) -> SharedState {
        self.state.clone()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Runs the crawl to a terminal state
    ///
    /// # Returns
    ///
    /// * `Ok(TerminalReason)` - The run ended `Completed` or `Stopped`
    /// * `Err(MapperError)` - The run ended `Failed`; the state records why
    pub async fn run(&mut self) -> Result<TerminalReason, MapperError> {
        let current = read(&self.state).run_state();
        if current != RunState::Idle {
            return Err(MapperError::InvariantViolation(format!(
                "run for {} already {}",
                self.seed, current
            )));
        }

        let site_root = match self.admit_seed() {
            Ok(root) => root,
            Err(e) => {
                self.fail(TerminalReason::SeedInvalid, &e);
                return Err(e);
            }
        };

        write(&self.state).begin(site_root.clone());
        tracing::info!("Starting crawl of {}", site_root);
        self.emit(ProgressEvent::Started {
            seed: self.seed.clone(),
            site_root: site_root.to_string(),
        });

        let mut pages_crawled: u64 = 0;

        let reason = loop {
            if let Some(reason) = self.checkpoint() {
                break reason;
            }

            let next = write(&self.state).dequeue();
            let entry = match next {
                Ok(Some(entry)) => entry,
                Ok(None) => break TerminalReason::FrontierExhausted,
                Err(e) => {
                    self.fail(TerminalReason::InvariantViolation, &e);
                    return Err(e);
                }
            };

            tracing::debug!("Processing URL: {} (depth {})", entry.url, entry.depth);

            if let Err(e) = self.process(&site_root, entry).await {
                self.fail(failure_reason(&e), &e);
                return Err(e);
            }

            pages_crawled += 1;
            if pages_crawled % PROGRESS_INTERVAL == 0 {
                let state = read(&self.state);
                let elapsed = state.elapsed();
                tracing::info!(
                    "Progress: {} pages crawled, {} in frontier, {:.2} pages/sec",
                    pages_crawled,
                    state.queued_count(),
                    pages_crawled as f64 / elapsed.as_secs_f64().max(f64::EPSILON)
                );
            }

            self.pause().await;
        };

        self.finish(reason);
        Ok(reason)
    }

    /// Normalizes the seed; it becomes the site root
    fn admit_seed(&self) -> Result<NormalizedUrl, MapperError> {
        normalize_with(&self.seed, None, self.options).map_err(|source| {
            MapperError::SeedInvalid {
                url: self.seed.clone(),
                source,
            }
        })
    }

    /// Returns the reason to stop, if any, before the next dequeue
    fn checkpoint(&self) -> Option<TerminalReason> {
        let state = read(&self.state);

        if state.queued_count() == 0 {
            return Some(TerminalReason::FrontierExhausted);
        }

        if let Some(max) = self.config.max_pages {
            if state.visited_count() as u64 >= max {
                return Some(TerminalReason::PageLimit);
            }
        }

        if self.cancel.is_cancelled() {
            return Some(TerminalReason::Cancelled);
        }

        if let Some(budget) = self.config.time_budget() {
            if state.elapsed() >= budget {
                return Some(TerminalReason::TimeBudget);
            }
        }

        None
    }

    /// Polite delay between fetches, cut short by a stop request
    async fn pause(&self) {
        let delay = self.config.delay();
        let queued = read(&self.state).queued_count();
        if delay.is_zero() || queued == 0 {
            return;
        }

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = self.cancel.cancelled() => {}
        }
    }

    /// Fetches one URL and records its page and outgoing links
    async fn process(
        &self,
        site_root: &NormalizedUrl,
        entry: FrontierEntry,
    ) -> Result<(), MapperError> {
        let first_seen = Utc::now();
        let result = self.fetcher.fetch(&entry.url).await;

        if let FetchResult::NetworkError { reason } = &result {
            if entry.discovered_from.is_none() && &entry.url == site_root {
                return Err(MapperError::SeedUnreachable {
                    url: entry.url.to_string(),
                    reason: reason.clone(),
                });
            }
            tracing::warn!("Failed to fetch {}: {}", entry.url, reason);
        }

        let (page, links) = self.classify(site_root, &entry, result, first_seen);
        let child_depth = entry.depth + 1;
        let within_depth = self.config.max_depth.map_or(true, |max| child_depth <= max);

        let event = {
            let mut state = write(&self.state);
            let source = page.url.clone();
            state.record_page(page);

            for (target, in_scope) in links {
                state.record_edge(LinkEdge {
                    source: source.clone(),
                    target: target.to_string(),
                    in_scope,
                });

                if !in_scope {
                    continue;
                }
                if !within_depth {
                    tracing::trace!("Not following {}: beyond max depth", target);
                    continue;
                }
                state.enqueue(FrontierEntry {
                    url: target,
                    depth: child_depth,
                    discovered_from: Some(entry.url.clone()),
                });
            }

            state
                .pages()
                .last()
                .map(|page| ProgressEvent::page(page, state.visited_count(), state.queued_count()))
        };

        if let Some(event) = event {
            self.emit(event);
        }

        Ok(())
    }

    /// Turns a fetch result into a page record and its resolved links
    fn classify(
        &self,
        site_root: &NormalizedUrl,
        entry: &FrontierEntry,
        result: FetchResult,
        first_seen: DateTime<Utc>,
    ) -> (PageNode, Vec<(NormalizedUrl, bool)>) {
        let mut page = PageNode {
            url: entry.url.to_string(),
            status: None,
            content_type: None,
            title: None,
            depth: entry.depth,
            outcome: PageOutcome::NetworkError,
            error: None,
            redirected_to: None,
            discovered_from: entry.discovered_from.as_ref().map(ToString::to_string),
            first_seen,
        };
        let mut links = Vec::new();

        match result {
            FetchResult::Success {
                status,
                content_type,
                body,
                final_url,
            } => {
                page.status = Some(status);
                page.content_type = Some(content_type);

                let landed = normalize_with(final_url.as_str(), None, self.options).ok();
                if landed.as_ref() != Some(&entry.url) {
                    page.redirected_to = Some(
                        landed
                            .as_ref()
                            .map(ToString::to_string)
                            .unwrap_or_else(|| final_url.to_string()),
                    );
                }

                let on_site = landed
                    .as_ref()
                    .is_some_and(|url| in_scope_with(url, site_root, self.config.scope));
                if !on_site {
                    tracing::debug!("{} redirected off-site to {}", entry.url, final_url);
                    page.outcome = PageOutcome::OffSiteRedirect;
                    return (page, links);
                }

                page.outcome = PageOutcome::Ok;
                match self.extractor.extract(&body, &final_url) {
                    Ok(extracted) => {
                        page.title = extracted.title;
                        let base = extracted.base.unwrap_or(final_url);
                        links = self.resolve_links(&extracted.links, &base, site_root);
                    }
                    Err(e) => {
                        tracing::warn!("{} for {}; recording it without links", e, entry.url);
                    }
                }
            }

            FetchResult::HttpError {
                status,
                content_type,
            } => {
                tracing::debug!("HTTP {} for {}", status, entry.url);
                page.status = Some(status);
                page.content_type = content_type;
                page.outcome = PageOutcome::HttpError;
            }

            FetchResult::NetworkError { reason } => {
                page.error = Some(reason);
            }

            FetchResult::NotHtml {
                status,
                content_type,
            } => {
                page.status = Some(status);
                page.content_type = content_type;
                page.outcome = PageOutcome::NotHtml;
            }
        }

        (page, links)
    }

    /// Normalizes raw hrefs and tags each with its scope
    ///
    /// Hrefs the normalizer rejects (`mailto:`, `javascript:`, unparsable)
    /// are dropped here and never become edges.
    fn resolve_links(
        &self,
        raw: &[String],
        base: &Url,
        site_root: &NormalizedUrl,
    ) -> Vec<(NormalizedUrl, bool)> {
        raw.iter()
            .filter_map(|href| match normalize_with(href, Some(base), self.options) {
                Ok(url) => Some(url),
                Err(e) => {
                    tracing::trace!("Skipping link '{}': {}", href, e);
                    None
                }
            })
            .map(|url| {
                let in_scope = in_scope_with(&url, site_root, self.config.scope);
                (url, in_scope)
            })
            .collect()
    }

    fn finish(&self, reason: TerminalReason) {
        let event = {
            let mut state = write(&self.state);
            state.finish(reason, None);
            tracing::info!(
                "Crawl {} ({}): {} pages, {} links in {:?}",
                state.run_state(),
                reason,
                state.pages().len(),
                state.edges().len(),
                state.elapsed()
            );
            ProgressEvent::finished(&state)
        };
        if let Some(event) = event {
            self.emit(event);
        }
    }

    fn fail(&self, reason: TerminalReason, error: &MapperError) {
        tracing::error!("Crawl of {} failed: {}", self.seed, error);
        let event = {
            let mut state = write(&self.state);
            state.finish(reason, Some(error.to_string()));
            ProgressEvent::finished(&state)
        };
        if let Some(event) = event {
            self.emit(event);
        }
    }

    fn emit(&self, event: ProgressEvent) {
        if let Some(events) = &self.events {
            // No subscribers is not an error
            let _ = events.send(event);
        }
    }
}

fn failure_reason(error: &MapperError) -> TerminalReason {
    match error {
        MapperError::SeedInvalid { .. } => TerminalReason::SeedInvalid,
        MapperError::SeedUnreachable { .. } => TerminalReason::SeedUnreachable,
        _ => TerminalReason::InvariantViolation,
    }
}
