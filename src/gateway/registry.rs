//! Registry of runs started through the gateway

use crate::config::{Config, CrawlerConfig};
use crate::crawler::{CrawlEngine, HtmlExtractor, HttpFetcher, LinkExtractor, PageFetcher};
use crate::gateway::{ProgressEvent, ProgressSnapshot, RunId};
use crate::output::SitemapDocuments;
use crate::state::{read, RunState, SharedState};
use crate::url::normalize_with;
use crate::MapperError;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Events buffered per subscriber before it starts lagging
const EVENT_BUFFER: usize = 256;

/// How long a finished run is kept when no retention is configured
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(3600);

/// Errors returned by gateway operations
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Run not found: {0}")]
    RunNotFound(RunId),

    #[error("Run {0} has not finished yet")]
    NotFinished(RunId),

    #[error("Run {id} failed: {reason}")]
    RunFailed { id: RunId, reason: String },

    #[error(transparent)]
    Start(#[from] MapperError),
}

#[derive(Clone)]
struct RunHandle {
    state: SharedState,
    cancel: CancellationToken,
    events: broadcast::Sender<ProgressEvent>,
}

/// Runs keyed by id, each driven by its own engine task
///
/// Cloning the registry yields another handle to the same runs. Finished
/// runs are dropped by [`RunRegistry::cleanup`] once they are older than the
/// retention period; running ones are never dropped.
#[derive(Clone)]
pub struct RunRegistry {
    runs: Arc<RwLock<HashMap<RunId, RunHandle>>>,
    retention: Duration,
}

impl Default for RunRegistry {
    fn default() -> Self {
        Self::with_retention(DEFAULT_RETENTION)
    }
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry that keeps finished runs for `retention`
    pub fn with_retention(retention: Duration) -> Self {
        Self {
            runs: Arc::new(RwLock::new(HashMap::new())),
            retention,
        }
    }

    /// Starts an HTTP crawl of `seed` in the background
    ///
    /// # Arguments
    ///
    /// * `seed` - The seed URL
    /// * `config` - User agent and crawler settings for this run
    ///
    /// # Returns
    ///
    /// * `Ok(RunId)` - The run is running
    /// * `Err(GatewayError::Start)` - The seed is invalid or no client could be built
    pub fn start_http(&self, seed: &str, config: &Config) -> Result<RunId, GatewayError> {
        let fetcher = HttpFetcher::from_config(config).map_err(MapperError::from)?;
        self.start(seed, config.crawler.clone(), fetcher, HtmlExtractor::new())
    }

    /// Starts a crawl with the given adapters
    ///
    /// The seed is checked before the run is registered, so a rejected seed
    /// leaves no run behind. Must be called within a Tokio runtime.
    pub fn start<F, X>(
        &self,
        seed: &str,
        crawler: CrawlerConfig,
        fetcher: F,
        extractor: X,
    ) -> Result<RunId, GatewayError>
    where
        F: PageFetcher + 'static,
        X: LinkExtractor + 'static,
    {
        normalize_with(seed, None, crawler.normalize_options()).map_err(|source| {
            MapperError::SeedInvalid {
                url: seed.to_string(),
                source,
            }
        })?;

        self.cleanup();

        let run_id = Uuid::new_v4();
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        let cancel = CancellationToken::new();

        let mut engine = CrawlEngine::new(seed, crawler, fetcher, extractor)
            .with_cancellation(cancel.clone())
            .with_events(events.clone());

        let handle = RunHandle {
            state: engine.state(),
            cancel,
            events,
        };
        self.runs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(run_id, handle);

        tracing::info!("Run {} started for {}", run_id, seed);

        tokio::spawn(async move {
            match engine.run().await {
                Ok(reason) => tracing::info!("Run {} finished: {}", run_id, reason),
                Err(e) => tracing::warn!("Run {} failed: {}", run_id, e),
            }
        });

        Ok(run_id)
    }

    fn handle(&self, run_id: RunId) -> Result<RunHandle, GatewayError> {
        self.runs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&run_id)
            .cloned()
            .ok_or(GatewayError::RunNotFound(run_id))
    }

    /// Returns the current progress of a run
    pub fn snapshot(&self, run_id: RunId) -> Result<ProgressSnapshot, GatewayError> {
        let handle = self.handle(run_id)?;
        let state = read(&handle.state);
        Ok(ProgressSnapshot::capture(&state).with_run_id(run_id))
    }

    /// Snapshots of every run, oldest first
    pub fn list(&self) -> Vec<ProgressSnapshot> {
        let handles: Vec<(RunId, RunHandle)> = self
            .runs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(id, handle)| (*id, handle.clone()))
            .collect();

        let mut runs: Vec<_> = handles
            .into_iter()
            .map(|(id, handle)| {
                let state = read(&handle.state);
                (
                    state.created_at(),
                    ProgressSnapshot::capture(&state).with_run_id(id),
                )
            })
            .collect();
        runs.sort_by(|a, b| a.0.cmp(&b.0));
        runs.into_iter().map(|(_, snapshot)| snapshot).collect()
    }

    /// Asks a run to stop at its next checkpoint
    ///
    /// Idempotent; stopping a terminal run has no effect.
    pub fn request_stop(&self, run_id: RunId) -> Result<ProgressSnapshot, GatewayError> {
        let handle = self.handle(run_id)?;
        if !read(&handle.state).run_state().is_terminal() {
            tracing::info!("Stop requested for run {}", run_id);
        }
        handle.cancel.cancel();
        self.snapshot(run_id)
    }

    /// Asks every run to stop
    pub fn stop_all(&self) {
        let runs = self.runs.read().unwrap_or_else(PoisonError::into_inner);
        for handle in runs.values() {
            handle.cancel.cancel();
        }
    }

    /// Drops finished runs older than the retention period
    ///
    /// Returns the number of runs removed. Runs still in progress are kept
    /// regardless of age.
    pub fn cleanup(&self) -> usize {
        let now = Utc::now();
        let retention = self.retention;
        let mut runs = self.runs.write().unwrap_or_else(PoisonError::into_inner);
        let before = runs.len();

        runs.retain(|_, handle| {
            let state = read(&handle.state);
            match state.finished_at() {
                Some(finished) if state.run_state().is_terminal() => {
                    (now - finished).to_std().unwrap_or_default() < retention
                }
                _ => true,
            }
        });

        let removed = before - runs.len();
        if removed > 0 {
            tracing::debug!("Evicted {} finished runs", removed);
        }
        removed
    }

    /// Number of runs currently held
    pub fn len(&self) -> usize {
        self.runs.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Builds the sitemap documents of a terminal run
    ///
    /// # Returns
    ///
    /// * `Ok(SitemapDocuments)` - The run is `Completed` or `Stopped`
    /// * `Err(GatewayError::NotFinished)` - The run is still running
    /// * `Err(GatewayError::RunFailed)` - The run failed and has no sitemap
    pub fn documents(&self, run_id: RunId) -> Result<SitemapDocuments, GatewayError> {
        let handle = self.handle(run_id)?;
        let state = read(&handle.state);
        let run_state = state.run_state();
        if run_state.has_results() {
            return Ok(SitemapDocuments::build(&state));
        }
        match run_state {
            RunState::Failed => Err(GatewayError::RunFailed {
                id: run_id,
                reason: state.error().unwrap_or("unknown error").to_string(),
            }),
            _ => Err(GatewayError::NotFinished(run_id)),
        }
    }

    /// Subscribes to a run's events
    ///
    /// The snapshot is taken after subscribing, so no event that changes the
    /// run can fall between the two.
    pub fn subscribe(
        &self,
        run_id: RunId,
    ) -> Result<(ProgressSnapshot, broadcast::Receiver<ProgressEvent>), GatewayError> {
        let handle = self.handle(run_id)?;
        let receiver = handle.events.subscribe();
        let snapshot = ProgressSnapshot::capture(&read(&handle.state)).with_run_id(run_id);
        Ok((snapshot, receiver))
    }
}
