//! Aggregate state of one crawl run
//!
//! A `CrawlState` is owned by exactly one engine, which is the only writer.
//! Observers (progress gateway, sitemap builder) hold read locks briefly and
//! never see a half-written record: every record is appended whole inside one
//! write-lock scope.

use crate::crawler::{Frontier, FrontierEntry};
use crate::state::{LinkEdge, PageNode, RecentPage, RunState, TerminalReason};
use crate::url::NormalizedUrl;
use crate::MapperError;
use chrono::{DateTime, Utc};
use std::collections::{HashSet, VecDeque};
use std::time::{Duration, Instant};

/// Number of recently visited pages kept for live feeds
pub const RECENT_LIMIT: usize = 10;

/// Everything known about a run
#[derive(Debug)]
pub struct CrawlState {
    seed: String,
    site_root: Option<NormalizedUrl>,
    run_state: RunState,
    terminal_reason: Option<TerminalReason>,
    error: Option<String>,

    frontier: Frontier,
    visited: HashSet<NormalizedUrl>,
    pages: Vec<PageNode>,
    edges: Vec<LinkEdge>,
    edge_keys: HashSet<(String, String)>,
    recent: VecDeque<RecentPage>,

    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
    clock: Option<Instant>,
    frozen_elapsed: Option<Duration>,
}

impl CrawlState {
    /// Creates an idle state for the given raw seed
    pub fn new(seed: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            seed: seed.into(),
            site_root: None,
            run_state: RunState::Idle,
            terminal_reason: None,
            error: None,
            frontier: Frontier::new(),
            visited: HashSet::new(),
            pages: Vec::new(),
            edges: Vec::new(),
            edge_keys: HashSet::new(),
            recent: VecDeque::with_capacity(RECENT_LIMIT),
            created_at: now,
            started_at: None,
            finished_at: None,
            updated_at: now,
            clock: None,
            frozen_elapsed: None,
        }
    }

    // ===== Mutation (engine only) =====

    /// Moves `Idle -> Running` and enqueues the seed at depth 0
    pub fn begin(&mut self, site_root: NormalizedUrl) {
        if self.run_state != RunState::Idle {
            return;
        }
        let now = Utc::now();
        self.run_state = RunState::Running;
        self.started_at = Some(now);
        self.clock = Some(Instant::now());
        self.frontier.push(FrontierEntry::seed(site_root.clone()));
        self.site_root = Some(site_root);
        self.updated_at = now;
    }

    /// Enqueues a URL that is neither visited nor already queued
    ///
    /// Returns whether the entry was added.
    pub fn enqueue(&mut self, entry: FrontierEntry) -> bool {
        if self.is_frozen() || self.is_known(&entry.url) {
            return false;
        }
        let added = self.frontier.push(entry);
        if added {
            self.updated_at = Utc::now();
        }
        added
    }

    /// Takes the next frontier entry and moves its URL to the visited set
    ///
    /// # Returns
    ///
    /// * `Ok(Some(entry))` - The entry to fetch
    /// * `Ok(None)` - The frontier is empty
    /// * `Err(MapperError::InvariantViolation)` - The URL had already been visited
    pub fn dequeue(&mut self) -> Result<Option<FrontierEntry>, MapperError> {
        if self.is_frozen() {
            return Ok(None);
        }
        let Some(entry) = self.frontier.pop() else {
            return Ok(None);
        };
        if !self.visited.insert(entry.url.clone()) {
            return Err(MapperError::InvariantViolation(format!(
                "{} was queued after being visited",
                entry.url
            )));
        }
        self.updated_at = Utc::now();
        Ok(Some(entry))
    }

    /// Records a fetched page
    pub fn record_page(&mut self, page: PageNode) {
        if self.is_frozen() {
            return;
        }
        if self.recent.len() == RECENT_LIMIT {
            self.recent.pop_front();
        }
        self.recent.push_back(RecentPage::from(&page));
        self.pages.push(page);
        self.updated_at = Utc::now();
    }

    /// Records a link, ignoring repeats of the same (source, target) pair
    ///
    /// Returns whether the edge was new.
    pub fn record_edge(&mut self, edge: LinkEdge) -> bool {
        if self.is_frozen() {
            return false;
        }
        if !self
            .edge_keys
            .insert((edge.source.clone(), edge.target.clone()))
        {
            return false;
        }
        self.edges.push(edge);
        self.updated_at = Utc::now();
        true
    }

    /// Moves the run to the terminal state implied by `reason`
    ///
    /// After this call the state no longer changes.
    pub fn finish(&mut self, reason: TerminalReason, error: Option<String>) {
        if self.is_frozen() {
            return;
        }
        let now = Utc::now();
        self.run_state = reason.run_state();
        self.terminal_reason = Some(reason);
        self.error = error;
        self.finished_at = Some(now);
        self.frozen_elapsed = Some(self.clock.map(|c| c.elapsed()).unwrap_or_default());
        self.updated_at = now;
    }

    // ===== Reads =====

    /// The seed exactly as supplied
    pub fn seed(&self) -> &str {
        &self.seed
    }

    /// The normalized seed, once the run has started
    pub fn site_root(&self) -> Option<&NormalizedUrl> {
        self.site_root.as_ref()
    }

    pub fn run_state(&self) -> RunState {
        self.run_state
    }

    pub fn terminal_reason(&self) -> Option<TerminalReason> {
        self.terminal_reason
    }

    /// Error message of a failed run
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// True once a terminal state has been reached
    pub fn is_frozen(&self) -> bool {
        self.run_state.is_terminal()
    }

    /// Pages in the order they were visited
    pub fn pages(&self) -> &[PageNode] {
        &self.pages
    }

    /// Edges in the order they were discovered
    pub fn edges(&self) -> &[LinkEdge] {
        &self.edges
    }

    pub fn frontier(&self) -> &Frontier {
        &self.frontier
    }

    /// Returns whether the URL has been visited or is queued
    pub fn is_known(&self, url: &NormalizedUrl) -> bool {
        self.visited.contains(url) || self.frontier.contains(url)
    }

    pub fn is_visited(&self, url: &NormalizedUrl) -> bool {
        self.visited.contains(url)
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    pub fn queued_count(&self) -> usize {
        self.frontier.len()
    }

    /// Last few pages visited, oldest first
    pub fn recent(&self) -> impl Iterator<Item = &RecentPage> {
        self.recent.iter()
    }

    /// Most recently visited URL
    pub fn last_url(&self) -> Option<&str> {
        self.recent.back().map(|page| page.url.as_str())
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    /// Time of the last mutation
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Wall time since start; frozen once the run is terminal
    pub fn elapsed(&self) -> Duration {
        self.frozen_elapsed
            .or_else(|| self.clock.map(|c| c.elapsed()))
            .unwrap_or_default()
    }
}
