//! Progress snapshots and live events

use crate::state::{CrawlState, PageNode, PageOutcome, RecentPage, RunState, TerminalReason};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a run held by the gateway
pub type RunId = Uuid;

/// Point-in-time view of a run
///
/// Built under one read lock, so the counts always agree with each other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<RunId>,

    pub seed: String,
    pub state: RunState,

    /// True once the run can no longer change
    pub terminal: bool,

    pub reason: Option<TerminalReason>,
    pub error: Option<String>,

    /// URLs dequeued so far
    pub visited: usize,

    /// URLs waiting in the frontier
    pub queued: usize,

    pub pages: usize,
    pub links: usize,

    /// Pages that ended in an HTTP or network error
    pub failed_pages: usize,

    pub elapsed_ms: u64,
    pub last_url: Option<String>,

    /// Most recent pages, oldest first
    pub recent: Vec<RecentPage>,

    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl ProgressSnapshot {
    /// Captures the current state of a run
    pub fn capture(state: &CrawlState) -> Self {
        let run_state = state.run_state();
        Self {
            run_id: None,
            seed: state.seed().to_string(),
            state: run_state,
            terminal: run_state.is_terminal(),
            reason: state.terminal_reason(),
            error: state.error().map(str::to_string),
            visited: state.visited_count(),
            queued: state.queued_count(),
            pages: state.pages().len(),
            links: state.edges().len(),
            failed_pages: state
                .pages()
                .iter()
                .filter(|p| p.outcome.is_error())
                .count(),
            elapsed_ms: u64::try_from(state.elapsed().as_millis()).unwrap_or(u64::MAX),
            last_url: state.last_url().map(str::to_string),
            recent: state.recent().cloned().collect(),
            started_at: state.started_at(),
            finished_at: state.finished_at(),
        }
    }

    pub fn with_run_id(mut self, run_id: RunId) -> Self {
        self.run_id = Some(run_id);
        self
    }
}

/// Events pushed to live subscribers while a run progresses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// The seed was accepted and the run is now running
    Started { seed: String, site_root: String },

    /// A page was fetched and its links recorded
    Page {
        url: String,
        depth: u32,
        status: Option<u16>,
        outcome: PageOutcome,
        visited: usize,
        queued: usize,
    },

    /// The run reached a terminal state; no further events follow
    Finished {
        state: RunState,
        reason: TerminalReason,
        pages: usize,
        links: usize,
        error: Option<String>,
    },
}

impl ProgressEvent {
    pub(crate) fn page(page: &PageNode, visited: usize, queued: usize) -> Self {
        Self::Page {
            url: page.url.clone(),
            depth: page.depth,
            status: page.status,
            outcome: page.outcome,
            visited,
            queued,
        }
    }

    pub(crate) fn finished(state: &CrawlState) -> Option<Self> {
        let reason = state.terminal_reason()?;
        Some(Self::Finished {
            state: state.run_state(),
            reason,
            pages: state.pages().len(),
            links: state.edges().len(),
            error: state.error().map(str::to_string),
        })
    }

    /// Event name used on the wire
    pub fn name(&self) -> &'static str {
        match self {
            Self::Started { .. } => "started",
            Self::Page { .. } => "page",
            Self::Finished { .. } => "finished",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished { .. })
    }
}
