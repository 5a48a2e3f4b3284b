//! State module for tracking crawl progress
//!
//! This module provides the data model of a run.
//!
//! # Components
//!
//! - `RunState`: Lifecycle of a run (idle, running, completed, stopped, failed)
//! - `PageNode` / `LinkEdge`: Records of fetched pages and discovered links
//! - `CrawlState`: The per-run aggregate owned by one engine
//! - `SharedState`: A `CrawlState` shared with read-only observers

mod crawl_state;
mod page;
mod run_state;

// Re-export main types
pub use crawl_state::{CrawlState, RECENT_LIMIT};
pub use page::{LinkEdge, PageNode, PageOutcome, RecentPage};
pub use run_state::{RunState, TerminalReason};

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A crawl state shared between its engine and observers
pub type SharedState = Arc<RwLock<CrawlState>>;

/// Wraps a fresh state for sharing
pub fn shared(state: CrawlState) -> SharedState {
    Arc::new(RwLock::new(state))
}

/// Acquires a read guard, recovering the data if a writer panicked
pub fn read(state: &SharedState) -> RwLockReadGuard<'_, CrawlState> {
    state.read().unwrap_or_else(PoisonError::into_inner)
}

/// Acquires a write guard, recovering the data if a writer panicked
pub fn write(state: &SharedState) -> RwLockWriteGuard<'_, CrawlState> {
    state.write().unwrap_or_else(PoisonError::into_inner)
}
