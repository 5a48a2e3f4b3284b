//! Frontier of URLs waiting to be fetched
//!
//! The frontier is a plain FIFO queue. Breadth-first order falls out of it:
//! every entry is enqueued at its parent's depth plus one, so entries leave
//! the queue in non-decreasing depth order.

use crate::url::NormalizedUrl;
use std::collections::{HashSet, VecDeque};

/// A URL queued for fetching
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierEntry {
    /// The URL to fetch
    pub url: NormalizedUrl,

    /// Hops from the seed
    pub depth: u32,

    /// Source page of the link that first introduced this URL
    pub discovered_from: Option<NormalizedUrl>,
}

impl FrontierEntry {
    /// Creates the depth-0 entry for a seed
    pub fn seed(url: NormalizedUrl) -> Self {
        Self {
            url,
            depth: 0,
            discovered_from: None,
        }
    }
}

/// FIFO queue with constant-time membership checks
#[derive(Debug, Default)]
pub struct Frontier {
    queue: VecDeque<FrontierEntry>,
    pending: HashSet<NormalizedUrl>,
}

impl Frontier {
    /// Creates an empty frontier
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry to the back of the queue
    ///
    /// Returns false, leaving the queue untouched, if the URL is already
    /// pending.
    pub fn push(&mut self, entry: FrontierEntry) -> bool {
        if !self.pending.insert(entry.url.clone()) {
            return false;
        }
        self.queue.push_back(entry);
        true
    }

    /// Removes the oldest entry
    pub fn pop(&mut self) -> Option<FrontierEntry> {
        let entry = self.queue.pop_front()?;
        self.pending.remove(&entry.url);
        Some(entry)
    }

    /// Returns whether the URL is waiting in the queue
    pub fn contains(&self, url: &NormalizedUrl) -> bool {
        self.pending.contains(url)
    }

    /// Returns the number of URLs in the frontier
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Returns whether the frontier is empty
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Iterates over pending entries in fetch order
    pub fn iter(&self) -> impl Iterator<Item = &FrontierEntry> {
        self.queue.iter()
    }
}
