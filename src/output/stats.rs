//! Statistics over a sitemap graph
//!
//! This module provides functionality for summarizing a crawl's pages and
//! links and displaying the summary after a batch run.

use crate::output::GraphDocument;
use crate::state::PageOutcome;
use std::collections::BTreeMap;

/// Crawl statistics summary
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlStatistics {
    /// Total number of pages visited
    pub total_pages: u64,

    /// Count of pages by fetch outcome
    pub pages_by_outcome: BTreeMap<PageOutcome, u64>,

    /// Count of pages by depth from the seed
    pub depth_breakdown: BTreeMap<u32, u64>,

    /// Total number of distinct links recorded
    pub total_links: u64,

    /// Links whose target belongs to the site
    pub internal_links: u64,

    /// Links leaving the site
    pub external_links: u64,

    /// In-scope link targets that were never fetched
    pub unfetched_targets: u64,
}

impl CrawlStatistics {
    /// Computes statistics from a graph document
    ///
    /// # Arguments
    ///
    /// * `doc` - The sitemap graph
    pub fn from_document(doc: &GraphDocument) -> Self {
        let mut stats = Self {
            total_pages: doc.nodes.len() as u64,
            total_links: doc.edges.len() as u64,
            unfetched_targets: doc.unfetched_targets().len() as u64,
            ..Self::default()
        };

        for node in &doc.nodes {
            *stats.pages_by_outcome.entry(node.outcome).or_insert(0) += 1;
            *stats.depth_breakdown.entry(node.depth).or_insert(0) += 1;
        }

        for edge in &doc.edges {
            if edge.in_scope {
                stats.internal_links += 1;
            } else {
                stats.external_links += 1;
            }
        }

        stats
    }

    pub fn pages_with(&self, outcome: PageOutcome) -> u64 {
        self.pages_by_outcome.get(&outcome).copied().unwrap_or(0)
    }

    /// Pages that ended in an HTTP or network error
    pub fn failed_pages(&self) -> u64 {
        self.pages_by_outcome
            .iter()
            .filter(|(outcome, _)| outcome.is_error())
            .map(|(_, count)| count)
            .sum()
    }

    /// Percentage of pages fetched without error
    pub fn success_rate(&self) -> f64 {
        if self.total_pages == 0 {
            return 0.0;
        }
        (self.total_pages - self.failed_pages()) as f64 / self.total_pages as f64 * 100.0
    }

    pub fn max_depth(&self) -> Option<u32> {
        self.depth_breakdown.keys().next_back().copied()
    }
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Crawl Statistics ===\n");

    println!("Overview:");
    println!("  Pages visited: {}", stats.total_pages);
    println!(
        "  Links found: {} ({} internal, {} external)",
        stats.total_links, stats.internal_links, stats.external_links
    );
    println!("  In-site links not fetched: {}", stats.unfetched_targets);
    println!("  Success rate: {:.1}%", stats.success_rate());
    if let Some(depth) = stats.max_depth() {
        println!("  Deepest level: {}", depth);
    }
    println!();

    println!("Pages by Outcome:");
    let mut outcome_counts: Vec<_> = stats.pages_by_outcome.iter().collect();
    outcome_counts.sort_by(|a, b| b.1.cmp(a.1));

    for (outcome, count) in outcome_counts {
        let percentage = if stats.total_pages > 0 {
            (*count as f64 / stats.total_pages as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", outcome.as_str(), count, percentage);
    }
    println!();

    if !stats.depth_breakdown.is_empty() {
        println!("Pages by Depth:");
        for (depth, count) in &stats.depth_breakdown {
            println!("  {}: {}", depth, count);
        }
        println!();
    }
}
