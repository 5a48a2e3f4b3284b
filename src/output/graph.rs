//! The JSON sitemap graph

use crate::output::OutputResult;
use crate::state::{CrawlState, LinkEdge, PageNode, RunState, TerminalReason};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Machine-readable sitemap: every visited page and every recorded link
///
/// Nodes appear in visit order and edges in discovery order, so two builds
/// from the same state serialize to identical bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphDocument {
    /// The seed as supplied
    pub seed: String,

    /// The normalized seed that defines the site
    pub site_root: Option<String>,

    /// Time of the last state change the document reflects
    pub generated_at: DateTime<Utc>,

    pub run_state: RunState,
    pub terminal_reason: Option<TerminalReason>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,

    pub total_pages: usize,
    pub total_links: usize,

    pub nodes: Vec<PageNode>,
    pub edges: Vec<LinkEdge>,
}

impl GraphDocument {
    /// Builds the document from a run's state
    pub fn from_state(state: &CrawlState) -> Self {
        Self {
            seed: state.seed().to_string(),
            site_root: state.site_root().map(ToString::to_string),
            generated_at: state.updated_at(),
            run_state: state.run_state(),
            terminal_reason: state.terminal_reason(),
            started_at: state.started_at(),
            finished_at: state.finished_at(),
            total_pages: state.pages().len(),
            total_links: state.edges().len(),
            nodes: state.pages().to_vec(),
            edges: state.edges().to_vec(),
        }
    }

    /// Serializes as pretty-printed JSON with a trailing newline
    pub fn to_json(&self) -> OutputResult<String> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        Ok(json)
    }

    pub fn from_json(json: &str) -> OutputResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Looks up a node by its normalized URL
    pub fn node(&self, url: &str) -> Option<&PageNode> {
        self.nodes.iter().find(|node| node.url == url)
    }

    pub fn node_urls(&self) -> BTreeSet<&str> {
        self.nodes.iter().map(|node| node.url.as_str()).collect()
    }

    /// In-scope link targets that were never fetched (limits, stop, depth)
    pub fn unfetched_targets(&self) -> BTreeSet<&str> {
        let fetched = self.node_urls();
        self.edges
            .iter()
            .filter(|edge| edge.in_scope && !fetched.contains(edge.target.as_str()))
            .map(|edge| edge.target.as_str())
            .collect()
    }

    /// Out-of-scope link targets, each with the number of pages linking to it
    pub fn external_targets(&self) -> Vec<(&str, usize)> {
        let mut counts: Vec<(&str, usize)> = Vec::new();
        for edge in self.edges.iter().filter(|edge| !edge.in_scope) {
            match counts.iter_mut().find(|(target, _)| *target == edge.target) {
                Some((_, count)) => *count += 1,
                None => counts.push((edge.target.as_str(), 1)),
            }
        }
        counts.sort_by(|a, b| a.0.cmp(b.0));
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::FrontierEntry;
    use crate::state::PageOutcome;
    use crate::url::normalize;

    fn node(url: &str, depth: u32) -> PageNode {
        PageNode {
            url: url.to_string(),
            status: Some(200),
            content_type: Some("text/html".to_string()),
            title: Some("T".to_string()),
            depth,
            outcome: PageOutcome::Ok,
            error: None,
            redirected_to: None,
            discovered_from: None,
            first_seen: Utc::now(),
        }
    }

    fn edge(source: &str, target: &str, in_scope: bool) -> LinkEdge {
        LinkEdge {
            source: source.to_string(),
            target: target.to_string(),
            in_scope,
        }
    }

    fn finished_state() -> CrawlState {
        let mut state = CrawlState::new("http://example.test");
        state.begin(normalize("http://example.test/", None).unwrap());
        state.dequeue().unwrap();
        state.record_page(node("http://example.test/", 0));
        state.record_edge(edge("http://example.test/", "http://example.test/a", true));
        state.record_edge(edge("http://example.test/", "https://other.test/", false));
        state.enqueue(FrontierEntry {
            url: normalize("http://example.test/a", None).unwrap(),
            depth: 1,
            discovered_from: None,
        });
        state.finish(TerminalReason::PageLimit, None);
        state
    }

    #[test]
    fn test_from_state() {
        let doc = GraphDocument::from_state(&finished_state());

        assert_eq!(doc.seed, "http://example.test");
        assert_eq!(doc.site_root.as_deref(), Some("http://example.test/"));
        assert_eq!(doc.run_state, RunState::Completed);
        assert_eq!(doc.terminal_reason, Some(TerminalReason::PageLimit));
        assert_eq!(doc.total_pages, 1);
        assert_eq!(doc.total_links, 2);
    }

    #[test]
    fn test_json_keys() {
        let doc = GraphDocument::from_state(&finished_state());
        let value: serde_json::Value = serde_json::from_str(&doc.to_json().unwrap()).unwrap();

        assert!(value["nodes"].is_array());
        assert!(value["edges"].is_array());
        assert!(value["generated_at"].is_string());
        assert_eq!(value["seed"], "http://example.test");
        assert_eq!(value["run_state"], "completed");
        assert_eq!(value["nodes"][0]["outcome"], "ok");
    }

    #[test]
    fn test_json_parses_back() {
        let doc = GraphDocument::from_state(&finished_state());
        let parsed = GraphDocument::from_json(&doc.to_json().unwrap()).unwrap();
        assert_eq!(parsed, doc);
    }

    #[test]
    fn test_unfetched_and_external_targets() {
        let doc = GraphDocument::from_state(&finished_state());

        assert_eq!(
            doc.unfetched_targets().into_iter().collect::<Vec<_>>(),
            vec!["http://example.test/a"]
        );
        assert_eq!(doc.external_targets(), vec![("https://other.test/", 1)]);
        assert!(doc.node("http://example.test/").is_some());
        assert!(doc.node("http://example.test/a").is_none());
    }
}
