//! Markdown outline generation
//!
//! Renders a sitemap graph as a human-readable document: run information,
//! an indented outline of the site following the order in which pages were
//! discovered, a page table, and lists of external and unfetched links.

use crate::output::{CrawlStatistics, GraphDocument};
use crate::state::{PageNode, PageOutcome};
use std::collections::HashMap;

/// Formats a graph document as a Markdown outline
///
/// The rendering depends only on the document, so equal documents give
/// equal text.
///
/// # Arguments
///
/// * `doc` - The sitemap graph
///
/// # Returns
///
/// A formatted markdown string
pub fn format_outline(doc: &GraphDocument) -> String {
    let stats = CrawlStatistics::from_document(doc);
    let mut md = String::new();

    let site = doc.site_root.as_deref().unwrap_or(&doc.seed);
    md.push_str(&format!("# Site Map: {}\n\n", site));

    // Run metadata
    md.push_str("## Run Information\n\n");
    md.push_str(&format!("- **Seed**: {}\n", doc.seed));
    match doc.terminal_reason {
        Some(reason) => md.push_str(&format!("- **Status**: {} ({})\n", doc.run_state, reason)),
        None => md.push_str(&format!("- **Status**: {}\n", doc.run_state)),
    }
    if let Some(started) = doc.started_at {
        md.push_str(&format!("- **Started**: {}\n", started.to_rfc3339()));
    }
    if let Some(finished) = doc.finished_at {
        md.push_str(&format!("- **Finished**: {}\n", finished.to_rfc3339()));
    }
    if let (Some(started), Some(finished)) = (doc.started_at, doc.finished_at) {
        let millis = (finished - started).num_milliseconds().max(0);
        md.push_str(&format!(
            "- **Duration**: {:.1} seconds\n",
            millis as f64 / 1000.0
        ));
    }
    md.push_str(&format!("- **Generated**: {}\n\n", doc.generated_at.to_rfc3339()));

    // Overall statistics
    md.push_str("## Overall Statistics\n\n");
    md.push_str(&format!("- **Pages**: {}\n", stats.total_pages));
    md.push_str(&format!(
        "- **Links**: {} ({} internal, {} external)\n",
        stats.total_links, stats.internal_links, stats.external_links
    ));
    md.push_str(&format!("- **Failed Pages**: {}\n", stats.failed_pages()));
    md.push_str(&format!(
        "- **Non-HTML Pages**: {}\n",
        stats.pages_with(PageOutcome::NotHtml)
    ));
    if let Some(depth) = stats.max_depth() {
        md.push_str(&format!("- **Deepest Level**: {}\n", depth));
    }
    md.push_str(&format!(
        "- **Success Rate**: {:.2}%\n\n",
        stats.success_rate()
    ));

    if !stats.depth_breakdown.is_empty() {
        md.push_str("| Depth | Pages |\n");
        md.push_str("|-------|-------|\n");
        for (depth, count) in &stats.depth_breakdown {
            md.push_str(&format!("| {} | {} |\n", depth, count));
        }
        md.push('\n');
    }

    // Outline
    md.push_str("## Outline\n\n");
    if doc.nodes.is_empty() {
        md.push_str("_No pages were visited._\n\n");
    } else {
        write_tree(&mut md, &doc.nodes);
        md.push('\n');
    }

    // Page table
    if !doc.nodes.is_empty() {
        md.push_str("## Pages\n\n");
        md.push_str("| URL | Title | Status | Depth |\n");
        md.push_str("|-----|-------|--------|-------|\n");
        for node in &doc.nodes {
            md.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                escape(&node.url),
                node.title.as_deref().map(escape).unwrap_or_default(),
                escape(&describe_status(node)),
                node.depth
            ));
        }
        md.push('\n');
    }

    // Links leaving the site
    let external = doc.external_targets();
    if !external.is_empty() {
        md.push_str("## External Links\n\n");
        for (target, count) in external {
            let pages = if count == 1 { "page" } else { "pages" };
            md.push_str(&format!("- <{}> (linked from {} {})\n", target, count, pages));
        }
        md.push('\n');
    }

    let unfetched = doc.unfetched_targets();
    if !unfetched.is_empty() {
        md.push_str("## Not Fetched\n\n");
        md.push_str("In-site links that were found but not visited before the run ended.\n\n");
        for target in unfetched {
            md.push_str(&format!("- <{}>\n", target));
        }
        md.push('\n');
    }

    md
}

/// Writes the discovery tree as a nested list
///
/// Each page is listed under the page whose link first introduced it.
/// Children keep visit order, which is breadth-first.
fn write_tree(md: &mut String, nodes: &[PageNode]) {
    let index: HashMap<&str, usize> = nodes
        .iter()
        .enumerate()
        .map(|(i, node)| (node.url.as_str(), i))
        .collect();

    let mut roots = Vec::new();
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    for (i, node) in nodes.iter().enumerate() {
        match node
            .discovered_from
            .as_deref()
            .and_then(|parent| index.get(parent))
        {
            Some(&parent) if parent != i => children[parent].push(i),
            _ => roots.push(i),
        }
    }

    // Iterative depth-first walk; pushing in reverse keeps visit order
    let mut stack: Vec<(usize, usize)> = roots.iter().rev().map(|&i| (i, 0)).collect();
    while let Some((i, level)) = stack.pop() {
        let node = &nodes[i];
        md.push_str(&"  ".repeat(level));
        md.push_str("- ");
        match &node.title {
            Some(title) => md.push_str(&format!("[{}](<{}>)", escape(title), node.url)),
            None => md.push_str(&format!("<{}>", node.url)),
        }
        if node.outcome != PageOutcome::Ok {
            md.push_str(&format!(" _({})_", describe_status(node)));
        }
        md.push('\n');

        for &child in children[i].iter().rev() {
            stack.push((child, level + 1));
        }
    }
}

/// Short status text for a page
fn describe_status(node: &PageNode) -> String {
    match node.outcome {
        PageOutcome::Ok => node
            .status
            .map(|s| s.to_string())
            .unwrap_or_else(|| "ok".to_string()),
        PageOutcome::HttpError => match node.status {
            Some(status) => format!("HTTP {}", status),
            None => "HTTP error".to_string(),
        },
        PageOutcome::NetworkError => match &node.error {
            Some(error) => format!("unreachable: {}", error),
            None => "unreachable".to_string(),
        },
        PageOutcome::NotHtml => match &node.content_type {
            Some(content_type) => format!("not HTML: {}", content_type),
            None => "not HTML".to_string(),
        },
        PageOutcome::OffSiteRedirect => match &node.redirected_to {
            Some(target) => format!("redirects off-site to {}", target),
            None => "redirects off-site".to_string(),
        },
    }
}

/// Escapes characters that would break table cells or link labels
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '|' | '[' | ']' | '\\' | '*' | '_' | '`' => {
                out.push('\\');
                out.push(c);
            }
            '\n' | '\r' | '\t' => out.push(' '),
            _ => out.push(c),
        }
    }
    out
}
