//! Output module for building sitemap documents
//!
//! This module handles:
//! - Building the JSON graph document from a run's state
//! - Rendering the Markdown outline
//! - Writing both documents to the output directory
//! - Computing crawl statistics
//!
//! Building is pure: it reads the state and never changes it, so it can be
//! called any number of times on a terminal run with identical results.

mod graph;
mod markdown;
pub mod stats;

pub use graph::GraphDocument;
pub use markdown::format_outline;
pub use stats::{print_statistics, CrawlStatistics};

use crate::config::OutputConfig;
use crate::state::CrawlState;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize sitemap: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Both renderings of one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SitemapDocuments {
    pub graph: GraphDocument,
    pub outline: String,
}

/// Where the documents were written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenDocuments {
    pub graph_path: PathBuf,
    pub outline_path: PathBuf,
}

impl SitemapDocuments {
    /// Builds both documents from a run's state
    ///
    /// # Arguments
    ///
    /// * `state` - The run state; usually terminal, but any state is accepted
    pub fn build(state: &CrawlState) -> Self {
        let graph = GraphDocument::from_state(state);
        let outline = format_outline(&graph);
        Self { graph, outline }
    }

    pub fn graph_json(&self) -> OutputResult<String> {
        self.graph.to_json()
    }

    pub fn statistics(&self) -> CrawlStatistics {
        CrawlStatistics::from_document(&self.graph)
    }

    /// Writes both documents into `directory`, creating it if needed
    ///
    /// # Arguments
    ///
    /// * `directory` - Output directory
    /// * `names` - File names for the graph and the outline
    ///
    /// # Returns
    ///
    /// * `Ok(WrittenDocuments)` - Paths of the written files
    /// * `Err(OutputError)` - Failed to create the directory or write a file
    pub fn write_to(&self, directory: &Path, names: &OutputConfig) -> OutputResult<WrittenDocuments> {
        // Serialize first so a failure leaves no partial output behind
        let json = self.graph_json()?;

        fs::create_dir_all(directory)?;

        let graph_path = directory.join(&names.graph_file);
        let mut file = File::create(&graph_path)?;
        file.write_all(json.as_bytes())?;

        let outline_path = directory.join(&names.outline_file);
        let mut file = File::create(&outline_path)?;
        file.write_all(self.outline.as_bytes())?;

        tracing::info!(
            "Wrote sitemap to {} and {}",
            graph_path.display(),
            outline_path.display()
        );

        Ok(WrittenDocuments {
            graph_path,
            outline_path,
        })
    }
}

/// Builds the sitemap documents for a run
///
/// Shorthand for [`SitemapDocuments::build`].
pub fn build(state: &CrawlState) -> SitemapDocuments {
    SitemapDocuments::build(state)
}
