//! The crawler port: bounded-depth site discovery plus pruning.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::NewNode;

/// Errors from a crawl attempt. Any of these fails the owning task.
#[derive(Debug, Error)]
pub enum CrawlError {
    /// The seed page could not be fetched at all.
    #[error("navigation failed: {0}")]
    Navigation(String),

    /// A page exceeded its render/fetch budget. When the seed page itself
    /// times out the crawl fails; inner pages are dropped silently.
    #[error("render timed out: {0}")]
    RenderTimeout(String),

    /// Link or content extraction failed.
    #[error("extraction failed: {0}")]
    Extraction(String),

    /// The crawl produced zero usable nodes (captcha wall, empty page).
    #[error("no reachable content")]
    NoContent,

    /// The pruning pass failed.
    #[error("pruning failed: {0}")]
    Pruning(String),

    /// Cooperative shutdown; not recorded as a task error.
    #[error("cancelled")]
    Cancelled,
}

/// Result of a completed crawl.
#[derive(Clone, Debug)]
pub struct CrawlOutcome {
    /// Discovered nodes; index 0 is the seed page with `parent_index = -1`.
    pub nodes: Vec<NewNode>,
    /// Node indices the pruning pass retained.
    pub retained: Vec<i64>,
    /// Topology visualization of every discovered node.
    pub raw_html: String,
    /// Topology visualization restricted to the retained set.
    pub pruned_html: String,
}

/// Bounded-depth site discovery.
///
/// The pipeline requires only: a terminating BFS bounded by `depth`, node
/// indices forming a total order starting at 0 for the root, and file
/// detection matching the document-extension rule. No ordering between
/// siblings and no stability across runs is assumed.
#[async_trait]
pub trait CrawlerPort: Send + Sync {
    /// Crawl `seed_url` to `depth`, then run the pruning pass. `tag` names
    /// the attempt (e.g. `task_42`) for logging and temp artifacts.
    async fn crawl(&self, seed_url: &str, depth: u32, tag: &str)
        -> Result<CrawlOutcome, CrawlError>;
}
