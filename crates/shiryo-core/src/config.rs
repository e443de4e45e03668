//! Pipeline configuration.

use serde::{Deserialize, Serialize};

use crate::domain::SeedKind;

/// Hard ceiling on crawl depth regardless of what the operator asks for.
pub const MAX_CRAWL_DEPTH: u32 = 10;

/// Tunable knobs for a pipeline run.
///
/// Defaults match the production deployment of the original system;
/// everything is overridable from the CLI or environment.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// BFS depth bound, clamped to `[0, MAX_CRAWL_DEPTH]`.
    pub crawl_depth: u32,

    /// Crawl worker pool size (each holds a page-fetch session).
    pub crawl_workers: usize,
    /// Download worker pool size (lightweight I/O).
    pub download_workers: usize,
    /// Extract worker pool size (CPU heavy).
    pub extract_workers: usize,
    /// Rename worker pool size (bounded by the LLM vendor rate limit).
    pub rename_workers: usize,

    /// Seeds fetched per sync-detector poll.
    pub batch_size: usize,

    /// Per-file download cap in bytes.
    pub max_file_size_bytes: u64,
    /// Per-file download budget in seconds.
    pub download_timeout_s: u64,
    /// Per-file extraction budget in seconds.
    pub extract_timeout_s: u64,
    /// Per-file naming budget in seconds.
    pub rename_timeout_s: u64,

    /// Extraction page/paragraph cap.
    pub max_pages: usize,
    /// Extraction output ceiling in bytes; longer text is truncated.
    pub max_text_bytes: usize,

    /// Stage gate: skip the download stage entirely (debugging).
    pub enable_download: bool,
    /// Stage gate: skip extraction and renaming (debugging).
    pub enable_rename: bool,

    /// Re-enqueue tasks that previously failed.
    pub include_failed: bool,
    /// Re-enqueue tasks whose upstream URL changed.
    pub include_changed: bool,
    /// Restrict processing to one seed kind.
    pub kind_filter: Option<SeedKind>,

    /// Stop after this many tasks; `None` runs until the backlog drains.
    pub max_tasks: Option<usize>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            crawl_depth: 1,
            crawl_workers: 2,
            download_workers: 8,
            extract_workers: 2,
            rename_workers: 4,
            batch_size: 50,
            max_file_size_bytes: 50 * 1024 * 1024,
            download_timeout_s: 60,
            extract_timeout_s: 300,
            rename_timeout_s: 120,
            max_pages: 2,
            max_text_bytes: 512 * 1024,
            enable_download: true,
            enable_rename: true,
            include_failed: true,
            include_changed: true,
            kind_filter: None,
            max_tasks: None,
        }
    }
}

impl PipelineConfig {
    /// Clamp out-of-range values into their valid ranges.
    ///
    /// Worker pools never drop below one; depth never exceeds the hard
    /// ceiling.
    #[must_use]
    pub fn clamped(mut self) -> Self {
        self.crawl_depth = self.crawl_depth.min(MAX_CRAWL_DEPTH);
        self.crawl_workers = self.crawl_workers.max(1);
        self.download_workers = self.download_workers.max(1);
        self.extract_workers = self.extract_workers.max(1);
        self.rename_workers = self.rename_workers.max(1);
        self.batch_size = self.batch_size.max(1);
        self
    }

    /// Queue capacity in front of a consumer pool: twice its worker count.
    #[must_use]
    pub fn queue_capacity(workers: usize) -> usize {
        (workers * 2).max(1)
    }
}
