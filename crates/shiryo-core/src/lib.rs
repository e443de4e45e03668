//! Core domain types and port definitions for the shiryo pipeline.
//!
//! This crate holds the pure domain model (tasks, nodes, files, the
//! structured-name schema) and the trait boundaries toward every external
//! system the pipeline talks to: the task catalog, the blob store, the
//! upstream link catalog, the crawler, the extractor, and the renamer.
//! It performs no I/O of its own.

pub mod config;
pub mod domain;
pub mod ports;

// Re-export commonly used types for convenience
pub use config::PipelineConfig;
pub use domain::{
    DownloadStatus, FileRecord, NewNode, NodeRecord, ProcessStatus, Seed, SeedKind, StructuredName,
    SyncLogEntry, TaskPatch, TaskRecord, TaskStatus, document_extension, is_document_url,
    sanitize_file_name, url_hash, UNKNOWN_FIELD,
};
pub use ports::{
    raw_key, visualization_key, BlobError, BlobStorePort, CatalogPort, CrawlError, CrawlOutcome,
    CrawlerPort, DownloadError, DownloadOutcome, DownloaderPort, ExtractError, Extraction,
    ExtractorPort, NamingRecord, RenameContext, RenameError, RenamerPort, RepositoryError,
    UpstreamPort, VizKind,
};

// Silence unused dev-dependency warnings until we add mock-based tests
#[cfg(test)]
use mockall as _;
#[cfg(test)]
use tokio_test as _;
