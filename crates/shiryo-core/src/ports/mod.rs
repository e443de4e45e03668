//! Port definitions (trait abstractions) for external systems.
//!
//! Ports define the interfaces the pipeline expects from infrastructure:
//! the task catalog, the blob store, the upstream link catalog, and the
//! three collaborators (crawler, extractor, renamer). They carry no
//! implementation details and use only domain types.
//!
//! # Design Rules
//!
//! - No `sqlx` or `reqwest` types in any signature
//! - Per-item failures are values, not panics; adapters convert every
//!   internal error into the port's error enum

pub mod blob;
pub mod catalog;
pub mod crawler;
pub mod downloader;
pub mod extractor;
pub mod renamer;
pub mod upstream;

use thiserror::Error;

pub use blob::{raw_key, visualization_key, BlobError, BlobStorePort};
pub use catalog::{CatalogPort, VizKind};
pub use crawler::{CrawlError, CrawlOutcome, CrawlerPort};
pub use downloader::{DownloadError, DownloadOutcome, DownloaderPort};
pub use extractor::{ExtractError, Extraction, ExtractorPort};
pub use renamer::{NamingRecord, RenameContext, RenameError, RenamerPort};
pub use upstream::UpstreamPort;

/// Errors for catalog and upstream repository operations.
///
/// Storage errors (connection loss, busy database) are retryable; the
/// adapters wrap writes in a bounded retry loop before surfacing them.
/// `NotFound` and `Constraint` are fatal for the operation.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The requested entity was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Storage backend error (connection, I/O). Retryable.
    #[error("storage error: {0}")]
    Storage(String),

    /// Serialization or deserialization of a stored value failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A constraint was violated (foreign key, unique index, bad input).
    #[error("constraint violation: {0}")]
    Constraint(String),
}

impl RepositoryError {
    /// Whether the operation is worth retrying.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}
