//! Pipeline-level errors.
//!
//! Only failures the worker loops cannot absorb travel through this type:
//! initialization problems and fatal catalog errors. Per-item failures are
//! written to the catalog and never unwind.

use thiserror::Error;

use shiryo_core::ports::{BlobError, RepositoryError};

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Catalog or upstream failure that survived the retry loop.
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// Blob-store failure outside a per-file operation.
    #[error(transparent)]
    Blob(#[from] BlobError),

    /// A component could not be constructed or wired.
    #[error("initialization failed: {0}")]
    Init(String),

    /// Cooperative shutdown; callers treat this as a clean exit.
    #[error("cancelled")]
    Cancelled,
}
