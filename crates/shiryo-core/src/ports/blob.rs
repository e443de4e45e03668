//! The blob-store port: object storage for documents and artifacts.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Errors from blob-store operations.
#[derive(Debug, Error)]
pub enum BlobError {
    /// The object does not exist.
    #[error("object not found: {0}")]
    NotFound(String),

    /// Transport or backend failure. Retryable.
    #[error("storage backend error: {0}")]
    Backend(String),

    /// The backend rejected the object (size, type, key).
    #[error("object rejected: {0}")]
    Rejected(String),
}

/// Object store for downloaded documents and generated visualizations.
///
/// Keys follow `task_{task_id}/raw/{filename}` for documents and
/// `task_{task_id}/visualization_{raw|pruned}.html` for artifacts. `put`
/// is idempotent by key: writing the same key twice leaves the last
/// content in place and returns the same storage key.
#[async_trait]
pub trait BlobStorePort: Send + Sync {
    /// Upload bytes under a key; returns the opaque storage key recorded
    /// in the catalog (`{bucket}/{key}`).
    async fn put(&self, key: &str, bytes: &[u8], content_type: &str)
        -> Result<String, BlobError>;

    /// Fetch the bytes stored under a key. Implementations also accept the
    /// storage key `put` returned.
    async fn get(&self, key: &str) -> Result<Vec<u8>, BlobError>;

    /// A URL granting read access to the object for `ttl`.
    async fn signed_url(&self, key: &str, ttl: Duration) -> Result<String, BlobError>;

    /// Remove the object; deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), BlobError>;
}

/// Blob key for a downloaded document.
#[must_use]
pub fn raw_key(task_id: i64, filename: &str) -> String {
    format!("task_{task_id}/raw/{filename}")
}

/// Blob key for a topology visualization.
#[must_use]
pub fn visualization_key(task_id: i64, kind: super::VizKind) -> String {
    format!("task_{task_id}/visualization_{}.html", kind.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::VizKind;

    #[test]
    fn key_layout() {
        assert_eq!(raw_key(7, "yoko.pdf"), "task_7/raw/yoko.pdf");
        assert_eq!(
            visualization_key(7, VizKind::Raw),
            "task_7/visualization_raw.html"
        );
        assert_eq!(
            visualization_key(7, VizKind::Pruned),
            "task_7/visualization_pruned.html"
        );
    }
}
