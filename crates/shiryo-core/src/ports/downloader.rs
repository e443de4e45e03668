//! The downloader port: fetch a document URL into the blob store.

use async_trait::async_trait;
use thiserror::Error;

use super::BlobError;

/// Errors from one download attempt. All are terminal for the file, never
/// fatal for the task.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Non-2xx response; the body is discarded.
    #[error("HTTP {0}")]
    Http(u16),

    /// The body exceeded the size cap, before or during streaming.
    #[error("file too large: {size} bytes (limit {limit})")]
    Oversize { size: u64, limit: u64 },

    /// The response MIME maps to no supported document type.
    #[error("unsupported content type: {0}")]
    UnsupportedType(String),

    /// DNS, connect, or mid-body transport failure after retries.
    #[error("network error: {0}")]
    Network(String),

    /// The whole attempt exceeded its wall-time budget.
    #[error("download timed out after {0}s")]
    Timeout(u64),

    /// The blob store refused the object.
    #[error("blob store error: {0}")]
    Blob(#[from] BlobError),
}

/// A completed download.
#[derive(Clone, Debug)]
pub struct DownloadOutcome {
    /// Storage key the catalog records (`{bucket}/{key}`).
    pub storage_key: String,
    /// Final object file name, extension included.
    pub file_name: String,
    /// Bytes streamed.
    pub size: u64,
    /// Content type the object was stored with.
    pub content_type: String,
}

/// Fetches a URL into the blob store under a key prefix with size, type,
/// and timeout enforcement.
#[async_trait]
pub trait DownloaderPort: Send + Sync {
    /// Fetch `url` into the store under `key_prefix` (no trailing slash),
    /// e.g. `task_42/raw`. `name_override`, when given, wins the filename
    /// resolution.
    async fn download(
        &self,
        url: &str,
        key_prefix: &str,
        name_override: Option<&str>,
    ) -> Result<DownloadOutcome, DownloadError>;
}
