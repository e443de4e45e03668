//! The extractor port: document bytes to text.

use async_trait::async_trait;
use thiserror::Error;

/// Errors from text extraction. Terminal for the file, never for the task.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The bytes could not be parsed as the claimed format.
    #[error("malformed {format} document: {message}")]
    Malformed { format: String, message: String },

    /// The document parsed but yielded no text.
    #[error("document contains no extractable text")]
    Empty,

    /// No parser exists for this extension (legacy binary formats).
    #[error("unsupported document format: {0}")]
    Unsupported(String),

    /// Extraction exceeded its wall-time budget.
    #[error("extraction timed out after {0}s")]
    Timeout(u64),
}

/// Extracted text plus whatever structure the parser could report.
#[derive(Clone, Debug)]
pub struct Extraction {
    /// Text content, truncated to the configured ceiling.
    pub text: String,
    /// Page count where the format has pages.
    pub pages: Option<usize>,
}

/// Text extraction from document bytes.
///
/// Implementations bound both output size and wall time, and convert every
/// internal parser failure into an `ExtractError`; nothing leaks.
#[async_trait]
pub trait ExtractorPort: Send + Sync {
    /// Extract text from `bytes` interpreted as `extension` (no dot).
    async fn extract(&self, bytes: &[u8], extension: &str) -> Result<Extraction, ExtractError>;
}
