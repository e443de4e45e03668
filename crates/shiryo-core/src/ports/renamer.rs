//! The renamer port: (text, context) to a structured naming record.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::StructuredName;

/// Errors from a naming attempt. Terminal for the file.
#[derive(Debug, Error)]
pub enum RenameError {
    /// The naming backend could not be reached or returned an error status.
    #[error("naming backend error: {0}")]
    Api(String),

    /// The backend answered but no naming record could be recovered.
    #[error("malformed naming response: {0}")]
    MalformedResponse(String),

    /// The record was parseable but the composed name was empty.
    #[error("naming produced an empty name")]
    EmptyName,

    /// The call exceeded its wall-time budget.
    #[error("naming timed out after {0}s")]
    Timeout(u64),
}

/// Everything the renamer may use besides the document text.
#[derive(Clone, Debug, Default)]
pub struct RenameContext {
    pub url: String,
    pub title: String,
    pub breadcrumb: String,
    pub parent_title: String,
    pub original_name: String,
    /// Authoritative school name; when set it overrides whatever the model
    /// believes the university is.
    pub school_name: Option<String>,
}

/// A completed naming: the canonical file name, its fields, and audit data.
#[derive(Clone, Debug)]
pub struct NamingRecord {
    /// Sanitized canonical name ending in the file's extension.
    pub name: String,
    pub fields: StructuredName,
    pub confidence: f64,
    /// Model identifier that produced the record.
    pub model: String,
    /// The raw backend response, kept verbatim for auditing and imputation.
    pub raw: String,
}

/// Maps document text plus context to a structured naming record.
#[async_trait]
pub trait RenamerPort: Send + Sync {
    /// Produce a canonical name for a document with the given extension
    /// (no dot).
    async fn rename(
        &self,
        text: &str,
        context: &RenameContext,
        extension: &str,
    ) -> Result<NamingRecord, RenameError>;
}
