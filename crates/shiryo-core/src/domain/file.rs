//! Files: downloadable documents derived from pruned file nodes.
//!
//! A file tracks two independent axes: `download_status` (bytes present in
//! the blob store) and `process_status` (canonical name assigned). A file
//! is done only when both axes are terminal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Bytes-on-blob axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadStatus {
    Pending,
    Downloading,
    /// Bytes are in the blob store.
    Downloaded,
    /// Download finished and the record is fully bookkept.
    Completed,
    Failed,
}

impl DownloadStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Downloading => "downloading",
            Self::Downloaded => "downloaded",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "downloading" => Self::Downloading,
            "downloaded" => Self::Downloaded,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            _ => Self::Pending,
        }
    }

    /// Whether the bytes are available for extraction.
    #[must_use]
    pub const fn has_bytes(&self) -> bool {
        matches!(self, Self::Downloaded | Self::Completed)
    }

    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Downloaded | Self::Completed | Self::Failed)
    }
}

/// Naming axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ProcessStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "processing" => Self::Processing,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            _ => Self::Pending,
        }
    }

    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// A row of the file table.
#[derive(Clone, Debug)]
pub struct FileRecord {
    pub id: i64,
    pub task_id: i64,
    pub node_id: i64,
    pub original_url: String,
    pub original_name: String,
    pub renamed_name: Option<String>,
    pub file_extension: String,
    pub file_size: Option<i64>,
    /// Key of the uploaded object, set once the download lands.
    pub storage_key: Option<String>,
    pub download_status: DownloadStatus,
    pub process_status: ProcessStatus,
    pub llm_model: Option<String>,
    pub llm_confidence: Option<f64>,
    pub llm_raw_response: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}
