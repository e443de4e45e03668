//! Tasks: one durable processing attempt per seed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of a task as it moves through the pipeline.
///
/// The lattice is monotonic: `pending → crawling → downloaded → processing
/// → completed`, with `failed` reachable from any working state. A task
/// re-enters `pending` only through `upsert_task`, which counts as a wipe
/// of the previous attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Created by sync detection, not yet picked up.
    Pending,
    /// A crawl worker owns it.
    Crawling,
    /// Crawl finished; file records exist and downloads are in flight.
    Downloaded,
    /// All downloads terminal; extraction and renaming in flight.
    Processing,
    /// Every file reached a terminal process status.
    Completed,
    /// The crawl step failed, or the attempt was interrupted.
    Failed,
}

impl TaskStatus {
    /// String representation for database storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Crawling => "crawling",
            Self::Downloaded => "downloaded",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Parse from the stored string. Unknown values default to `Pending`.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "crawling" => Self::Crawling,
            "downloaded" => Self::Downloaded,
            "processing" => Self::Processing,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            _ => Self::Pending,
        }
    }

    /// Whether the runtime may move a task from `self` to `next`.
    ///
    /// `failed` is reachable from every working state; `pending` is never a
    /// valid runtime target (only `upsert_task` resets to it).
    #[must_use]
    pub fn can_transition_to(&self, next: Self) -> bool {
        if next == Self::Pending {
            return false;
        }
        if next == Self::Failed {
            return !matches!(self, Self::Completed | Self::Failed);
        }
        matches!(
            (self, next),
            (Self::Pending, Self::Crawling)
                | (Self::Crawling, Self::Downloaded)
                | (Self::Downloaded, Self::Processing)
                | (Self::Processing, Self::Completed)
                // A crawl that yields zero files goes straight to completed.
                | (Self::Downloaded, Self::Completed)
        )
    }

    /// Terminal states are never left by the runtime.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A row of the task table.
#[derive(Clone, Debug)]
pub struct TaskRecord {
    pub id: i64,
    /// Upstream row id; unique per task.
    pub source_id: i64,
    pub source_url: String,
    /// `md5(source_url)`; divergence from the upstream hash marks the row
    /// stale.
    pub url_hash: String,
    /// Authoritative school name resolved from the upstream per-kind table.
    pub school_name: Option<String>,
    pub status: TaskStatus,
    pub node_count: i64,
    pub pruned_count: i64,
    pub file_count: i64,
    pub error_message: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Optional fields written together with a status change.
#[derive(Clone, Debug, Default)]
pub struct TaskPatch {
    pub node_count: Option<i64>,
    pub pruned_count: Option<i64>,
    pub file_count: Option<i64>,
    pub error_message: Option<String>,
}

impl TaskPatch {
    /// A patch carrying only an error message.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error_message: Some(message.into()),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_storage() {
        for status in [
            TaskStatus::Pending,
            TaskStatus::Crawling,
            TaskStatus::Downloaded,
            TaskStatus::Processing,
            TaskStatus::Completed,
            TaskStatus::Failed,
        ] {
            assert_eq!(TaskStatus::parse(status.as_str()), status);
        }
    }

    #[test]
    fn lattice_is_monotonic() {
        use TaskStatus::*;
        assert!(Pending.can_transition_to(Crawling));
        assert!(Crawling.can_transition_to(Downloaded));
        assert!(Downloaded.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Completed));
        assert!(Downloaded.can_transition_to(Completed));

        // No going back
        assert!(!Crawling.can_transition_to(Crawling));
        assert!(!Downloaded.can_transition_to(Crawling));
        assert!(!Completed.can_transition_to(Processing));
    }

    #[test]
    fn pending_is_never_a_runtime_target() {
        use TaskStatus::*;
        for from in [Pending, Crawling, Downloaded, Processing, Completed, Failed] {
            assert!(!from.can_transition_to(Pending), "{from} -> pending");
        }
    }

    #[test]
    fn failed_reachable_from_working_states_only() {
        use TaskStatus::*;
        assert!(Pending.can_transition_to(Failed));
        assert!(Crawling.can_transition_to(Failed));
        assert!(Processing.can_transition_to(Failed));
        assert!(!Completed.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Failed));
    }

    #[test]
    fn terminal_states() {
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(!TaskStatus::Processing.is_terminal());
    }
}
