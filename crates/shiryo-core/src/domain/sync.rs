//! Sync-log entries: one appended per detection run.

use chrono::{DateTime, Utc};

/// A row of the append-only sync log.
#[derive(Clone, Debug)]
pub struct SyncLogEntry {
    pub id: i64,
    /// Detection flavor, e.g. `incremental`.
    pub sync_type: String,
    /// Total rows seen upstream.
    pub source_count: i64,
    /// Seeds not yet present in the catalog.
    pub new_count: i64,
    /// Seeds whose URL hash diverged.
    pub changed_count: i64,
    pub created_at: DateTime<Utc>,
}
