//! The catalog port: durable store of tasks, nodes, files, and sync log.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};

use crate::domain::{
    DownloadStatus, FileRecord, NewNode, NodeRecord, ProcessStatus, SyncLogEntry, TaskPatch,
    TaskRecord, TaskStatus,
};

use super::RepositoryError;

/// Which topology visualization a stored artifact shows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VizKind {
    /// Every node the crawl discovered.
    Raw,
    /// The retained subtree after pruning.
    Pruned,
}

impl VizKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Pruned => "pruned",
        }
    }
}

/// Persistent relational store for pipeline state.
///
/// Every operation is atomic. Implementations retry transient storage
/// failures internally (3 attempts, linear backoff) and surface
/// `RepositoryError::Constraint` immediately.
#[async_trait]
pub trait CatalogPort: Send + Sync {
    // ---- tasks ----

    /// Insert a task for a seed, or reset the existing row for the same
    /// `source_id` back to `pending` with the new URL, hash, and school.
    /// Returns the task id. Used for fresh seeds and re-attempts alike.
    async fn upsert_task(
        &self,
        source_id: i64,
        source_url: &str,
        school_name: Option<&str>,
    ) -> Result<i64, RepositoryError>;

    /// Move a task through the status lattice, writing any patch fields.
    /// Stamps `started_at` on entering `crawling` and `completed_at` on
    /// entering `completed` or `failed`.
    async fn update_task_status(
        &self,
        task_id: i64,
        status: TaskStatus,
        patch: TaskPatch,
    ) -> Result<(), RepositoryError>;

    async fn get_task(&self, task_id: i64) -> Result<Option<TaskRecord>, RepositoryError>;

    async fn get_task_by_source_id(
        &self,
        source_id: i64,
    ) -> Result<Option<TaskRecord>, RepositoryError>;

    /// Every `source_id` the catalog already knows about.
    async fn get_all_task_source_ids(&self) -> Result<HashSet<i64>, RepositoryError>;

    /// `source_id`s whose stored `url_hash` differs from the given upstream
    /// hash. Ids unknown to the catalog are not reported.
    async fn get_changed_source_ids(
        &self,
        upstream_hashes: &HashMap<i64, String>,
    ) -> Result<Vec<i64>, RepositoryError>;

    async fn get_tasks_by_status(
        &self,
        status: TaskStatus,
    ) -> Result<Vec<TaskRecord>, RepositoryError>;

    /// Remove a task and all child nodes, files, and visualization rows.
    /// Used before re-attempting a changed or failed seed.
    async fn delete_task_cascade(&self, task_id: i64) -> Result<(), RepositoryError>;

    // ---- nodes ----

    /// Upsert crawl output keyed by `(task_id, node_index)`. Overwrites
    /// title, breadcrumb, URL, parent title, and the file flags; never
    /// touches `is_pruned`. Rejects nodes whose parent index is not below
    /// their own (root excepted).
    async fn batch_insert_nodes(
        &self,
        task_id: i64,
        nodes: &[NewNode],
    ) -> Result<(), RepositoryError>;

    /// Two-phase prune marking: reset every node of the task to unpruned,
    /// then set the listed indices. Calling again with a different set
    /// leaves exactly that set marked.
    async fn mark_nodes_pruned(
        &self,
        task_id: i64,
        retained_indices: &[i64],
    ) -> Result<(), RepositoryError>;

    /// File-typed nodes of a task, optionally restricted to retained ones,
    /// ordered by node index.
    async fn get_file_nodes(
        &self,
        task_id: i64,
        pruned_only: bool,
    ) -> Result<Vec<NodeRecord>, RepositoryError>;

    /// All nodes of a task ordered by node index.
    async fn get_nodes(&self, task_id: i64) -> Result<Vec<NodeRecord>, RepositoryError>;

    /// One node by its row id (files reference nodes this way).
    async fn get_node(&self, node_id: i64) -> Result<Option<NodeRecord>, RepositoryError>;

    // ---- files ----

    /// Unconditional insert of a file record; duplicates are tolerated and
    /// downstream idempotency hinges on the returned `file_id`.
    async fn create_file_record(
        &self,
        task_id: i64,
        node_id: i64,
        original_url: &str,
        original_name: &str,
        file_extension: &str,
    ) -> Result<i64, RepositoryError>;

    async fn update_file_download(
        &self,
        file_id: i64,
        status: DownloadStatus,
        storage_key: Option<&str>,
        file_size: Option<i64>,
        error: Option<&str>,
    ) -> Result<(), RepositoryError>;

    /// Record a successful naming: the canonical name plus the LLM audit
    /// fields, and `process_status = completed`.
    async fn update_file_renamed(
        &self,
        file_id: i64,
        renamed_name: &str,
        llm_model: &str,
        llm_confidence: f64,
        llm_raw_response: &str,
    ) -> Result<(), RepositoryError>;

    async fn update_file_process_status(
        &self,
        file_id: i64,
        status: ProcessStatus,
    ) -> Result<(), RepositoryError>;

    async fn update_file_process_failed(
        &self,
        file_id: i64,
        error: &str,
    ) -> Result<(), RepositoryError>;

    /// Rewrite only the canonical name; used by the imputation pass.
    async fn update_renamed_name_only(
        &self,
        file_id: i64,
        renamed_name: &str,
    ) -> Result<(), RepositoryError>;

    async fn get_file(&self, file_id: i64) -> Result<Option<FileRecord>, RepositoryError>;

    /// Files still waiting for their bytes, optionally limited to one task.
    async fn get_pending_download_files(
        &self,
        task_id: Option<i64>,
    ) -> Result<Vec<FileRecord>, RepositoryError>;

    /// Files downloaded but not yet named, optionally limited to one task.
    async fn get_pending_process_files(
        &self,
        task_id: Option<i64>,
    ) -> Result<Vec<FileRecord>, RepositoryError>;

    /// Files of a task that carry an LLM naming result (for imputation).
    async fn get_files_with_naming(
        &self,
        task_id: i64,
    ) -> Result<Vec<FileRecord>, RepositoryError>;

    async fn get_files_for_task(&self, task_id: i64)
        -> Result<Vec<FileRecord>, RepositoryError>;

    /// Files by download status, newest last, optionally limited.
    async fn get_files_by_status(
        &self,
        status: DownloadStatus,
        limit: Option<i64>,
    ) -> Result<Vec<FileRecord>, RepositoryError>;

    // ---- visualizations & sync log ----

    /// Upsert the storage key of a topology visualization, unique per
    /// `(task_id, kind)`.
    async fn save_visualization(
        &self,
        task_id: i64,
        kind: VizKind,
        storage_key: &str,
    ) -> Result<(), RepositoryError>;

    /// Append one sync-log row.
    async fn log_sync(
        &self,
        sync_type: &str,
        source_count: i64,
        new_count: i64,
        changed_count: i64,
    ) -> Result<(), RepositoryError>;

    /// Most recent sync-log rows, newest first.
    async fn recent_sync_logs(&self, limit: i64) -> Result<Vec<SyncLogEntry>, RepositoryError>;
}
