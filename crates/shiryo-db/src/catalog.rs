//! SQLite implementation of the catalog port.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{Row, SqlitePool};

use shiryo_core::domain::{
    document_extension, DownloadStatus, FileRecord, NewNode, NodeRecord, ProcessStatus,
    SyncLogEntry, TaskPatch, TaskRecord, TaskStatus,
};
use shiryo_core::ports::{CatalogPort, RepositoryError, VizKind};
use shiryo_core::url_hash;

use crate::retry::{map_sqlx_error, with_retry};

/// SQLite-backed catalog.
///
/// Writes are wrapped in a bounded retry loop; the pool serializes
/// row-level access, so no application-level locking is needed.
#[derive(Clone)]
pub struct SqliteCatalog {
    pool: SqlitePool,
}

impl SqliteCatalog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Underlying pool, for test assertions.
    #[cfg(any(test, feature = "test-utils"))]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl CatalogPort for SqliteCatalog {
    async fn upsert_task(
        &self,
        source_id: i64,
        source_url: &str,
        school_name: Option<&str>,
    ) -> Result<i64, RepositoryError> {
        let hash = url_hash(source_url);
        with_retry("upsert_task", || async {
            let row: (i64,) = sqlx::query_as(
                r#"
                INSERT INTO crawl_tasks (source_link_id, source_url, url_hash, school_name, status)
                VALUES (?, ?, ?, ?, 'pending')
                ON CONFLICT (source_link_id) DO UPDATE SET
                    source_url = excluded.source_url,
                    url_hash = excluded.url_hash,
                    school_name = excluded.school_name,
                    status = 'pending',
                    error_message = NULL,
                    updated_at = datetime('now')
                RETURNING id
                "#,
            )
            .bind(source_id)
            .bind(source_url)
            .bind(&hash)
            .bind(school_name)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
            Ok(row.0)
        })
        .await
    }

    async fn update_task_status(
        &self,
        task_id: i64,
        status: TaskStatus,
        patch: TaskPatch,
    ) -> Result<(), RepositoryError> {
        with_retry("update_task_status", || async {
            let current: Option<(String,)> =
                sqlx::query_as("SELECT status FROM crawl_tasks WHERE id = ?")
                    .bind(task_id)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;
            let Some((current,)) = current else {
                return Err(RepositoryError::NotFound(format!("task {task_id}")));
            };
            let current = TaskStatus::parse(&current);
            if !current.can_transition_to(status) {
                return Err(RepositoryError::Constraint(format!(
                    "task {task_id}: illegal transition {current} -> {status}"
                )));
            }

            let mut sets = vec!["status = ?", "updated_at = datetime('now')"];
            match status {
                TaskStatus::Crawling => sets.push("started_at = datetime('now')"),
                TaskStatus::Completed | TaskStatus::Failed => {
                    sets.push("completed_at = datetime('now')");
                }
                _ => {}
            }
            if patch.node_count.is_some() {
                sets.push("node_count = ?");
            }
            if patch.pruned_count.is_some() {
                sets.push("pruned_count = ?");
            }
            if patch.file_count.is_some() {
                sets.push("file_count = ?");
            }
            if patch.error_message.is_some() {
                sets.push("error_message = ?");
            }
            let sql = format!("UPDATE crawl_tasks SET {} WHERE id = ?", sets.join(", "));

            let mut query = sqlx::query(&sql).bind(status.as_str());
            if let Some(n) = patch.node_count {
                query = query.bind(n);
            }
            if let Some(n) = patch.pruned_count {
                query = query.bind(n);
            }
            if let Some(n) = patch.file_count {
                query = query.bind(n);
            }
            if let Some(ref message) = patch.error_message {
                query = query.bind(message);
            }
            query
                .bind(task_id)
                .execute(&self.pool)
                .await
                .map_err(map_sqlx_error)?;
            Ok(())
        })
        .await
    }

    async fn get_task(&self, task_id: i64) -> Result<Option<TaskRecord>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM crawl_tasks WHERE id = ?")
            .bind(task_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        row.map(|r| row_to_task(&r)).transpose()
    }

    async fn get_task_by_source_id(
        &self,
        source_id: i64,
    ) -> Result<Option<TaskRecord>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM crawl_tasks WHERE source_link_id = ?")
            .bind(source_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        row.map(|r| row_to_task(&r)).transpose()
    }

    async fn get_all_task_source_ids(&self) -> Result<HashSet<i64>, RepositoryError> {
        let rows: Vec<(i64,)> = sqlx::query_as("SELECT source_link_id FROM crawl_tasks")
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn get_changed_source_ids(
        &self,
        upstream_hashes: &HashMap<i64, String>,
    ) -> Result<Vec<i64>, RepositoryError> {
        if upstream_hashes.is_empty() {
            return Ok(Vec::new());
        }
        let rows: Vec<(i64, String)> =
            sqlx::query_as("SELECT source_link_id, url_hash FROM crawl_tasks")
                .fetch_all(&self.pool)
                .await
                .map_err(map_sqlx_error)?;

        let mut changed: Vec<i64> = rows
            .into_iter()
            .filter(|(source_id, stored_hash)| {
                upstream_hashes
                    .get(source_id)
                    .is_some_and(|fresh| fresh != stored_hash)
            })
            .map(|(source_id, _)| source_id)
            .collect();
        changed.sort_unstable();
        Ok(changed)
    }

    async fn get_tasks_by_status(
        &self,
        status: TaskStatus,
    ) -> Result<Vec<TaskRecord>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM crawl_tasks WHERE status = ? ORDER BY id")
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        rows.iter().map(row_to_task).collect()
    }

    async fn delete_task_cascade(&self, task_id: i64) -> Result<(), RepositoryError> {
        with_retry("delete_task_cascade", || async {
            // Child rows go with the task via ON DELETE CASCADE
            sqlx::query("DELETE FROM crawl_tasks WHERE id = ?")
                .bind(task_id)
                .execute(&self.pool)
                .await
                .map_err(map_sqlx_error)?;
            Ok(())
        })
        .await
    }

    async fn batch_insert_nodes(
        &self,
        task_id: i64,
        nodes: &[NewNode],
    ) -> Result<(), RepositoryError> {
        if nodes.is_empty() {
            return Ok(());
        }
        for node in nodes {
            if !node.has_valid_parent() {
                return Err(RepositoryError::Constraint(format!(
                    "node {} of task {task_id} has parent {} >= its own index",
                    node.index, node.parent_index
                )));
            }
        }
        with_retry("batch_insert_nodes", || async {
            let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
            for node in nodes {
                let extension = document_extension(&node.url);
                sqlx::query(
                    r#"
                    INSERT INTO crawl_nodes
                        (task_id, node_index, parent_index, depth, title, breadcrumb,
                         url, parent_title, is_file, file_extension)
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                    ON CONFLICT (task_id, node_index) DO UPDATE SET
                        title = excluded.title,
                        breadcrumb = excluded.breadcrumb,
                        url = excluded.url,
                        parent_title = excluded.parent_title,
                        is_file = excluded.is_file,
                        file_extension = excluded.file_extension
                    "#,
                )
                .bind(task_id)
                .bind(node.index)
                .bind(node.parent_index)
                .bind(node.depth)
                .bind(&node.title)
                .bind(&node.breadcrumb)
                .bind(&node.url)
                .bind(&node.parent_title)
                .bind(extension.is_some())
                .bind(extension)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
            }
            tx.commit().await.map_err(map_sqlx_error)?;
            Ok(())
        })
        .await
    }

    async fn mark_nodes_pruned(
        &self,
        task_id: i64,
        retained_indices: &[i64],
    ) -> Result<(), RepositoryError> {
        with_retry("mark_nodes_pruned", || async {
            let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
            sqlx::query("UPDATE crawl_nodes SET is_pruned = 0 WHERE task_id = ?")
                .bind(task_id)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
            for index in retained_indices {
                sqlx::query(
                    "UPDATE crawl_nodes SET is_pruned = 1 WHERE task_id = ? AND node_index = ?",
                )
                .bind(task_id)
                .bind(index)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
            }
            tx.commit().await.map_err(map_sqlx_error)?;
            Ok(())
        })
        .await
    }

    async fn get_file_nodes(
        &self,
        task_id: i64,
        pruned_only: bool,
    ) -> Result<Vec<NodeRecord>, RepositoryError> {
        let sql = if pruned_only {
            "SELECT * FROM crawl_nodes WHERE task_id = ? AND is_file = 1 AND is_pruned = 1 \
             ORDER BY node_index"
        } else {
            "SELECT * FROM crawl_nodes WHERE task_id = ? AND is_file = 1 ORDER BY node_index"
        };
        let rows = sqlx::query(sql)
            .bind(task_id)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        rows.iter().map(row_to_node).collect()
    }

    async fn get_nodes(&self, task_id: i64) -> Result<Vec<NodeRecord>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM crawl_nodes WHERE task_id = ? ORDER BY node_index")
            .bind(task_id)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        rows.iter().map(row_to_node).collect()
    }

    async fn get_node(&self, node_id: i64) -> Result<Option<NodeRecord>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM crawl_nodes WHERE id = ?")
            .bind(node_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        row.map(|r| row_to_node(&r)).transpose()
    }

    async fn create_file_record(
        &self,
        task_id: i64,
        node_id: i64,
        original_url: &str,
        original_name: &str,
        file_extension: &str,
    ) -> Result<i64, RepositoryError> {
        with_retry("create_file_record", || async {
            let row: (i64,) = sqlx::query_as(
                r#"
                INSERT INTO crawl_files
                    (task_id, node_id, original_url, original_name, file_extension)
                VALUES (?, ?, ?, ?, ?)
                RETURNING id
                "#,
            )
            .bind(task_id)
            .bind(node_id)
            .bind(original_url)
            .bind(original_name)
            .bind(file_extension)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
            Ok(row.0)
        })
        .await
    }

    async fn update_file_download(
        &self,
        file_id: i64,
        status: DownloadStatus,
        storage_key: Option<&str>,
        file_size: Option<i64>,
        error: Option<&str>,
    ) -> Result<(), RepositoryError> {
        with_retry("update_file_download", || async {
            let mut sets = vec!["download_status = ?"];
            if storage_key.is_some() {
                sets.push("storage_key = ?");
            }
            if file_size.is_some() {
                sets.push("file_size = ?");
            }
            if error.is_some() {
                sets.push("error_message = ?");
            }
            let sql = format!("UPDATE crawl_files SET {} WHERE id = ?", sets.join(", "));

            let mut query = sqlx::query(&sql).bind(status.as_str());
            if let Some(key) = storage_key {
                query = query.bind(key);
            }
            if let Some(size) = file_size {
                query = query.bind(size);
            }
            if let Some(message) = error {
                query = query.bind(message);
            }
            query
                .bind(file_id)
                .execute(&self.pool)
                .await
                .map_err(map_sqlx_error)?;
            Ok(())
        })
        .await
    }

    async fn update_file_renamed(
        &self,
        file_id: i64,
        renamed_name: &str,
        llm_model: &str,
        llm_confidence: f64,
        llm_raw_response: &str,
    ) -> Result<(), RepositoryError> {
        with_retry("update_file_renamed", || async {
            sqlx::query(
                r#"
                UPDATE crawl_files SET
                    renamed_name = ?,
                    llm_model = ?,
                    llm_confidence = ?,
                    llm_raw_response = ?,
                    process_status = 'completed'
                WHERE id = ?
                "#,
            )
            .bind(renamed_name)
            .bind(llm_model)
            .bind(llm_confidence)
            .bind(llm_raw_response)
            .bind(file_id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
            Ok(())
        })
        .await
    }

    async fn update_file_process_status(
        &self,
        file_id: i64,
        status: ProcessStatus,
    ) -> Result<(), RepositoryError> {
        with_retry("update_file_process_status", || async {
            sqlx::query("UPDATE crawl_files SET process_status = ? WHERE id = ?")
                .bind(status.as_str())
                .bind(file_id)
                .execute(&self.pool)
                .await
                .map_err(map_sqlx_error)?;
            Ok(())
        })
        .await
    }

    async fn update_file_process_failed(
        &self,
        file_id: i64,
        error: &str,
    ) -> Result<(), RepositoryError> {
        with_retry("update_file_process_failed", || async {
            sqlx::query(
                "UPDATE crawl_files SET process_status = 'failed', error_message = ? WHERE id = ?",
            )
            .bind(error)
            .bind(file_id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
            Ok(())
        })
        .await
    }

    async fn update_renamed_name_only(
        &self,
        file_id: i64,
        renamed_name: &str,
    ) -> Result<(), RepositoryError> {
        with_retry("update_renamed_name_only", || async {
            sqlx::query("UPDATE crawl_files SET renamed_name = ? WHERE id = ?")
                .bind(renamed_name)
                .bind(file_id)
                .execute(&self.pool)
                .await
                .map_err(map_sqlx_error)?;
            Ok(())
        })
        .await
    }

    async fn get_file(&self, file_id: i64) -> Result<Option<FileRecord>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM crawl_files WHERE id = ?")
            .bind(file_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        row.map(|r| row_to_file(&r)).transpose()
    }

    async fn get_pending_download_files(
        &self,
        task_id: Option<i64>,
    ) -> Result<Vec<FileRecord>, RepositoryError> {
        let rows = match task_id {
            Some(task_id) => {
                sqlx::query(
                    "SELECT * FROM crawl_files WHERE download_status = 'pending' \
                     AND task_id = ? ORDER BY id",
                )
                .bind(task_id)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query("SELECT * FROM crawl_files WHERE download_status = 'pending' ORDER BY id")
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .map_err(map_sqlx_error)?;
        rows.iter().map(row_to_file).collect()
    }

    async fn get_pending_process_files(
        &self,
        task_id: Option<i64>,
    ) -> Result<Vec<FileRecord>, RepositoryError> {
        let base = "SELECT * FROM crawl_files \
                    WHERE download_status IN ('downloaded', 'completed') \
                    AND process_status = 'pending'";
        let rows = match task_id {
            Some(task_id) => {
                sqlx::query(&format!("{base} AND task_id = ? ORDER BY id"))
                    .bind(task_id)
                    .fetch_all(&self.pool)
                    .await
            }
            None => {
                sqlx::query(&format!("{base} ORDER BY id"))
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .map_err(map_sqlx_error)?;
        rows.iter().map(row_to_file).collect()
    }

    async fn get_files_with_naming(
        &self,
        task_id: i64,
    ) -> Result<Vec<FileRecord>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM crawl_files WHERE task_id = ? AND llm_raw_response IS NOT NULL \
             ORDER BY id",
        )
        .bind(task_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        rows.iter().map(row_to_file).collect()
    }

    async fn get_files_for_task(
        &self,
        task_id: i64,
    ) -> Result<Vec<FileRecord>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM crawl_files WHERE task_id = ? ORDER BY id")
            .bind(task_id)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        rows.iter().map(row_to_file).collect()
    }

    async fn get_files_by_status(
        &self,
        status: DownloadStatus,
        limit: Option<i64>,
    ) -> Result<Vec<FileRecord>, RepositoryError> {
        let rows = match limit {
            Some(limit) => {
                sqlx::query(
                    "SELECT * FROM crawl_files WHERE download_status = ? ORDER BY id LIMIT ?",
                )
                .bind(status.as_str())
                .bind(limit)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query("SELECT * FROM crawl_files WHERE download_status = ? ORDER BY id")
                    .bind(status.as_str())
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .map_err(map_sqlx_error)?;
        rows.iter().map(row_to_file).collect()
    }

    async fn save_visualization(
        &self,
        task_id: i64,
        kind: VizKind,
        storage_key: &str,
    ) -> Result<(), RepositoryError> {
        with_retry("save_visualization", || async {
            sqlx::query(
                r#"
                INSERT INTO crawl_visualizations (task_id, viz_type, storage_key)
                VALUES (?, ?, ?)
                ON CONFLICT (task_id, viz_type) DO UPDATE SET
                    storage_key = excluded.storage_key
                "#,
            )
            .bind(task_id)
            .bind(kind.as_str())
            .bind(storage_key)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
            Ok(())
        })
        .await
    }

    async fn log_sync(
        &self,
        sync_type: &str,
        source_count: i64,
        new_count: i64,
        changed_count: i64,
    ) -> Result<(), RepositoryError> {
        with_retry("log_sync", || async {
            sqlx::query(
                "INSERT INTO sync_log (sync_type, source_count, new_count, changed_count) \
                 VALUES (?, ?, ?, ?)",
            )
            .bind(sync_type)
            .bind(source_count)
            .bind(new_count)
            .bind(changed_count)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
            Ok(())
        })
        .await
    }

    async fn recent_sync_logs(&self, limit: i64) -> Result<Vec<SyncLogEntry>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM sync_log ORDER BY id DESC LIMIT ?")
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        rows.iter()
            .map(|row| {
                Ok(SyncLogEntry {
                    id: try_get(row, "id")?,
                    sync_type: try_get(row, "sync_type")?,
                    source_count: try_get(row, "source_count")?,
                    new_count: try_get(row, "new_count")?,
                    changed_count: try_get(row, "changed_count")?,
                    created_at: parse_timestamp(&try_get::<String>(row, "created_at")?)?,
                })
            })
            .collect()
    }
}

// ---- row mappers ----

fn try_get<'r, T>(row: &'r sqlx::sqlite::SqliteRow, column: &str) -> Result<T, RepositoryError>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(column)
        .map_err(|e| RepositoryError::Serialization(format!("column {column}: {e}")))
}

/// Parse the `datetime('now')` text format, tolerating RFC 3339.
fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Ok(parsed.and_utc());
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Serialization(format!("timestamp {raw:?}: {e}")))
}

fn parse_optional_timestamp(
    raw: Option<String>,
) -> Result<Option<DateTime<Utc>>, RepositoryError> {
    raw.as_deref().map(parse_timestamp).transpose()
}

fn row_to_task(row: &sqlx::sqlite::SqliteRow) -> Result<TaskRecord, RepositoryError> {
    Ok(TaskRecord {
        id: try_get(row, "id")?,
        source_id: try_get(row, "source_link_id")?,
        source_url: try_get(row, "source_url")?,
        url_hash: try_get(row, "url_hash")?,
        school_name: try_get(row, "school_name")?,
        status: TaskStatus::parse(&try_get::<String>(row, "status")?),
        node_count: try_get(row, "node_count")?,
        pruned_count: try_get(row, "pruned_count")?,
        file_count: try_get(row, "file_count")?,
        error_message: try_get(row, "error_message")?,
        started_at: parse_optional_timestamp(try_get(row, "started_at")?)?,
        completed_at: parse_optional_timestamp(try_get(row, "completed_at")?)?,
        created_at: parse_timestamp(&try_get::<String>(row, "created_at")?)?,
        updated_at: parse_timestamp(&try_get::<String>(row, "updated_at")?)?,
    })
}

fn row_to_node(row: &sqlx::sqlite::SqliteRow) -> Result<NodeRecord, RepositoryError> {
    Ok(NodeRecord {
        id: try_get(row, "id")?,
        task_id: try_get(row, "task_id")?,
        node_index: try_get(row, "node_index")?,
        parent_index: try_get(row, "parent_index")?,
        depth: try_get(row, "depth")?,
        title: try_get(row, "title")?,
        breadcrumb: try_get(row, "breadcrumb")?,
        url: try_get(row, "url")?,
        parent_title: try_get(row, "parent_title")?,
        is_pruned: try_get(row, "is_pruned")?,
        is_file: try_get(row, "is_file")?,
        file_extension: try_get(row, "file_extension")?,
    })
}

fn row_to_file(row: &sqlx::sqlite::SqliteRow) -> Result<FileRecord, RepositoryError> {
    Ok(FileRecord {
        id: try_get(row, "id")?,
        task_id: try_get(row, "task_id")?,
        node_id: try_get(row, "node_id")?,
        original_url: try_get(row, "original_url")?,
        original_name: try_get(row, "original_name")?,
        renamed_name: try_get(row, "renamed_name")?,
        file_extension: try_get(row, "file_extension")?,
        file_size: try_get(row, "file_size")?,
        storage_key: try_get(row, "storage_key")?,
        download_status: DownloadStatus::parse(&try_get::<String>(row, "download_status")?),
        process_status: ProcessStatus::parse(&try_get::<String>(row, "process_status")?),
        llm_model: try_get(row, "llm_model")?,
        llm_confidence: try_get(row, "llm_confidence")?,
        llm_raw_response: try_get(row, "llm_raw_response")?,
        error_message: try_get(row, "error_message")?,
        created_at: parse_timestamp(&try_get::<String>(row, "created_at")?)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup::setup_test_database;

    async fn test_catalog() -> SqliteCatalog {
        SqliteCatalog::new(setup_test_database().await.unwrap())
    }

    fn node(index: i64, parent: i64, depth: i64, url: &str, title: &str) -> NewNode {
        NewNode {
            index,
            parent_index: parent,
            depth,
            title: title.to_string(),
            breadcrumb: String::new(),
            url: url.to_string(),
            parent_title: String::new(),
        }
    }

    #[tokio::test]
    async fn upsert_task_inserts_and_resets() {
        let catalog = test_catalog().await;

        let task_id = catalog
            .upsert_task(1, "http://u.example/admissions", Some("東京大学"))
            .await
            .unwrap();
        catalog
            .update_task_status(task_id, TaskStatus::Crawling, TaskPatch::default())
            .await
            .unwrap();
        catalog
            .update_task_status(task_id, TaskStatus::Failed, TaskPatch::error("boom"))
            .await
            .unwrap();

        // Re-attempt: same source id, new URL, back to pending with fresh hash
        let again = catalog
            .upsert_task(1, "http://u.example/nyushi", Some("東京大学"))
            .await
            .unwrap();
        assert_eq!(task_id, again);

        let task = catalog.get_task(task_id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.source_url, "http://u.example/nyushi");
        assert_eq!(task.url_hash, url_hash("http://u.example/nyushi"));
        assert!(task.error_message.is_none());
    }

    #[tokio::test]
    async fn upsert_task_is_idempotent() {
        let catalog = test_catalog().await;
        let first = catalog
            .upsert_task(5, "http://u.example/a", None)
            .await
            .unwrap();
        let second = catalog
            .upsert_task(5, "http://u.example/a", None)
            .await
            .unwrap();
        assert_eq!(first, second);

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM crawl_tasks")
            .fetch_one(catalog.pool())
            .await
            .unwrap();
        assert_eq!(count.0, 1);
    }

    #[tokio::test]
    async fn status_transitions_stamp_timestamps() {
        let catalog = test_catalog().await;
        let task_id = catalog
            .upsert_task(1, "http://u.example/a", None)
            .await
            .unwrap();

        catalog
            .update_task_status(task_id, TaskStatus::Crawling, TaskPatch::default())
            .await
            .unwrap();
        let task = catalog.get_task(task_id).await.unwrap().unwrap();
        assert!(task.started_at.is_some());
        assert!(task.completed_at.is_none());

        catalog
            .update_task_status(task_id, TaskStatus::Downloaded, TaskPatch::default())
            .await
            .unwrap();
        catalog
            .update_task_status(task_id, TaskStatus::Processing, TaskPatch::default())
            .await
            .unwrap();
        catalog
            .update_task_status(task_id, TaskStatus::Completed, TaskPatch::default())
            .await
            .unwrap();
        let task = catalog.get_task(task_id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert!(task.completed_at.is_some());
    }

    #[tokio::test]
    async fn illegal_transitions_are_rejected() {
        let catalog = test_catalog().await;
        let task_id = catalog
            .upsert_task(1, "http://u.example/a", None)
            .await
            .unwrap();

        let result = catalog
            .update_task_status(task_id, TaskStatus::Processing, TaskPatch::default())
            .await;
        assert!(matches!(result, Err(RepositoryError::Constraint(_))));
    }

    #[tokio::test]
    async fn batch_insert_nodes_is_idempotent() {
        let catalog = test_catalog().await;
        let task_id = catalog
            .upsert_task(1, "http://u.example/a", None)
            .await
            .unwrap();

        let nodes = vec![
            node(0, -1, 0, "http://u.example/a", "入試情報"),
            node(1, 0, 1, "http://u.example/a/yoko.pdf", "募集要項"),
            node(2, 0, 1, "http://u.example/a/faq", "FAQ"),
        ];
        catalog.batch_insert_nodes(task_id, &nodes).await.unwrap();
        catalog.batch_insert_nodes(task_id, &nodes).await.unwrap();

        let stored = catalog.get_nodes(task_id).await.unwrap();
        assert_eq!(stored.len(), 3);
        assert!(stored[1].is_file);
        assert_eq!(stored[1].file_extension.as_deref(), Some("pdf"));
        assert!(!stored[2].is_file);
    }

    #[tokio::test]
    async fn batch_insert_rejects_malformed_parents() {
        let catalog = test_catalog().await;
        let task_id = catalog
            .upsert_task(1, "http://u.example/a", None)
            .await
            .unwrap();

        let bad = vec![node(1, 4, 1, "http://u.example/x", "x")];
        let result = catalog.batch_insert_nodes(task_id, &bad).await;
        assert!(matches!(result, Err(RepositoryError::Constraint(_))));
    }

    #[tokio::test]
    async fn mark_nodes_pruned_is_two_phase() {
        let catalog = test_catalog().await;
        let task_id = catalog
            .upsert_task(1, "http://u.example/a", None)
            .await
            .unwrap();
        let nodes = vec![
            node(0, -1, 0, "http://u.example/a", "root"),
            node(1, 0, 1, "http://u.example/a/b", "b"),
            node(2, 0, 1, "http://u.example/a/c", "c"),
        ];
        catalog.batch_insert_nodes(task_id, &nodes).await.unwrap();

        catalog.mark_nodes_pruned(task_id, &[0, 1]).await.unwrap();
        let pruned: Vec<i64> = catalog
            .get_nodes(task_id)
            .await
            .unwrap()
            .into_iter()
            .filter(|n| n.is_pruned)
            .map(|n| n.node_index)
            .collect();
        assert_eq!(pruned, vec![0, 1]);

        // Re-marking with a different set leaves exactly that set
        catalog.mark_nodes_pruned(task_id, &[2]).await.unwrap();
        let pruned: Vec<i64> = catalog
            .get_nodes(task_id)
            .await
            .unwrap()
            .into_iter()
            .filter(|n| n.is_pruned)
            .map(|n| n.node_index)
            .collect();
        assert_eq!(pruned, vec![2]);
    }

    #[tokio::test]
    async fn file_lifecycle_and_pending_queries() {
        let catalog = test_catalog().await;
        let task_id = catalog
            .upsert_task(1, "http://u.example/a", None)
            .await
            .unwrap();
        let nodes = vec![
            node(0, -1, 0, "http://u.example/a", "root"),
            node(1, 0, 1, "http://u.example/a/yoko.pdf", "募集要項"),
        ];
        catalog.batch_insert_nodes(task_id, &nodes).await.unwrap();
        catalog.mark_nodes_pruned(task_id, &[0, 1]).await.unwrap();

        let file_nodes = catalog.get_file_nodes(task_id, true).await.unwrap();
        assert_eq!(file_nodes.len(), 1);

        let file_id = catalog
            .create_file_record(
                task_id,
                file_nodes[0].id,
                &file_nodes[0].url,
                "募集要項",
                "pdf",
            )
            .await
            .unwrap();

        let pending = catalog.get_pending_download_files(None).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, file_id);

        catalog
            .update_file_download(
                file_id,
                DownloadStatus::Downloaded,
                Some("docs/task_1/raw/yoko.pdf"),
                Some(2048),
                None,
            )
            .await
            .unwrap();

        assert!(catalog
            .get_pending_download_files(None)
            .await
            .unwrap()
            .is_empty());
        let to_process = catalog.get_pending_process_files(Some(task_id)).await.unwrap();
        assert_eq!(to_process.len(), 1);

        catalog
            .update_file_renamed(
                file_id,
                "東京大学_理学系研究科_Unknown_修士_2025_4月_募集要項_Unknown.pdf",
                "test-model",
                0.9,
                r#"{"university":"東京大学"}"#,
            )
            .await
            .unwrap();

        let file = catalog.get_file(file_id).await.unwrap().unwrap();
        assert_eq!(file.process_status, ProcessStatus::Completed);
        assert_eq!(file.llm_confidence, Some(0.9));
        assert!(catalog
            .get_pending_process_files(Some(task_id))
            .await
            .unwrap()
            .is_empty());
        assert_eq!(catalog.get_files_with_naming(task_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn process_failure_is_recorded() {
        let catalog = test_catalog().await;
        let task_id = catalog
            .upsert_task(1, "http://u.example/a", None)
            .await
            .unwrap();
        let file_id = catalog
            .create_file_record(task_id, 1, "http://u.example/x.pdf", "x", "pdf")
            .await
            .unwrap();

        catalog
            .update_file_process_failed(file_id, "no extractable text")
            .await
            .unwrap();
        let file = catalog.get_file(file_id).await.unwrap().unwrap();
        assert_eq!(file.process_status, ProcessStatus::Failed);
        assert_eq!(file.error_message.as_deref(), Some("no extractable text"));
    }

    #[tokio::test]
    async fn changed_source_ids_compare_hashes() {
        let catalog = test_catalog().await;
        catalog
            .upsert_task(1, "http://u.example/a", None)
            .await
            .unwrap();
        catalog
            .upsert_task(2, "http://u.example/b", None)
            .await
            .unwrap();

        let mut upstream = HashMap::new();
        upstream.insert(1, url_hash("http://u.example/a"));
        upstream.insert(2, url_hash("http://u.example/b-moved"));
        upstream.insert(3, url_hash("http://u.example/new"));

        let changed = catalog.get_changed_source_ids(&upstream).await.unwrap();
        assert_eq!(changed, vec![2]);
    }

    #[tokio::test]
    async fn cascade_delete_removes_children() {
        let catalog = test_catalog().await;
        let task_id = catalog
            .upsert_task(1, "http://u.example/a", None)
            .await
            .unwrap();
        catalog
            .batch_insert_nodes(task_id, &[node(0, -1, 0, "http://u.example/a", "root")])
            .await
            .unwrap();
        catalog
            .create_file_record(task_id, 1, "http://u.example/x.pdf", "x", "pdf")
            .await
            .unwrap();
        catalog
            .save_visualization(task_id, VizKind::Raw, "docs/task_1/visualization_raw.html")
            .await
            .unwrap();

        catalog.delete_task_cascade(task_id).await.unwrap();

        assert!(catalog.get_task(task_id).await.unwrap().is_none());
        assert!(catalog.get_nodes(task_id).await.unwrap().is_empty());
        assert!(catalog.get_files_for_task(task_id).await.unwrap().is_empty());
        let viz_count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM crawl_visualizations WHERE task_id = ?")
                .bind(task_id)
                .fetch_one(catalog.pool())
                .await
                .unwrap();
        assert_eq!(viz_count.0, 0);
    }

    #[tokio::test]
    async fn visualization_upsert_is_unique_per_kind() {
        let catalog = test_catalog().await;
        let task_id = catalog
            .upsert_task(1, "http://u.example/a", None)
            .await
            .unwrap();

        catalog
            .save_visualization(task_id, VizKind::Raw, "docs/a.html")
            .await
            .unwrap();
        catalog
            .save_visualization(task_id, VizKind::Raw, "docs/b.html")
            .await
            .unwrap();
        catalog
            .save_visualization(task_id, VizKind::Pruned, "docs/c.html")
            .await
            .unwrap();

        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT viz_type, storage_key FROM crawl_visualizations WHERE task_id = ? \
             ORDER BY viz_type",
        )
        .bind(task_id)
        .fetch_all(catalog.pool())
        .await
        .unwrap();
        assert_eq!(
            rows,
            vec![
                ("pruned".to_string(), "docs/c.html".to_string()),
                ("raw".to_string(), "docs/b.html".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn sync_log_appends() {
        let catalog = test_catalog().await;
        catalog.log_sync("incremental", 100, 5, 2).await.unwrap();
        catalog.log_sync("incremental", 100, 0, 0).await.unwrap();

        let logs = catalog.recent_sync_logs(10).await.unwrap();
        assert_eq!(logs.len(), 2);
        // Newest first
        assert_eq!(logs[0].new_count, 0);
        assert_eq!(logs[1].new_count, 5);
        assert_eq!(logs[1].source_count, 100);
    }
}
