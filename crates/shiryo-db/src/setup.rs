//! Database setup and initialization.
//!
//! `setup_database()` opens (and if needed creates) the SQLite catalog and
//! ensures the full schema exists. Safe to call repeatedly: everything is
//! `IF NOT EXISTS`.

use anyhow::Result;
use sqlx::{sqlite::SqliteConnectOptions, SqlitePool};
use std::path::Path;

/// Open the catalog database, creating the file and schema if missing.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or created, or if schema
/// creation fails.
pub async fn setup_database(db_path: &Path) -> Result<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let pool = SqlitePool::connect_with(
        SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .foreign_keys(true),
    )
    .await?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// Fresh in-memory catalog with the full production schema, for tests.
#[cfg(any(test, feature = "test-utils"))]
pub async fn setup_test_database() -> Result<SqlitePool> {
    let pool = SqlitePool::connect_with(
        "sqlite::memory:"
            .parse::<SqliteConnectOptions>()?
            .foreign_keys(true),
    )
    .await?;
    create_schema(&pool).await?;
    Ok(pool)
}

/// Create all tables and indexes.
async fn create_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS crawl_tasks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            source_link_id INTEGER NOT NULL UNIQUE,
            source_url TEXT NOT NULL,
            url_hash TEXT NOT NULL,
            school_name TEXT,
            status TEXT NOT NULL DEFAULT 'pending',
            node_count INTEGER NOT NULL DEFAULT 0,
            pruned_count INTEGER NOT NULL DEFAULT 0,
            file_count INTEGER NOT NULL DEFAULT 0,
            error_message TEXT,
            started_at TEXT,
            completed_at TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_tasks_status ON crawl_tasks(status)")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS crawl_nodes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            task_id INTEGER NOT NULL,
            node_index INTEGER NOT NULL,
            parent_index INTEGER NOT NULL,
            depth INTEGER NOT NULL,
            title TEXT NOT NULL DEFAULT '',
            breadcrumb TEXT NOT NULL DEFAULT '',
            url TEXT NOT NULL,
            parent_title TEXT NOT NULL DEFAULT '',
            is_pruned INTEGER NOT NULL DEFAULT 0,
            is_file INTEGER NOT NULL DEFAULT 0,
            file_extension TEXT,
            FOREIGN KEY (task_id) REFERENCES crawl_tasks(id) ON DELETE CASCADE,
            UNIQUE (task_id, node_index)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_nodes_task ON crawl_nodes(task_id)")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS crawl_files (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            task_id INTEGER NOT NULL,
            node_id INTEGER NOT NULL,
            original_url TEXT NOT NULL,
            original_name TEXT NOT NULL DEFAULT '',
            renamed_name TEXT,
            file_extension TEXT NOT NULL DEFAULT 'pdf',
            file_size INTEGER,
            storage_key TEXT,
            download_status TEXT NOT NULL DEFAULT 'pending',
            process_status TEXT NOT NULL DEFAULT 'pending',
            llm_model TEXT,
            llm_confidence REAL,
            llm_raw_response TEXT,
            error_message TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            FOREIGN KEY (task_id) REFERENCES crawl_tasks(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_files_task ON crawl_files(task_id)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_files_download ON crawl_files(download_status)",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_files_process ON crawl_files(process_status)")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS crawl_visualizations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            task_id INTEGER NOT NULL,
            viz_type TEXT NOT NULL CHECK (viz_type IN ('raw', 'pruned')),
            storage_key TEXT NOT NULL,
            FOREIGN KEY (task_id) REFERENCES crawl_tasks(id) ON DELETE CASCADE,
            UNIQUE (task_id, viz_type)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sync_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            sync_type TEXT NOT NULL,
            source_count INTEGER NOT NULL,
            new_count INTEGER NOT NULL,
            changed_count INTEGER NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_setup_test_database() {
        let pool = setup_test_database().await.unwrap();

        // Verify tables exist by querying them
        let _: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM crawl_tasks")
            .fetch_one(&pool)
            .await
            .unwrap();
        let _: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM crawl_nodes")
            .fetch_one(&pool)
            .await
            .unwrap();
        let _: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM crawl_files")
            .fetch_one(&pool)
            .await
            .unwrap();
        let _: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM sync_log")
            .fetch_one(&pool)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_setup_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.db");
        let pool = setup_database(&path).await.unwrap();
        drop(pool);
        // Opening again must not fail or lose the schema
        let pool = setup_database(&path).await.unwrap();
        let _: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM crawl_tasks")
            .fetch_one(&pool)
            .await
            .unwrap();
    }
}
