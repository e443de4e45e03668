//! Read-only adapter for the upstream link catalog.
//!
//! The upstream store lists universities and their admissions URLs in a
//! `links` table, with per-kind tables (`graduate`, `undergraduate`)
//! carrying the school names. The pipeline only ever reads it.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use shiryo_core::domain::{Seed, SeedKind};
use shiryo_core::ports::{RepositoryError, UpstreamPort};

use crate::retry::map_sqlx_error;

/// SQLite-backed view of the upstream catalog.
#[derive(Clone)]
pub struct SqliteUpstream {
    pool: SqlitePool,
}

impl SqliteUpstream {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open an existing upstream database file read-only.
    ///
    /// # Errors
    ///
    /// Fails when the file does not exist; the upstream store is never
    /// created by this side.
    pub async fn open(path: &std::path::Path) -> anyhow::Result<Self> {
        use sqlx::sqlite::SqliteConnectOptions;
        let options = SqliteConnectOptions::new()
            .filename(path)
            .read_only(true)
            .create_if_missing(false);
        let pool = SqlitePool::connect_with(options).await?;
        Ok(Self::new(pool))
    }
}

fn row_to_seed(row: &sqlx::sqlite::SqliteRow) -> Result<Option<Seed>, RepositoryError> {
    let table_name: String = row
        .try_get("table_name")
        .map_err(|e| RepositoryError::Serialization(e.to_string()))?;
    // Rows of kinds the pipeline does not process (e.g. vocational) are
    // skipped, not errors.
    let Some(kind) = SeedKind::parse(&table_name) else {
        return Ok(None);
    };
    let seed = Seed {
        source_id: row
            .try_get("id")
            .map_err(|e| RepositoryError::Serialization(e.to_string()))?,
        kind,
        row_id: row
            .try_get("row_id")
            .map_err(|e| RepositoryError::Serialization(e.to_string()))?,
        url: row
            .try_get("url")
            .map_err(|e| RepositoryError::Serialization(e.to_string()))?,
    };
    Ok(Some(seed))
}

#[async_trait]
impl UpstreamPort for SqliteUpstream {
    async fn fetch_seeds(
        &self,
        kind_filter: Option<SeedKind>,
    ) -> Result<Vec<Seed>, RepositoryError> {
        let rows = match kind_filter {
            Some(kind) => {
                sqlx::query("SELECT id, table_name, row_id, url FROM links WHERE table_name = ? ORDER BY id")
                    .bind(kind.as_str())
                    .fetch_all(&self.pool)
                    .await
            }
            None => {
                sqlx::query(
                    "SELECT id, table_name, row_id, url FROM links \
                     WHERE table_name IN ('graduate', 'undergraduate') ORDER BY id",
                )
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(map_sqlx_error)?;

        let mut seeds = Vec::with_capacity(rows.len());
        for row in &rows {
            if let Some(seed) = row_to_seed(row)? {
                seeds.push(seed);
            }
        }
        Ok(seeds)
    }

    async fn fetch_seeds_by_ids(&self, ids: &[i64]) -> Result<Vec<Seed>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "SELECT id, table_name, row_id, url FROM links WHERE id IN ({placeholders}) ORDER BY id"
        );
        let mut query = sqlx::query(&sql);
        for id in ids {
            query = query.bind(id);
        }
        let rows = query.fetch_all(&self.pool).await.map_err(map_sqlx_error)?;

        let mut seeds = Vec::with_capacity(rows.len());
        for row in &rows {
            if let Some(seed) = row_to_seed(row)? {
                seeds.push(seed);
            }
        }
        Ok(seeds)
    }

    async fn school_name(
        &self,
        kind: SeedKind,
        row_id: i64,
    ) -> Result<Option<String>, RepositoryError> {
        // Table name comes from the closed SeedKind enum, never from input.
        let sql = format!("SELECT school FROM {} WHERE id = ?", kind.as_str());
        let row: Option<(Option<String>,)> = sqlx::query_as(&sql)
            .bind(row_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(row.and_then(|(school,)| school))
    }

    async fn count_by_kind(&self, kind: SeedKind) -> Result<i64, RepositoryError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM links WHERE table_name = ?")
            .bind(kind.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(row.0)
    }
}

/// In-memory upstream store with the expected schema, for tests.
#[cfg(any(test, feature = "test-utils"))]
pub async fn setup_test_upstream() -> anyhow::Result<SqlitePool> {
    let pool = SqlitePool::connect("sqlite::memory:").await?;
    sqlx::query(
        r#"
        CREATE TABLE links (
            id INTEGER PRIMARY KEY,
            table_name TEXT NOT NULL,
            row_id INTEGER NOT NULL,
            url TEXT NOT NULL
        )
        "#,
    )
    .execute(&pool)
    .await?;
    for table in ["graduate", "undergraduate", "vocational"] {
        sqlx::query(&format!(
            "CREATE TABLE {table} (id INTEGER PRIMARY KEY, school TEXT)"
        ))
        .execute(&pool)
        .await?;
    }
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded_upstream() -> SqliteUpstream {
        let pool = setup_test_upstream().await.unwrap();
        sqlx::query(
            r#"
            INSERT INTO links (id, table_name, row_id, url) VALUES
                (1, 'graduate', 10, 'http://u.example/grad'),
                (2, 'undergraduate', 20, 'http://u.example/ug'),
                (3, 'vocational', 30, 'http://u.example/voc'),
                (4, 'graduate', 11, 'http://u.example/grad2')
            "#,
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query("INSERT INTO graduate (id, school) VALUES (10, '東京大学'), (11, NULL)")
            .execute(&pool)
            .await
            .unwrap();
        SqliteUpstream::new(pool)
    }

    #[tokio::test]
    async fn fetch_seeds_filters_vocational_and_orders_by_id() {
        let upstream = seeded_upstream().await;
        let seeds = upstream.fetch_seeds(None).await.unwrap();
        let ids: Vec<i64> = seeds.iter().map(|s| s.source_id).collect();
        assert_eq!(ids, vec![1, 2, 4]);
    }

    #[tokio::test]
    async fn fetch_seeds_honors_kind_filter() {
        let upstream = seeded_upstream().await;
        let seeds = upstream.fetch_seeds(Some(SeedKind::Graduate)).await.unwrap();
        assert_eq!(seeds.len(), 2);
        assert!(seeds.iter().all(|s| s.kind == SeedKind::Graduate));
    }

    #[tokio::test]
    async fn fetch_seeds_by_ids() {
        let upstream = seeded_upstream().await;
        let seeds = upstream.fetch_seeds_by_ids(&[2, 4, 99]).await.unwrap();
        let ids: Vec<i64> = seeds.iter().map(|s| s.source_id).collect();
        assert_eq!(ids, vec![2, 4]);
    }

    #[tokio::test]
    async fn school_name_lookup() {
        let upstream = seeded_upstream().await;
        assert_eq!(
            upstream.school_name(SeedKind::Graduate, 10).await.unwrap(),
            Some("東京大学".to_string())
        );
        assert_eq!(upstream.school_name(SeedKind::Graduate, 11).await.unwrap(), None);
        assert_eq!(upstream.school_name(SeedKind::Graduate, 99).await.unwrap(), None);
    }

    #[tokio::test]
    async fn counts_by_kind() {
        let upstream = seeded_upstream().await;
        assert_eq!(upstream.count_by_kind(SeedKind::Graduate).await.unwrap(), 2);
        assert_eq!(
            upstream.count_by_kind(SeedKind::Undergraduate).await.unwrap(),
            1
        );
    }
}
