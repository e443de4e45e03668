//! The upstream port: read-only access to the external link catalog.

use async_trait::async_trait;

use crate::domain::{Seed, SeedKind};

use super::RepositoryError;

/// Read-only view of the upstream catalog listing universities and their
/// admissions URLs. The pipeline never writes through this port.
#[async_trait]
pub trait UpstreamPort: Send + Sync {
    /// All undergraduate/graduate seeds, ordered by `source_id` so that
    /// URL deduplication deterministically keeps the lowest id.
    async fn fetch_seeds(
        &self,
        kind_filter: Option<SeedKind>,
    ) -> Result<Vec<Seed>, RepositoryError>;

    /// Seeds for specific upstream row ids (used to resolve failed tasks
    /// back to their seed rows).
    async fn fetch_seeds_by_ids(&self, ids: &[i64]) -> Result<Vec<Seed>, RepositoryError>;

    /// The authoritative school name from the per-kind table, if any.
    async fn school_name(
        &self,
        kind: SeedKind,
        row_id: i64,
    ) -> Result<Option<String>, RepositoryError>;

    /// Row counts per kind, for progress reporting.
    async fn count_by_kind(&self, kind: SeedKind) -> Result<i64, RepositoryError>;
}
