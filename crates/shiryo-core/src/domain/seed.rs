//! Upstream seeds: rows of the external link catalog.

use serde::{Deserialize, Serialize};

/// Which upstream table a seed was listed under.
///
/// The upstream catalog also carries a `vocational` table; the pipeline
/// filters to undergraduate and graduate rows before seeds are built.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedKind {
    Undergraduate,
    Graduate,
}

impl SeedKind {
    /// Convert to the upstream table name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Undergraduate => "undergraduate",
            Self::Graduate => "graduate",
        }
    }

    /// Parse from an upstream table name. Unknown kinds (e.g. `vocational`)
    /// return `None` and the row is skipped.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "undergraduate" => Some(Self::Undergraduate),
            "graduate" => Some(Self::Graduate),
            _ => None,
        }
    }
}

impl std::fmt::Display for SeedKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the upstream link catalog. Read-only: the pipeline never
/// writes back to the upstream store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Seed {
    /// Upstream row id; the stable identity a Task is keyed on.
    pub source_id: i64,
    /// Which per-kind table holds the school row.
    pub kind: SeedKind,
    /// Row id inside the per-kind table (used to resolve the school name).
    pub row_id: i64,
    /// The admissions page URL this seed points at.
    pub url: String,
}

/// MD5 of a seed URL, stored on the task row for change detection.
#[must_use]
pub fn url_hash(url: &str) -> String {
    format!("{:x}", md5::compute(url.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_parse_round_trips() {
        assert_eq!(SeedKind::parse("graduate"), Some(SeedKind::Graduate));
        assert_eq!(
            SeedKind::parse("undergraduate"),
            Some(SeedKind::Undergraduate)
        );
        assert_eq!(SeedKind::parse(SeedKind::Graduate.as_str()), Some(SeedKind::Graduate));
    }

    #[test]
    fn vocational_rows_are_skipped() {
        assert_eq!(SeedKind::parse("vocational"), None);
        assert_eq!(SeedKind::parse(""), None);
    }

    #[test]
    fn url_hash_is_md5_hex() {
        // Known md5 of the empty string
        assert_eq!(url_hash(""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(url_hash("http://u.example/admissions").len(), 32);
        assert_eq!(
            url_hash("http://u.example/admissions"),
            url_hash("http://u.example/admissions")
        );
        assert_ne!(
            url_hash("http://u.example/admissions"),
            url_hash("http://u.example/nyushi")
        );
    }
}
