//! SQLite adapters for the shiryo catalog and the upstream link catalog.
//!
//! The catalog holds all durable pipeline state (tasks, nodes, files,
//! visualizations, sync log); the upstream adapter is a read-only view of
//! the external link listing. Both are `sqlx`-backed and keep `sqlx` types
//! out of their public signatures.

#![deny(unsafe_code)]

pub mod catalog;
pub mod retry;
pub mod setup;
pub mod upstream;

pub use catalog::SqliteCatalog;
pub use setup::setup_database;
#[cfg(any(test, feature = "test-utils"))]
pub use setup::setup_test_database;
pub use upstream::SqliteUpstream;
#[cfg(any(test, feature = "test-utils"))]
pub use upstream::setup_test_upstream;
