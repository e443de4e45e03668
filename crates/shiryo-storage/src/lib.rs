//! Blob-store implementations and the document downloader.
//!
//! The filesystem store backs local runs and tests; the Supabase-style
//! HTTP store backs production. The downloader streams documents from
//! university sites into whichever store is wired in.

pub mod downloader;
pub mod fs_store;
pub mod supabase;

pub use downloader::{DownloadConfig, Downloader};
pub use fs_store::FsObjectStore;
pub use supabase::{SupabaseConfig, SupabaseStore};

// Silence unused dev-dependency warnings
#[cfg(test)]
use tokio_test as _;
