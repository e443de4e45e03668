//! Domain model: seeds, tasks, nodes, files, and the structured-name schema.

mod file;
mod naming;
mod node;
mod seed;
mod sync;
mod task;

pub use file::{DownloadStatus, FileRecord, ProcessStatus};
pub use naming::{sanitize_file_name, StructuredName, UNKNOWN_FIELD};
pub use node::{document_extension, is_document_url, NewNode, NodeRecord, DOCUMENT_EXTENSIONS};
pub use seed::{url_hash, Seed, SeedKind};
pub use sync::SyncLogEntry;
pub use task::{TaskPatch, TaskRecord, TaskStatus};
