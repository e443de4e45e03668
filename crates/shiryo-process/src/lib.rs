//! Document processing: text extraction and LLM renaming.
//!
//! Extraction handles PDF and the zip-based OOXML formats; the renamer
//! turns extracted text plus crawl context into the canonical eight-field
//! file name.

pub mod extract;
pub mod renamer;

pub use extract::DocumentExtractor;
pub use renamer::{LlmRenamer, RENAME_PROMPT_TEMPLATE};

// Silence unused dev-dependency warnings
#[cfg(test)]
use tokio_test as _;
