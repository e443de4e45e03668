//! The coordination core: incremental sync detection and the staged
//! concurrent pipeline runtime.
//!
//! Work flows crawl → download → extract → rename through bounded queues
//! joining four worker pools. All durable state lives in the catalog;
//! restarts resume from it without replaying queues.

pub mod error;
pub mod impute;
pub mod progress;
pub mod queue;
pub mod runtime;
pub mod sync;

pub use error::PipelineError;
pub use runtime::{PipelinePorts, PipelineRuntime};
pub use sync::{SyncDetector, SyncReport};

// Silence unused dev-dependency warnings
#[cfg(test)]
use tokio_test as _;
