//! Chat-completion client for the LLM-backed passes.
//!
//! Both the crawl pruning pass and the renamer talk to an OpenAI-compatible
//! chat endpoint. The backend is a trait so tests can inject canned
//! responses instead of a network.

pub mod client;
pub mod json;

pub use client::{ChatBackend, ChatClient, ChatConfig, ChatError};
pub use json::{extract_int_array, extract_json_object};

#[cfg(any(test, feature = "testing"))]
pub use client::testing::CannedBackend;
