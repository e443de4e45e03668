//! Site crawling: bounded BFS discovery, LLM pruning, and topology
//! visualization.
//!
//! This adapter fetches plain HTML over HTTP. JavaScript-rendered pages
//! and anti-bot interstitials are out of scope; pages that need them
//! simply yield fewer nodes.

pub mod crawler;
pub mod page;
pub mod prune;
pub mod viz;

pub use crawler::{CrawlSettings, HttpCrawler};
pub use prune::LlmPruner;

// Silence unused dev-dependency warnings
#[cfg(test)]
use tokio_test as _;
