//! CLI surface: argument parsing, the composition root, and command
//! handlers.

pub mod bootstrap;
pub mod commands;
pub mod parser;

pub use bootstrap::{bootstrap, CliConfig};
pub use parser::{Cli, Commands};

// Silence unused dev-dependency warnings
#[cfg(test)]
use tokio_test as _;
