//! Command-line argument definitions.

use clap::{Parser, Subcommand};

use shiryo_core::domain::SeedKind;

/// Collector for Japanese university admissions documents.
#[derive(Debug, Parser)]
#[command(name = "shiryo", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the full pipeline: sync, crawl, download, extract, rename.
    Run {
        /// Restrict to one seed kind.
        #[arg(long, value_parser = parse_kind)]
        kind: Option<SeedKind>,

        /// Stop after this many tasks.
        #[arg(long, short = 'm')]
        max_tasks: Option<usize>,

        /// Crawl depth (clamped to 10).
        #[arg(long, short = 'd')]
        depth: Option<u32>,

        /// Skip the download stage.
        #[arg(long)]
        no_download: bool,

        /// Skip extraction and renaming.
        #[arg(long)]
        no_rename: bool,

        /// Leave previously failed tasks alone.
        #[arg(long)]
        skip_failed: bool,

        /// Leave tasks with changed upstream URLs alone.
        #[arg(long)]
        skip_changed: bool,

        /// Crawl worker pool size.
        #[arg(long)]
        crawl_workers: Option<usize>,

        /// Download worker pool size.
        #[arg(long)]
        download_workers: Option<usize>,

        /// Extract worker pool size.
        #[arg(long)]
        extract_workers: Option<usize>,

        /// Rename worker pool size.
        #[arg(long, short = 'w')]
        rename_workers: Option<usize>,

        /// Seeds fetched per sync-detector poll.
        #[arg(long)]
        batch_size: Option<usize>,
    },

    /// Run sync detection only and print the report.
    Sync {
        /// Restrict to one seed kind.
        #[arg(long, value_parser = parse_kind)]
        kind: Option<SeedKind>,

        /// Leave previously failed tasks out of the report.
        #[arg(long)]
        skip_failed: bool,
    },

    /// Show task and file counts by status.
    Status,

    /// Delete all pipeline state from the catalog.
    Reset {
        /// Confirm the wipe; refused otherwise.
        #[arg(long)]
        yes: bool,
    },
}

fn parse_kind(raw: &str) -> Result<SeedKind, String> {
    SeedKind::parse(raw).ok_or_else(|| format!("unknown kind {raw:?} (graduate|undergraduate)"))
}
