//! CLI entry point - the composition root.
//!
//! All infrastructure wiring happens in bootstrap; command dispatch routes
//! to handlers that only see ports.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use shiryo_cli::{commands, Cli, CliConfig, Commands};
use shiryo_core::config::PipelineConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging; RUST_LOG overrides the default level
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = CliConfig::from_env();

    let Some(command) = cli.command else {
        use clap::CommandFactory;
        Cli::command().print_help()?;
        return Ok(());
    };

    match command {
        Commands::Run {
            kind,
            max_tasks,
            depth,
            no_download,
            no_rename,
            skip_failed,
            skip_changed,
            crawl_workers,
            download_workers,
            extract_workers,
            rename_workers,
            batch_size,
        } => {
            let defaults = PipelineConfig::default();
            let pipeline = PipelineConfig {
                kind_filter: kind,
                max_tasks,
                crawl_depth: depth.unwrap_or(defaults.crawl_depth),
                enable_download: !no_download,
                enable_rename: !no_rename,
                include_failed: !skip_failed,
                include_changed: !skip_changed,
                crawl_workers: crawl_workers.unwrap_or(defaults.crawl_workers),
                download_workers: download_workers.unwrap_or(defaults.download_workers),
                extract_workers: extract_workers.unwrap_or(defaults.extract_workers),
                rename_workers: rename_workers.unwrap_or(defaults.rename_workers),
                batch_size: batch_size.unwrap_or(defaults.batch_size),
                ..defaults
            }
            .clamped();
            commands::run(&config, pipeline).await?;
        }
        Commands::Sync { kind, skip_failed } => {
            commands::sync(&config, kind, !skip_failed).await?;
        }
        Commands::Status => {
            commands::status(&config).await?;
        }
        Commands::Reset { yes } => {
            commands::reset(&config, yes).await?;
        }
    }

    Ok(())
}
