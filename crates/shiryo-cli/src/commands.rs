//! Command handlers.

use shiryo_core::config::PipelineConfig;
use shiryo_core::domain::{DownloadStatus, TaskStatus};
use shiryo_pipeline::sync::SyncOptions;
use shiryo_pipeline::{PipelineRuntime, SyncDetector};

use crate::bootstrap::{bootstrap, open_catalog, open_upstream, CliConfig};

/// `shiryo run` — drive the pipeline until the backlog drains.
pub async fn run(config: &CliConfig, pipeline: PipelineConfig) -> anyhow::Result<()> {
    let ports = bootstrap(config, &pipeline).await?;
    let runtime = PipelineRuntime::new(ports, pipeline);

    // Ctrl-C drains the pipeline instead of killing it mid-write
    let cancel = runtime.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, draining");
            cancel.cancel();
        }
    });

    let summary = runtime.run().await?;
    println!("Run finished: {} task(s) processed.", summary.tasks_dispatched);
    Ok(())
}

/// `shiryo sync` — detection only; nothing is crawled.
pub async fn sync(
    config: &CliConfig,
    kind: Option<shiryo_core::domain::SeedKind>,
    include_failed: bool,
) -> anyhow::Result<()> {
    let catalog = open_catalog(config).await?;
    let upstream = open_upstream(config).await?;
    let detector = SyncDetector::new(upstream, catalog);

    let report = detector
        .detect(&SyncOptions {
            include_failed,
            include_changed: true,
            kind_filter: kind,
            batch_size: usize::MAX,
        })
        .await?;

    println!("Upstream rows:   {}", report.total_source);
    println!("New seeds:       {}", report.new_count);
    println!("Changed seeds:   {}", report.changed_count);
    println!("Failed retries:  {}", report.failed_count);
    println!("Pending total:   {}", report.pending.len());
    for seed in report.pending.iter().take(10) {
        println!("  [{}] {} {}", seed.source_id, seed.kind, seed.url);
    }
    if report.pending.len() > 10 {
        println!("  ... and {} more", report.pending.len() - 10);
    }
    Ok(())
}

/// `shiryo status` — task and file counts by status.
pub async fn status(config: &CliConfig) -> anyhow::Result<()> {
    let catalog = open_catalog(config).await?;

    println!("Tasks:");
    let mut total = 0usize;
    for status in [
        TaskStatus::Pending,
        TaskStatus::Crawling,
        TaskStatus::Downloaded,
        TaskStatus::Processing,
        TaskStatus::Completed,
        TaskStatus::Failed,
    ] {
        let count = catalog.get_tasks_by_status(status).await?.len();
        total += count;
        println!("  {:<12} {count}", status.as_str());
    }
    println!("  {:<12} {total}", "total");

    println!("Files:");
    for status in [
        DownloadStatus::Pending,
        DownloadStatus::Downloading,
        DownloadStatus::Downloaded,
        DownloadStatus::Completed,
        DownloadStatus::Failed,
    ] {
        let count = catalog.get_files_by_status(status, None).await?.len();
        println!("  {:<12} {count}", status.as_str());
    }
    let unnamed = catalog.get_pending_process_files(None).await?.len();
    println!("  awaiting rename: {unnamed}");
    Ok(())
}

/// `shiryo reset --yes` — wipe every task (children cascade).
pub async fn reset(config: &CliConfig, yes: bool) -> anyhow::Result<()> {
    if !yes {
        anyhow::bail!("refusing to wipe the catalog without --yes");
    }
    let catalog = open_catalog(config).await?;

    let mut removed = 0usize;
    for source_id in catalog.get_all_task_source_ids().await? {
        if let Some(task) = catalog.get_task_by_source_id(source_id).await? {
            catalog.delete_task_cascade(task.id).await?;
            removed += 1;
        }
    }
    println!("Removed {removed} task(s) and their nodes, files, and visualizations.");
    println!("Blob objects are left in place.");
    Ok(())
}
