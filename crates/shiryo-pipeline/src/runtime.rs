//! The staged concurrent pipeline runtime.
//!
//! Four worker pools (crawl, download, extract, rename) joined by bounded
//! queues; a feeder that polls sync detection for seeds; crash recovery
//! from catalog state at startup; an imputation pass when the last file of
//! a task lands. Per-item failures are written to the catalog and never
//! unwind past a worker loop.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use shiryo_core::config::PipelineConfig;
use shiryo_core::domain::{DownloadStatus, ProcessStatus, TaskPatch, TaskStatus};
use shiryo_core::ports::{
    visualization_key, BlobStorePort, CatalogPort, CrawlError, CrawlerPort, DownloaderPort,
    ExtractorPort, RenameContext, RenamerPort, UpstreamPort, VizKind,
};

use crate::error::PipelineError;
use crate::impute::impute_unknown_fields;
use crate::progress::TaskProgress;
use crate::queue::{stage_queue, CrawlJob, DownloadJob, ExtractJob, RenameJob, SharedReceiver};
use crate::sync::{SyncDetector, SyncOptions};

/// How often the feeder re-polls sync detection while work is in flight.
const FEED_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// How often the drain loop re-checks for outstanding tasks.
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Every port the runtime drives.
pub struct PipelinePorts {
    pub catalog: Arc<dyn CatalogPort>,
    pub blob: Arc<dyn BlobStorePort>,
    pub upstream: Arc<dyn UpstreamPort>,
    pub crawler: Arc<dyn CrawlerPort>,
    pub downloader: Arc<dyn DownloaderPort>,
    pub extractor: Arc<dyn ExtractorPort>,
    pub renamer: Arc<dyn RenamerPort>,
}

/// Totals reported by a finished run.
#[derive(Clone, Copy, Debug, Default)]
pub struct RunSummary {
    /// Tasks handed to the crawl stage this run (resumed tasks included).
    pub tasks_dispatched: usize,
}

/// Shared state every worker sees.
struct Shared {
    ports: PipelinePorts,
    config: PipelineConfig,
    progress: TaskProgress,
    /// Tasks enqueued but not yet terminal.
    active: AtomicUsize,
    cancel: CancellationToken,
    download_tx: mpsc::Sender<DownloadJob>,
    extract_tx: mpsc::Sender<ExtractJob>,
    rename_tx: mpsc::Sender<RenameJob>,
}

impl Shared {
    /// Mark a task failed, releasing its slot. Best effort: a catalog
    /// failure here is logged, not propagated.
    async fn fail_task(&self, task_id: i64, message: &str) {
        if let Err(e) = self
            .ports
            .catalog
            .update_task_status(task_id, TaskStatus::Failed, TaskPatch::error(message))
            .await
        {
            tracing::error!(task_id, error = %e, "could not record task failure");
        }
        self.progress.forget(task_id);
        self.active.fetch_sub(1, Ordering::SeqCst);
    }

    /// Flip a task to `processing` once its downloads are all terminal.
    async fn mark_processing(&self, task_id: i64) {
        let current = match self.ports.catalog.get_task(task_id).await {
            Ok(Some(task)) => task.status,
            Ok(None) => return,
            Err(e) => {
                tracing::error!(task_id, error = %e, "could not read task status");
                return;
            }
        };
        if current != TaskStatus::Downloaded {
            return;
        }
        if let Err(e) = self
            .ports
            .catalog
            .update_task_status(task_id, TaskStatus::Processing, TaskPatch::default())
            .await
        {
            tracing::error!(task_id, error = %e, "could not enter processing");
        }
    }

    /// End-of-task pass: impute `Unknown` fields from siblings, then
    /// complete the task and release its slot.
    async fn finalize_task(&self, task_id: i64) {
        match self.ports.catalog.get_files_with_naming(task_id).await {
            Ok(files) => {
                for rewrite in impute_unknown_fields(&files) {
                    tracing::info!(
                        task_id,
                        file_id = rewrite.file_id,
                        name = %rewrite.new_name,
                        "imputed unknown fields"
                    );
                    if let Err(e) = self
                        .ports
                        .catalog
                        .update_renamed_name_only(rewrite.file_id, &rewrite.new_name)
                        .await
                    {
                        tracing::error!(file_id = rewrite.file_id, error = %e, "imputation write failed");
                    }
                }
            }
            Err(e) => tracing::error!(task_id, error = %e, "imputation read failed"),
        }

        match self.ports.catalog.get_task(task_id).await {
            Ok(Some(task)) if !task.status.is_terminal() => {
                if let Err(e) = self
                    .ports
                    .catalog
                    .update_task_status(task_id, TaskStatus::Completed, TaskPatch::default())
                    .await
                {
                    tracing::error!(task_id, error = %e, "could not complete task");
                }
            }
            Ok(_) => {}
            Err(e) => tracing::error!(task_id, error = %e, "could not read task for completion"),
        }

        self.progress.forget(task_id);
        self.active.fetch_sub(1, Ordering::SeqCst);
        tracing::info!(task_id, "task finished");
    }

    /// Record a terminal process status for one file and finalize the
    /// task when it was the last one.
    async fn file_process_terminal(&self, task_id: i64) {
        if self.progress.process_terminal(task_id) {
            self.finalize_task(task_id).await;
        }
    }

    /// Send into a stage queue, backing off under cancellation.
    async fn send_or_cancel<T: Send>(&self, tx: &mpsc::Sender<T>, job: T) -> bool {
        tokio::select! {
            () = self.cancel.cancelled() => false,
            result = tx.send(job) => result.is_ok(),
        }
    }
}

/// Spawns worker pools, owns the queues, enforces ordering, backpressure,
/// resumption, cancellation, and the imputation pass.
pub struct PipelineRuntime {
    ports: PipelinePorts,
    config: PipelineConfig,
    cancel: CancellationToken,
}

impl PipelineRuntime {
    pub fn new(ports: PipelinePorts, config: PipelineConfig) -> Self {
        Self {
            ports,
            config: config.clamped(),
            cancel: CancellationToken::new(),
        }
    }

    /// Token to wire into signal handling; cancelling it drains the
    /// pipeline.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Drive the pipeline until the backlog drains or cancellation.
    pub async fn run(self) -> Result<RunSummary, PipelineError> {
        let config = self.config.clone();
        let (crawl_tx, crawl_rx) =
            stage_queue::<CrawlJob>(PipelineConfig::queue_capacity(config.crawl_workers));
        let (download_tx, download_rx) =
            stage_queue::<DownloadJob>(PipelineConfig::queue_capacity(config.download_workers));
        let (extract_tx, extract_rx) =
            stage_queue::<ExtractJob>(PipelineConfig::queue_capacity(config.extract_workers));
        let (rename_tx, rename_rx) =
            stage_queue::<RenameJob>(PipelineConfig::queue_capacity(config.rename_workers));

        let shared = Arc::new(Shared {
            ports: self.ports,
            config: config.clone(),
            progress: TaskProgress::new(),
            active: AtomicUsize::new(0),
            cancel: self.cancel.clone(),
            download_tx,
            extract_tx,
            rename_tx,
        });

        let mut handles: Vec<JoinHandle<()>> = Vec::new();
        for worker in 0..config.crawl_workers {
            handles.push(spawn_crawl_worker(worker, shared.clone(), crawl_rx.clone()));
        }
        for worker in 0..config.download_workers {
            handles.push(spawn_download_worker(worker, shared.clone(), download_rx.clone()));
        }
        for worker in 0..config.extract_workers {
            handles.push(spawn_extract_worker(worker, shared.clone(), extract_rx.clone()));
        }
        for worker in 0..config.rename_workers {
            handles.push(spawn_rename_worker(worker, shared.clone(), rename_rx.clone()));
        }

        let resumed = resume_from_catalog(&shared).await?;
        let dispatched = feed(&shared, &crawl_tx).await?;

        // Wait for in-flight tasks, then release the workers
        while shared.active.load(Ordering::SeqCst) > 0 && !self.cancel.is_cancelled() {
            tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
        }
        self.cancel.cancel();
        drop(crawl_tx);
        for handle in handles {
            let _ = handle.await;
        }

        tracing::info!(dispatched, resumed, "pipeline drained");
        Ok(RunSummary {
            tasks_dispatched: dispatched + resumed,
        })
    }
}

// ---- startup recovery ----

/// Rebuild in-flight state from the catalog after a restart.
///
/// Interrupted crawls cannot resume mid-flight and are swept to `failed`
/// (a later detection run with `include_failed` picks them up). Tasks that
/// finished crawling resume at the file level: files without bytes re-enter
/// the download queue, downloaded-but-unnamed files re-enter extraction.
async fn resume_from_catalog(shared: &Arc<Shared>) -> Result<usize, PipelineError> {
    let catalog = &shared.ports.catalog;

    for task in catalog.get_tasks_by_status(TaskStatus::Crawling).await? {
        tracing::warn!(task_id = task.id, "sweeping interrupted crawl to failed");
        catalog
            .update_task_status(task.id, TaskStatus::Failed, TaskPatch::error("interrupted"))
            .await?;
    }

    let mut resumed = 0usize;
    for status in [TaskStatus::Downloaded, TaskStatus::Processing] {
        for task in catalog.get_tasks_by_status(status).await? {
            let files = catalog.get_files_for_task(task.id).await?;
            if files.is_empty() {
                // Crawl ended with zero files but completion never landed
                catalog
                    .update_task_status(task.id, TaskStatus::Completed, TaskPatch::default())
                    .await?;
                continue;
            }

            let download_terminal = files
                .iter()
                .filter(|f| f.download_status.is_terminal())
                .count();
            let process_terminal = if shared.config.enable_rename {
                let mut terminal = 0usize;
                for file in &files {
                    if file.process_status.is_terminal() {
                        terminal += 1;
                    } else if file.download_status == DownloadStatus::Failed {
                        // The crash landed between the two status writes;
                        // settle the naming axis now
                        catalog
                            .update_file_process_failed(file.id, "file was not downloaded")
                            .await?;
                        terminal += 1;
                    }
                }
                terminal
            } else {
                // Rename gate off: downloaded files count as done
                download_terminal
            };

            shared
                .progress
                .register(task.id, files.len(), download_terminal, process_terminal);
            shared.active.fetch_add(1, Ordering::SeqCst);
            resumed += 1;

            if process_terminal >= files.len() {
                shared.finalize_task(task.id).await;
                continue;
            }

            for file in files {
                if !file.download_status.is_terminal() {
                    tracing::info!(task_id = task.id, file_id = file.id, "re-queueing download");
                    shared
                        .send_or_cancel(
                            &shared.download_tx,
                            DownloadJob { task_id: task.id, file_id: file.id },
                        )
                        .await;
                } else if file.download_status.has_bytes()
                    && !file.process_status.is_terminal()
                    && shared.config.enable_rename
                {
                    tracing::info!(task_id = task.id, file_id = file.id, "re-queueing extraction");
                    shared
                        .send_or_cancel(
                            &shared.extract_tx,
                            ExtractJob { task_id: task.id, file_id: file.id },
                        )
                        .await;
                }
            }
        }
    }
    Ok(resumed)
}

// ---- feeder ----

/// Poll sync detection and keep the crawl queue fed until the backlog is
/// empty and nothing is in flight.
async fn feed(shared: &Arc<Shared>, crawl_tx: &mpsc::Sender<CrawlJob>) -> Result<usize, PipelineError> {
    let detector = SyncDetector::new(
        shared.ports.upstream.clone(),
        shared.ports.catalog.clone(),
    );
    let config = &shared.config;
    let mut first_cycle = true;
    let mut dispatched = 0usize;

    loop {
        if shared.cancel.is_cancelled() {
            return Ok(dispatched);
        }
        if let Some(max) = config.max_tasks {
            if dispatched >= max {
                return Ok(dispatched);
            }
        }

        // Changed and failed seeds are picked up once per run; later
        // cycles only refill with genuinely new rows, so a seed that
        // keeps failing cannot loop within one run.
        let options = SyncOptions {
            include_failed: config.include_failed && first_cycle,
            include_changed: config.include_changed && first_cycle,
            kind_filter: config.kind_filter,
            batch_size: config.batch_size,
        };
        first_cycle = false;

        let report = detector.detect(&options).await?;
        let mut sent = 0usize;
        for seed in report.pending {
            if let Some(max) = config.max_tasks {
                if dispatched >= max {
                    break;
                }
            }
            let task_id = detector.prepare_task(&seed).await?;
            shared.active.fetch_add(1, Ordering::SeqCst);
            dispatched += 1;
            sent += 1;
            if !shared
                .send_or_cancel(crawl_tx, CrawlJob { task_id, seed_url: seed.url.clone() })
                .await
            {
                return Ok(dispatched);
            }
        }

        if sent == 0 {
            if shared.active.load(Ordering::SeqCst) == 0 {
                return Ok(dispatched);
            }
            tokio::select! {
                () = shared.cancel.cancelled() => return Ok(dispatched),
                () = tokio::time::sleep(FEED_POLL_INTERVAL) => {}
            }
        }
    }
}

// ---- crawl stage ----

fn spawn_crawl_worker(
    worker: usize,
    shared: Arc<Shared>,
    rx: SharedReceiver<CrawlJob>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::debug!(worker, "crawl worker started");
        loop {
            let job = tokio::select! {
                () = shared.cancel.cancelled() => break,
                job = rx.recv() => match job {
                    Some(job) => job,
                    None => break,
                },
            };
            handle_crawl(&shared, job).await;
        }
        tracing::debug!(worker, "crawl worker stopped");
    })
}

async fn handle_crawl(shared: &Arc<Shared>, job: CrawlJob) {
    let catalog = &shared.ports.catalog;
    let task_id = job.task_id;

    if let Err(e) = catalog
        .update_task_status(task_id, TaskStatus::Crawling, TaskPatch::default())
        .await
    {
        tracing::error!(task_id, error = %e, "could not enter crawling");
        shared.fail_task(task_id, "could not enter crawling").await;
        return;
    }

    let tag = format!("task_{task_id}");
    let outcome = match shared
        .ports
        .crawler
        .crawl(&job.seed_url, shared.config.crawl_depth, &tag)
        .await
    {
        Ok(outcome) => outcome,
        Err(CrawlError::Cancelled) => {
            // Leave the task in `crawling`; the next startup sweeps it
            shared.active.fetch_sub(1, Ordering::SeqCst);
            return;
        }
        Err(e) => {
            tracing::warn!(task_id, error = %e, "crawl failed");
            shared.fail_task(task_id, &e.to_string()).await;
            return;
        }
    };

    let stored = store_crawl_outcome(shared, task_id, &outcome).await;
    let file_ids = match stored {
        Ok(file_ids) => file_ids,
        Err(e) => {
            tracing::error!(task_id, error = %e, "could not persist crawl");
            shared.fail_task(task_id, &format!("persisting crawl failed: {e}")).await;
            return;
        }
    };

    if file_ids.is_empty() {
        // Nothing to download: the task is done right after the crawl
        if let Err(e) = catalog
            .update_task_status(task_id, TaskStatus::Completed, TaskPatch::default())
            .await
        {
            tracing::error!(task_id, error = %e, "could not complete file-less task");
        }
        shared.active.fetch_sub(1, Ordering::SeqCst);
        tracing::info!(task_id, "task finished with no files");
        return;
    }

    shared.progress.register(task_id, file_ids.len(), 0, 0);
    for file_id in file_ids {
        if !shared
            .send_or_cancel(&shared.download_tx, DownloadJob { task_id, file_id })
            .await
        {
            return;
        }
    }
}

/// Persist a crawl: nodes, prune marks, visualizations, file records, and
/// the `downloaded` transition with its counters. Returns the created
/// file ids.
async fn store_crawl_outcome(
    shared: &Arc<Shared>,
    task_id: i64,
    outcome: &shiryo_core::ports::CrawlOutcome,
) -> Result<Vec<i64>, PipelineError> {
    let catalog = &shared.ports.catalog;

    catalog.batch_insert_nodes(task_id, &outcome.nodes).await?;
    catalog.mark_nodes_pruned(task_id, &outcome.retained).await?;

    // Visualizations are best-effort; a blob hiccup must not fail the task
    for (kind, html) in [
        (VizKind::Raw, &outcome.raw_html),
        (VizKind::Pruned, &outcome.pruned_html),
    ] {
        let key = visualization_key(task_id, kind);
        match shared
            .ports
            .blob
            .put(&key, html.as_bytes(), "text/html")
            .await
        {
            Ok(storage_key) => {
                if let Err(e) = catalog.save_visualization(task_id, kind, &storage_key).await {
                    tracing::warn!(task_id, error = %e, "visualization row not saved");
                }
            }
            Err(e) => tracing::warn!(task_id, error = %e, "visualization upload failed"),
        }
    }

    let mut file_ids = Vec::new();
    if shared.config.enable_download {
        let file_nodes = catalog.get_file_nodes(task_id, true).await?;
        for node in &file_nodes {
            let extension = node.file_extension.as_deref().unwrap_or("pdf");
            let file_id = catalog
                .create_file_record(task_id, node.id, &node.url, &node.title, extension)
                .await?;
            file_ids.push(file_id);
        }
    }

    catalog
        .update_task_status(
            task_id,
            TaskStatus::Downloaded,
            TaskPatch {
                node_count: Some(outcome.nodes.len() as i64),
                pruned_count: Some(outcome.retained.len() as i64),
                file_count: Some(file_ids.len() as i64),
                error_message: None,
            },
        )
        .await?;

    Ok(file_ids)
}

// ---- download stage ----

fn spawn_download_worker(
    worker: usize,
    shared: Arc<Shared>,
    rx: SharedReceiver<DownloadJob>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::debug!(worker, "download worker started");
        loop {
            let job = tokio::select! {
                () = shared.cancel.cancelled() => break,
                job = rx.recv() => match job {
                    Some(job) => job,
                    None => break,
                },
            };
            handle_download(&shared, job).await;
        }
        tracing::debug!(worker, "download worker stopped");
    })
}

async fn handle_download(shared: &Arc<Shared>, job: DownloadJob) {
    let catalog = &shared.ports.catalog;
    let DownloadJob { task_id, file_id } = job;

    // Re-read fresh state; the job carries identity only
    let file = match catalog.get_file(file_id).await {
        Ok(Some(file)) => file,
        Ok(None) => {
            tracing::warn!(file_id, "file row vanished before download");
            return;
        }
        Err(e) => {
            tracing::error!(file_id, error = %e, "could not read file row");
            return;
        }
    };

    let downloaded = if file.download_status.has_bytes() {
        // Bytes already present (restart mid-pipeline); short-circuit
        true
    } else {
        let _ = catalog
            .update_file_download(file_id, DownloadStatus::Downloading, None, None, None)
            .await;
        let prefix = format!("task_{task_id}/raw");
        match shared
            .ports
            .downloader
            .download(&file.original_url, &prefix, None)
            .await
        {
            Ok(outcome) => {
                if let Err(e) = catalog
                    .update_file_download(
                        file_id,
                        DownloadStatus::Downloaded,
                        Some(&outcome.storage_key),
                        Some(outcome.size as i64),
                        None,
                    )
                    .await
                {
                    tracing::error!(file_id, error = %e, "could not record download");
                }
                true
            }
            Err(e) => {
                tracing::warn!(file_id, url = %file.original_url, error = %e, "download failed");
                let _ = catalog
                    .update_file_download(
                        file_id,
                        DownloadStatus::Failed,
                        None,
                        None,
                        Some(&e.to_string()),
                    )
                    .await;
                let _ = catalog
                    .update_file_process_failed(file_id, "file was not downloaded")
                    .await;
                false
            }
        }
    };

    if shared.progress.download_terminal(task_id) {
        shared.mark_processing(task_id).await;
    }

    if downloaded && shared.config.enable_rename {
        shared
            .send_or_cancel(&shared.extract_tx, ExtractJob { task_id, file_id })
            .await;
    } else {
        // Failed download, or the rename gate is off: this file's
        // processing is over
        shared.file_process_terminal(task_id).await;
    }
}

// ---- extract stage ----

fn spawn_extract_worker(
    worker: usize,
    shared: Arc<Shared>,
    rx: SharedReceiver<ExtractJob>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::debug!(worker, "extract worker started");
        loop {
            let job = tokio::select! {
                () = shared.cancel.cancelled() => break,
                job = rx.recv() => match job {
                    Some(job) => job,
                    None => break,
                },
            };
            handle_extract(&shared, job).await;
        }
        tracing::debug!(worker, "extract worker stopped");
    })
}

async fn handle_extract(shared: &Arc<Shared>, job: ExtractJob) {
    let catalog = &shared.ports.catalog;
    let ExtractJob { task_id, file_id } = job;

    let file = match catalog.get_file(file_id).await {
        Ok(Some(file)) => file,
        _ => {
            tracing::warn!(file_id, "file row unavailable for extraction");
            shared.file_process_terminal(task_id).await;
            return;
        }
    };
    let _ = catalog
        .update_file_process_status(file_id, ProcessStatus::Processing)
        .await;

    let Some(storage_key) = file.storage_key.as_deref() else {
        let _ = catalog
            .update_file_process_failed(file_id, "no stored object to extract")
            .await;
        shared.file_process_terminal(task_id).await;
        return;
    };

    let bytes = match shared.ports.blob.get(storage_key).await {
        Ok(bytes) => bytes,
        Err(e) => {
            let _ = catalog
                .update_file_process_failed(file_id, &format!("blob read failed: {e}"))
                .await;
            shared.file_process_terminal(task_id).await;
            return;
        }
    };

    let budget = Duration::from_secs(shared.config.extract_timeout_s);
    let extraction = tokio::time::timeout(
        budget,
        shared.ports.extractor.extract(&bytes, &file.file_extension),
    )
    .await;

    match extraction {
        Ok(Ok(extraction)) => {
            tracing::debug!(file_id, chars = extraction.text.len(), "extracted text");
            shared
                .send_or_cancel(
                    &shared.rename_tx,
                    RenameJob { task_id, file_id, text: extraction.text },
                )
                .await;
        }
        Ok(Err(e)) => {
            tracing::warn!(file_id, error = %e, "extraction failed");
            let _ = catalog
                .update_file_process_failed(file_id, &e.to_string())
                .await;
            shared.file_process_terminal(task_id).await;
        }
        Err(_) => {
            let message = format!("extraction timed out after {}s", budget.as_secs());
            let _ = catalog.update_file_process_failed(file_id, &message).await;
            shared.file_process_terminal(task_id).await;
        }
    }
}

// ---- rename stage ----

fn spawn_rename_worker(
    worker: usize,
    shared: Arc<Shared>,
    rx: SharedReceiver<RenameJob>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::debug!(worker, "rename worker started");
        loop {
            let job = tokio::select! {
                () = shared.cancel.cancelled() => break,
                job = rx.recv() => match job {
                    Some(job) => job,
                    None => break,
                },
            };
            handle_rename(&shared, job).await;
        }
        tracing::debug!(worker, "rename worker stopped");
    })
}

async fn handle_rename(shared: &Arc<Shared>, job: RenameJob) {
    let catalog = &shared.ports.catalog;
    let RenameJob { task_id, file_id, text } = job;

    let file = match catalog.get_file(file_id).await {
        Ok(Some(file)) => file,
        _ => {
            tracing::warn!(file_id, "file row unavailable for rename");
            shared.file_process_terminal(task_id).await;
            return;
        }
    };

    // Context: node for breadcrumbs, task for the authoritative school
    let node = catalog.get_node(file.node_id).await.ok().flatten();
    let school_name = catalog
        .get_task(task_id)
        .await
        .ok()
        .flatten()
        .and_then(|task| task.school_name);

    let context = RenameContext {
        url: file.original_url.clone(),
        title: node
            .as_ref()
            .map(|n| n.title.clone())
            .unwrap_or_else(|| file.original_name.clone()),
        breadcrumb: node.as_ref().map(|n| n.breadcrumb.clone()).unwrap_or_default(),
        parent_title: node
            .as_ref()
            .map(|n| n.parent_title.clone())
            .unwrap_or_default(),
        original_name: file.original_name.clone(),
        school_name,
    };

    let budget = Duration::from_secs(shared.config.rename_timeout_s);
    let renamed = tokio::time::timeout(
        budget,
        shared
            .ports
            .renamer
            .rename(&text, &context, &file.file_extension),
    )
    .await;

    match renamed {
        Ok(Ok(record)) => {
            tracing::info!(file_id, name = %record.name, "file renamed");
            if let Err(e) = catalog
                .update_file_renamed(
                    file_id,
                    &record.name,
                    &record.model,
                    record.confidence,
                    &record.raw,
                )
                .await
            {
                tracing::error!(file_id, error = %e, "could not record rename");
            }
            // Both axes are now done; close out the download side too
            let _ = catalog
                .update_file_download(file_id, DownloadStatus::Completed, None, None, None)
                .await;
        }
        Ok(Err(e)) => {
            tracing::warn!(file_id, error = %e, "rename failed");
            let _ = catalog
                .update_file_process_failed(file_id, &e.to_string())
                .await;
        }
        Err(_) => {
            let message = format!("rename timed out after {}s", budget.as_secs());
            let _ = catalog.update_file_process_failed(file_id, &message).await;
        }
    }

    shared.file_process_terminal(task_id).await;
}
