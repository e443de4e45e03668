//! The composition root: environment configuration and port wiring.
//!
//! This is the only place infrastructure is assembled. Handlers receive
//! ports, never pools or clients.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use shiryo_core::config::PipelineConfig;
use shiryo_core::ports::{BlobStorePort, CatalogPort, UpstreamPort};
use shiryo_crawl::{CrawlSettings, HttpCrawler, LlmPruner};
use shiryo_db::{setup_database, SqliteCatalog, SqliteUpstream};
use shiryo_llm::{ChatBackend, ChatClient, ChatConfig};
use shiryo_pipeline::PipelinePorts;
use shiryo_process::{DocumentExtractor, LlmRenamer};
use shiryo_storage::{DownloadConfig, Downloader, FsObjectStore, SupabaseConfig, SupabaseStore};

/// Where the blob store lives.
#[derive(Clone, Debug)]
pub enum StorageTarget {
    /// Local directory, used for development and tests.
    Filesystem(PathBuf),
    /// Supabase-style HTTP storage.
    Supabase { url: String, key: String, bucket: String },
}

/// Everything read from the environment.
#[derive(Clone, Debug)]
pub struct CliConfig {
    /// Catalog database path (`SHIRYO_DB`).
    pub catalog_db: PathBuf,
    /// Upstream link-catalog path (`SOURCE_DB`).
    pub source_db: PathBuf,
    pub storage: StorageTarget,
    /// Chat API key (`LLM_API_KEY`); pruning and renaming need it.
    pub llm_api_key: Option<String>,
    pub llm_base_url: Option<String>,
    pub llm_model: Option<String>,
}

impl CliConfig {
    /// Read configuration from the environment with development defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let storage = match (std::env::var("SUPABASE_URL"), std::env::var("SUPABASE_KEY")) {
            (Ok(url), Ok(key)) => StorageTarget::Supabase {
                url,
                key,
                bucket: std::env::var("SUPABASE_BUCKET")
                    .unwrap_or_else(|_| FsObjectStore::DEFAULT_BUCKET.to_string()),
            },
            _ => StorageTarget::Filesystem(
                std::env::var("SHIRYO_STORAGE_DIR")
                    .map_or_else(|_| PathBuf::from("./data/objects"), PathBuf::from),
            ),
        };

        Self {
            catalog_db: std::env::var("SHIRYO_DB")
                .map_or_else(|_| PathBuf::from("./data/shiryo.db"), PathBuf::from),
            source_db: std::env::var("SOURCE_DB")
                .map_or_else(|_| PathBuf::from("./data/source.db"), PathBuf::from),
            storage,
            llm_api_key: std::env::var("LLM_API_KEY").ok(),
            llm_base_url: std::env::var("LLM_BASE_URL").ok(),
            llm_model: std::env::var("LLM_MODEL").ok(),
        }
    }

    fn chat_config(&self) -> anyhow::Result<ChatConfig> {
        let api_key = self
            .llm_api_key
            .clone()
            .context("LLM_API_KEY is not set; pruning and renaming need a chat API key")?;
        let mut config = ChatConfig::new(api_key);
        if let Some(ref base_url) = self.llm_base_url {
            config.base_url.clone_from(base_url);
        }
        if let Some(ref model) = self.llm_model {
            config.model.clone_from(model);
        }
        Ok(config)
    }
}

/// Open the catalog store on its own (for `status`, `sync`, `reset`).
pub async fn open_catalog(config: &CliConfig) -> anyhow::Result<Arc<dyn CatalogPort>> {
    let pool = setup_database(&config.catalog_db).await?;
    Ok(Arc::new(SqliteCatalog::new(pool)))
}

/// Open the upstream store on its own.
pub async fn open_upstream(config: &CliConfig) -> anyhow::Result<Arc<dyn UpstreamPort>> {
    let upstream = SqliteUpstream::open(&config.source_db)
        .await
        .with_context(|| format!("opening upstream catalog {}", config.source_db.display()))?;
    Ok(Arc::new(upstream))
}

/// Wire every port for a pipeline run.
pub async fn bootstrap(
    config: &CliConfig,
    pipeline: &PipelineConfig,
) -> anyhow::Result<PipelinePorts> {
    let catalog = open_catalog(config).await?;
    let upstream = open_upstream(config).await?;

    let blob: Arc<dyn BlobStorePort> = match &config.storage {
        StorageTarget::Filesystem(root) => Arc::new(FsObjectStore::new(root.clone())),
        StorageTarget::Supabase { url, key, bucket } => Arc::new(
            SupabaseStore::new(SupabaseConfig::new(url.clone(), key.clone(), bucket.clone()))
                .map_err(|e| anyhow::anyhow!("storage client: {e}"))?,
        ),
    };

    let chat: Arc<dyn ChatBackend> = Arc::new(
        ChatClient::new(config.chat_config()?)
            .map_err(|e| anyhow::anyhow!("chat client: {e}"))?,
    );

    let crawler = HttpCrawler::new(LlmPruner::new(chat.clone()), CrawlSettings::default())
        .map_err(|e| anyhow::anyhow!("crawler: {e}"))?;

    let downloader = Downloader::new(
        blob.clone(),
        DownloadConfig {
            max_file_size: pipeline.max_file_size_bytes,
            connect_timeout: Duration::from_secs(10),
            total_timeout: Duration::from_secs(pipeline.download_timeout_s),
            max_retries: 3,
        },
    )
    .map_err(|e| anyhow::anyhow!("downloader: {e}"))?;

    Ok(PipelinePorts {
        catalog,
        blob,
        upstream,
        crawler: Arc::new(crawler),
        downloader: Arc::new(downloader),
        extractor: Arc::new(DocumentExtractor::new(
            pipeline.max_pages,
            pipeline.max_text_bytes,
        )),
        renamer: Arc::new(LlmRenamer::new(chat)),
    })
}
