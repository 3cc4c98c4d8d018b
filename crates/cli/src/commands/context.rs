//! Wiring shared by every command: configs, backend, embedder, progress.

use prodrec_core::{config::AppConfig, AppError, AppResult};
use prodrec_engine::config::{load_config, RecommenderConfig};
use prodrec_engine::dataset::load_products;
use prodrec_engine::embeddings::{create_provider, EmbeddingProvider};
use prodrec_engine::memory_index::MemoryIndexService;
use prodrec_engine::pinecone_index::PineconeService;
use prodrec_engine::progress::{ProgressEvent, ProgressReporter};
use prodrec_engine::vector_index::{IndexHandle, VectorIndexService};
use prodrec_engine::ProductRecord;
use std::path::Path;
use std::sync::Arc;

pub struct CommandContext {
    pub recommender: RecommenderConfig,
    pub service: Arc<dyn VectorIndexService>,
    pub embedder: Arc<dyn EmbeddingProvider>,
    workspace: std::path::PathBuf,
}

impl CommandContext {
    pub fn new(config: &AppConfig) -> AppResult<Self> {
        let recommender = load_config(&config.workspace)?;
        recommender.validate()?;

        let service = open_service(config)?;
        let embedder = create_provider(&recommender.embedding)?;

        tracing::debug!(
            index = %recommender.index.name,
            backend = %config.backend,
            embedder = embedder.provider_name(),
            "Command context ready"
        );

        Ok(Self {
            recommender,
            service,
            embedder,
            workspace: config.workspace.clone(),
        })
    }

    /// Load the catalog from `override_path` or the configured dataset.
    pub fn load_records(&self, override_path: Option<&Path>) -> AppResult<Vec<ProductRecord>> {
        let path = match override_path {
            Some(path) => path.to_path_buf(),
            None => self.recommender.dataset.resolve(&self.workspace),
        };
        load_products(&path)
    }

    /// Open the configured index without resetting it.
    pub async fn open_index(&self) -> AppResult<Arc<dyn IndexHandle>> {
        self.service.index(&self.recommender.index.name).await
    }
}

fn open_service(config: &AppConfig) -> AppResult<Arc<dyn VectorIndexService>> {
    match config.backend.as_str() {
        "memory" => {
            tracing::debug!("Using in-process memory index; contents last for this command only");
            Ok(Arc::new(MemoryIndexService::new()))
        }
        "pinecone" => {
            let api_key = config.resolve_api_key().ok_or_else(|| {
                AppError::Config(format!(
                    "API key not found: set PRODREC_API_KEY or {}",
                    config.api_key_env()
                ))
            })?;
            Ok(Arc::new(PineconeService::new(api_key, config.control_url())?))
        }
        other => Err(AppError::Config(format!("Unknown backend: {}", other))),
    }
}

/// Progress lines go to stderr so stdout stays clean for results.
pub fn progress_reporter(quiet: bool) -> ProgressReporter {
    if quiet {
        return ProgressReporter::noop();
    }
    ProgressReporter::new(Arc::new(|event: ProgressEvent| {
        eprintln!("{}", event.format_simple());
    }))
}
