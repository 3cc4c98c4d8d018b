//! Recommender configuration management.

use crate::embeddings::EmbeddingConfig;
use crate::vector_index::{IndexSpec, Metric, Placement};
use prodrec_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Queries issued by `run` when none are given.
pub const DEFAULT_QUERIES: &[&str] = &[
    "bluetooth speaker",
    "fitness gear",
    "eco-friendly products",
    "electronic gadgets",
    "kitchen items",
];

/// Complete recommender configuration, stored in
/// `<workspace>/.prodrec/recommender.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecommenderConfig {
    pub index: IndexConfig,
    pub embedding: EmbeddingConfig,
    pub timings: TimingConfig,
    pub ingest: IngestConfig,
    pub query: QueryConfig,
    pub dataset: DatasetConfig,
}

/// Target index definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IndexConfig {
    pub name: String,
    pub dimension: usize,
    pub metric: Metric,
    pub placement: Placement,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            name: "product-recommend".to_string(),
            dimension: 384,
            metric: Metric::Cosine,
            placement: Placement::default(),
        }
    }
}

impl IndexConfig {
    pub fn spec(&self) -> IndexSpec {
        IndexSpec {
            name: self.name.clone(),
            dimension: self.dimension,
            metric: self.metric,
            placement: self.placement.clone(),
        }
    }
}

/// How to wait for the index to reflect a change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum SettleStrategy {
    /// Sleep a fixed time and assume the change is visible.
    #[serde(rename_all = "camelCase")]
    Fixed { delay_secs: u64 },

    /// Poll index stats until the expected count is observed.
    #[serde(rename_all = "camelCase")]
    Poll { interval_ms: u64, timeout_secs: u64 },
}

impl SettleStrategy {
    pub fn fixed(delay_secs: u64) -> Self {
        SettleStrategy::Fixed { delay_secs }
    }

    pub fn describe(&self) -> String {
        match self {
            SettleStrategy::Fixed { delay_secs } => format!("fixed {}s delay", delay_secs),
            SettleStrategy::Poll {
                interval_ms,
                timeout_secs,
            } => format!("poll every {}ms for up to {}s", interval_ms, timeout_secs),
        }
    }
}

/// Waits around index creation, reset and ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimingConfig {
    pub ready_poll_interval_ms: u64,

    /// `None` polls until ready with no bound
    pub ready_timeout_secs: Option<u64>,

    pub reset_settle: SettleStrategy,

    pub consistency: SettleStrategy,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            ready_poll_interval_ms: 2000,
            ready_timeout_secs: Some(300),
            reset_settle: SettleStrategy::fixed(5),
            consistency: SettleStrategy::fixed(30),
        }
    }
}

impl TimingConfig {
    pub fn ready_poll_interval(&self) -> Duration {
        Duration::from_millis(self.ready_poll_interval_ms)
    }

    pub fn ready_timeout(&self) -> Option<Duration> {
        self.ready_timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IngestConfig {
    /// Entries per upsert request
    pub batch_size: usize,

    /// Descriptions embedded concurrently
    pub embed_concurrency: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_size: 1,
            embed_concurrency: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryConfig {
    pub top_k: usize,
    pub queries: Vec<String>,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            top_k: 3,
            queries: DEFAULT_QUERIES.iter().map(|q| q.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DatasetConfig {
    /// CSV path, relative to the workspace unless absolute
    pub path: PathBuf,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("products.csv"),
        }
    }
}

impl DatasetConfig {
    pub fn resolve(&self, workspace: &Path) -> PathBuf {
        if self.path.is_absolute() {
            self.path.clone()
        } else {
            workspace.join(&self.path)
        }
    }
}

impl RecommenderConfig {
    /// Reject settings no run could succeed with.
    pub fn validate(&self) -> AppResult<()> {
        if self.index.name.trim().is_empty() {
            return Err(AppError::Config("index.name must not be empty".to_string()));
        }
        if self.index.dimension == 0 {
            return Err(AppError::Config(
                "index.dimension must be at least 1".to_string(),
            ));
        }
        if self.embedding.dimensions != self.index.dimension {
            // The index rejects mismatched vectors per record and per query
            tracing::warn!(
                embedding = self.embedding.dimensions,
                index = self.index.dimension,
                "Embedding dimensions differ from index dimension"
            );
        }
        if self.ingest.batch_size == 0 {
            return Err(AppError::Config(
                "ingest.batchSize must be at least 1".to_string(),
            ));
        }
        if self.ingest.embed_concurrency == 0 {
            return Err(AppError::Config(
                "ingest.embedConcurrency must be at least 1".to_string(),
            ));
        }
        if self.query.top_k == 0 {
            return Err(AppError::Config("query.topK must be at least 1".to_string()));
        }
        for (field, strategy) in [
            ("timings.resetSettle", &self.timings.reset_settle),
            ("timings.consistency", &self.timings.consistency),
        ] {
            if let SettleStrategy::Poll { interval_ms: 0, .. } = strategy {
                return Err(AppError::Config(format!(
                    "{}.intervalMs must be at least 1",
                    field
                )));
            }
        }
        Ok(())
    }
}

/// Load the recommender configuration.
///
/// Reads `.prodrec/recommender.yaml` under the workspace if it exists,
/// otherwise returns the defaults.
pub fn load_config(workspace: &Path) -> AppResult<RecommenderConfig> {
    let config_path = get_config_path(workspace);

    if !config_path.exists() {
        tracing::debug!(
            "Using default recommender config (no file at {:?})",
            config_path
        );
        return Ok(RecommenderConfig::default());
    }

    let content = fs::read_to_string(&config_path).map_err(|e| {
        AppError::Config(format!("Failed to read config at {:?}: {}", config_path, e))
    })?;

    let config: RecommenderConfig = serde_yaml::from_str(&content).map_err(|e| {
        AppError::Config(format!("Failed to parse config at {:?}: {}", config_path, e))
    })?;

    tracing::debug!("Loaded recommender config from {:?}", config_path);
    Ok(config)
}

/// Save the recommender configuration.
pub fn save_config(workspace: &Path, config: &RecommenderConfig) -> AppResult<()> {
    let config_path = get_config_path(workspace);

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| AppError::Config(format!("Failed to create config directory: {}", e)))?;
    }

    let yaml = serde_yaml::to_string(config)?;
    fs::write(&config_path, yaml).map_err(|e| {
        AppError::Config(format!("Failed to write config to {:?}: {}", config_path, e))
    })?;

    tracing::debug!("Saved recommender config to {:?}", config_path);
    Ok(())
}

/// Path of the recommender config file.
pub fn get_config_path(workspace: &Path) -> PathBuf {
    workspace.join(".prodrec").join("recommender.yaml")
}
