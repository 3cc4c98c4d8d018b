//! Product recommendation engine.
//!
//! Embeds a product catalog into a vector index and answers free-text
//! similarity queries against it. A run goes through four stages, each in its
//! own module:
//!
//! 1. [`lifecycle`]: create the index, or empty the existing one
//! 2. [`ingest`]: embed every product and upsert it, isolating failures
//! 3. [`consistency`]: wait for the eventually consistent index to catch up
//! 4. [`recommend`]: embed queries and return ranked matches
//!
//! The index handle opened in stage 1 is passed explicitly through the rest of
//! the run; nothing is held in global state.

pub mod config;
pub mod consistency;
pub mod dataset;
pub mod embeddings;
pub mod ingest;
pub mod lifecycle;
pub mod memory_index;
pub mod pinecone_index;
pub mod progress;
pub mod recommend;
pub mod types;
pub mod vector_index;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use config::RecommenderConfig;
pub use ingest::IngestOptions;
pub use recommend::QueryResult;
pub use types::{
    IngestionReport, ProductMetadataView, ProductRecord, QueryError, QueryMatch, Recommendation,
    RecordFailure,
};

use embeddings::EmbeddingProvider;
use progress::ProgressReporter;
use prodrec_core::{AppError, AppResult};
use serde::Serialize;
use std::sync::Arc;
use vector_index::{IndexHandle, VectorIndexService};

/// Everything a full run produced.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineSummary {
    pub index: String,
    pub report: IngestionReport,
    pub results: Vec<QueryResult>,
}

/// Reset the index, ingest `records`, and optionally wait for consistency.
///
/// Returns the handle for follow-up queries along with the ingestion report.
/// The index's previous contents are destroyed. A consistency wait that times
/// out is logged and the run continues; the report is never discarded for it.
pub async fn reset_and_ingest(
    service: &dyn VectorIndexService,
    embedder: &dyn EmbeddingProvider,
    config: &RecommenderConfig,
    records: &[ProductRecord],
    wait_for_consistency: bool,
    progress: &ProgressReporter,
) -> AppResult<(Arc<dyn IndexHandle>, IngestionReport)> {
    config.validate()?;

    let handle = lifecycle::ensure_clean_index(
        service,
        &config.index.spec(),
        &config.timings,
        progress,
    )
    .await?;

    let report = ingest::ingest(
        handle.as_ref(),
        embedder,
        records,
        &IngestOptions::from(&config.ingest),
        progress,
    )
    .await?;

    if wait_for_consistency {
        progress.settle(&config.timings.consistency.describe());
        let settled = consistency::await_consistency(
            handle.as_ref(),
            &config.timings.consistency,
            report.distinct_ids as u64,
        )
        .await;
        match settled {
            Err(e @ AppError::ConsistencyTimeout { .. }) => {
                tracing::warn!(
                    index = handle.name(),
                    "{}; continuing with the current index state",
                    e
                );
            }
            other => other?,
        }
    }

    Ok((handle, report))
}

/// Run the whole flow: reset, ingest, settle, then answer `queries`.
///
/// Lifecycle errors end the run. Record and query failures are reported
/// inside the summary.
pub async fn run_pipeline(
    service: &dyn VectorIndexService,
    embedder: &dyn EmbeddingProvider,
    config: &RecommenderConfig,
    records: &[ProductRecord],
    queries: &[String],
    progress: &ProgressReporter,
) -> AppResult<PipelineSummary> {
    tracing::info!(
        index = %config.index.name,
        records = records.len(),
        queries = queries.len(),
        "Starting recommendation pipeline"
    );

    let (handle, report) =
        reset_and_ingest(service, embedder, config, records, true, progress).await?;

    let results = recommend::recommend_all(
        handle.as_ref(),
        embedder,
        queries,
        config.query.top_k,
        progress,
    )
    .await;

    Ok(PipelineSummary {
        index: config.index.name.clone(),
        report,
        results,
    })
}
