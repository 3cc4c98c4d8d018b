//! Recommendation queries against a populated index.

use crate::embeddings::EmbeddingProvider;
use crate::progress::ProgressReporter;
use crate::types::{ProductMetadataView, QueryError, QueryMatch, Recommendation};
use crate::vector_index::{IndexHandle, QueryRequest};
use prodrec_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// A query string together with its outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub query: String,
    pub recommendation: Recommendation,
}

/// Find the `top_k` catalog items closest to `query`.
///
/// Never fails: an index, embedding or argument error becomes
/// [`Recommendation::Failed`] so a loop over many queries keeps going.
/// An index with no vectors yields [`Recommendation::EmptyIndex`] without a
/// similarity query being sent.
pub async fn recommend(
    handle: &dyn IndexHandle,
    embedder: &dyn EmbeddingProvider,
    query: &str,
    top_k: usize,
) -> Recommendation {
    match try_recommend(handle, embedder, query, top_k).await {
        Ok(recommendation) => recommendation,
        Err(e) => {
            tracing::warn!(index = handle.name(), query, "Query failed: {}", e);
            Recommendation::Failed(QueryError {
                query: query.to_string(),
                message: e.to_string(),
            })
        }
    }
}

async fn try_recommend(
    handle: &dyn IndexHandle,
    embedder: &dyn EmbeddingProvider,
    query: &str,
    top_k: usize,
) -> AppResult<Recommendation> {
    if top_k == 0 {
        return Err(AppError::Config("top_k must be at least 1".to_string()));
    }

    let stats = handle.describe_stats().await?;
    if stats.total_vector_count == 0 {
        tracing::info!(index = handle.name(), query, "Index is empty, skipping query");
        return Ok(Recommendation::EmptyIndex);
    }

    let vector = embedder.embed(query).await?;
    let hits = handle
        .query(&QueryRequest::with_metadata(vector, top_k))
        .await?;

    if hits.is_empty() {
        tracing::info!(index = handle.name(), query, "No matches");
        return Ok(Recommendation::NoMatch);
    }

    let mut matches: Vec<QueryMatch> = hits
        .into_iter()
        .map(|hit| QueryMatch {
            metadata: hit.metadata.as_ref().and_then(ProductMetadataView::from_map),
            id: hit.id,
            score: hit.score,
        })
        .collect();

    // Stable, so exact ties keep the service's order
    matches.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    matches.truncate(top_k);

    tracing::debug!(
        index = handle.name(),
        query,
        matches = matches.len(),
        "Query answered"
    );
    Ok(Recommendation::Matches { matches })
}

/// Run several queries, each isolated from the others' failures.
pub async fn recommend_all(
    handle: &dyn IndexHandle,
    embedder: &dyn EmbeddingProvider,
    queries: &[String],
    top_k: usize,
    progress: &ProgressReporter,
) -> Vec<QueryResult> {
    let mut results = Vec::with_capacity(queries.len());

    for (i, query) in queries.iter().enumerate() {
        progress.query(i as u64 + 1, queries.len() as u64, query);
        let recommendation = recommend(handle, embedder, query, top_k).await;
        results.push(QueryResult {
            query: query.clone(),
            recommendation,
        });
    }

    results
}
