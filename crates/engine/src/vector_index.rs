//! Vector index service abstraction.
//!
//! Defines the provider-agnostic contract the recommender needs from a remote
//! vector store: index management on the service, and a per-index handle for
//! writes, stats and nearest-neighbor queries. Stores are assumed eventually
//! consistent; callers must not expect a write to be visible immediately.

use async_trait::async_trait;
use prodrec_core::AppResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Scalar metadata stored with a vector.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Similarity metric of an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Cosine,
    Euclidean,
    #[serde(rename = "dotproduct")]
    DotProduct,
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Metric::Cosine => "cosine",
            Metric::Euclidean => "euclidean",
            Metric::DotProduct => "dotproduct",
        };
        f.write_str(name)
    }
}

/// Where the service should provision the index (opaque to the pipeline).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub cloud: String,
    pub region: String,
}

impl Default for Placement {
    fn default() -> Self {
        Self {
            cloud: "aws".to_string(),
            region: "us-east-1".to_string(),
        }
    }
}

/// Everything needed to create an index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSpec {
    pub name: String,
    pub dimension: usize,
    pub metric: Metric,
    pub placement: Placement,
}

/// Control-plane view of an index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexDescription {
    pub name: String,
    pub dimension: usize,
    pub metric: Metric,
    pub ready: bool,
    /// Data-plane host, when the service exposes one
    pub host: Option<String>,
}

/// Data-plane statistics of an index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexStats {
    pub total_vector_count: u64,
    pub dimension: Option<usize>,
}

/// A vector write: insert, or overwrite every field of an existing id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

/// A nearest-neighbor request.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    pub vector: Vec<f32>,
    pub top_k: usize,
    pub include_metadata: bool,
    pub include_values: bool,
}

impl QueryRequest {
    /// Request with metadata but without raw vectors.
    pub fn with_metadata(vector: Vec<f32>, top_k: usize) -> Self {
        Self {
            vector,
            top_k,
            include_metadata: true,
            include_values: false,
        }
    }
}

/// One query hit, ordered by descending score in a response.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredVector {
    pub id: String,
    pub score: f32,
    pub values: Option<Vec<f32>>,
    pub metadata: Option<Metadata>,
}

/// Index management operations of a vector service.
#[async_trait]
pub trait VectorIndexService: Send + Sync {
    /// Names of all indexes visible to this client.
    async fn list_index_names(&self) -> AppResult<Vec<String>>;

    /// Create an index. Fails with `AppError::IndexCreation` when the
    /// service rejects the spec or the name is taken.
    async fn create_index(&self, spec: &IndexSpec) -> AppResult<()>;

    /// Describe an index, including its readiness.
    async fn describe_index(&self, name: &str) -> AppResult<IndexDescription>;

    /// Open a handle bound to one index.
    async fn index(&self, name: &str) -> AppResult<Arc<dyn IndexHandle>>;
}

/// Data operations on one index.
///
/// Implementations must support:
/// - Upserting vectors keyed by id (full overwrite, no field merge)
/// - Deleting every vector
/// - Reporting the vector count
/// - Top-k search, ordered by descending score
#[async_trait]
pub trait IndexHandle: Send + Sync {
    /// Name of the bound index.
    fn name(&self) -> &str;

    /// Insert or overwrite vectors. Returns the number acknowledged.
    async fn upsert(&self, records: &[VectorRecord]) -> AppResult<usize>;

    /// Delete every vector in the index. Irreversible.
    async fn delete_all(&self) -> AppResult<()>;

    /// Current statistics; may lag behind recent writes.
    async fn describe_stats(&self) -> AppResult<IndexStats>;

    /// Search for the `top_k` nearest vectors.
    async fn query(&self, request: &QueryRequest) -> AppResult<Vec<ScoredVector>>;
}
