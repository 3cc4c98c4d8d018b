//! In-process vector index service.
//!
//! Implements the full service contract in memory. It can also imitate a
//! remote store: a provisioning delay before a new index reports ready, and a
//! visibility lag before writes and deletes show up in stats and queries.
//! Both are measured on `tokio::time`, so paused-clock tests stay exact.

use crate::vector_index::{
    IndexDescription, IndexHandle, IndexSpec, IndexStats, Metadata, Metric, QueryRequest,
    ScoredVector, VectorIndexService, VectorRecord,
};
use async_trait::async_trait;
use prodrec_core::{AppError, AppResult};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

/// Memory-backed index service.
#[derive(Debug, Default)]
pub struct MemoryIndexService {
    indexes: Mutex<HashMap<String, Arc<MemoryIndex>>>,
    provisioning_delay: Duration,
    visibility_lag: Duration,
}

impl MemoryIndexService {
    /// Create a service with immediate readiness and read-after-write visibility.
    pub fn new() -> Self {
        Self::default()
    }

    /// New indexes report `ready == false` until `delay` has elapsed.
    pub fn with_provisioning_delay(mut self, delay: Duration) -> Self {
        self.provisioning_delay = delay;
        self
    }

    /// Writes and deletes become visible to stats and queries after `lag`.
    pub fn with_visibility_lag(mut self, lag: Duration) -> Self {
        self.visibility_lag = lag;
        self
    }

    /// Drop an index; open handles start failing with `IndexUnavailable`.
    pub fn delete_index(&self, name: &str) -> AppResult<()> {
        let removed = self.lock()?.remove(name);
        match removed {
            Some(index) => {
                index.lock()?.dropped = true;
                tracing::debug!(index = name, "Dropped memory index");
                Ok(())
            }
            None => Err(AppError::IndexUnavailable(format!(
                "Index '{}' does not exist",
                name
            ))),
        }
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, HashMap<String, Arc<MemoryIndex>>>> {
        self.indexes
            .lock()
            .map_err(|_| AppError::Index("Memory index registry lock poisoned".to_string()))
    }
}

#[async_trait]
impl VectorIndexService for MemoryIndexService {
    async fn list_index_names(&self) -> AppResult<Vec<String>> {
        let mut names: Vec<String> = self.lock()?.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn create_index(&self, spec: &IndexSpec) -> AppResult<()> {
        if spec.name.trim().is_empty() {
            return Err(AppError::IndexCreation("Index name is empty".to_string()));
        }
        if spec.dimension == 0 {
            return Err(AppError::IndexCreation(
                "Index dimension must be at least 1".to_string(),
            ));
        }

        let mut indexes = self.lock()?;
        if indexes.contains_key(&spec.name) {
            return Err(AppError::IndexCreation(format!(
                "Index '{}' already exists",
                spec.name
            )));
        }

        let index = MemoryIndex {
            spec: spec.clone(),
            ready_at: Instant::now() + self.provisioning_delay,
            visibility_lag: self.visibility_lag,
            state: Mutex::new(IndexState::default()),
        };
        indexes.insert(spec.name.clone(), Arc::new(index));

        tracing::debug!(index = %spec.name, dimension = spec.dimension, metric = %spec.metric, "Created memory index");
        Ok(())
    }

    async fn describe_index(&self, name: &str) -> AppResult<IndexDescription> {
        let index = self
            .lock()?
            .get(name)
            .cloned()
            .ok_or_else(|| AppError::Index(format!("Index '{}' not found", name)))?;

        Ok(IndexDescription {
            name: index.spec.name.clone(),
            dimension: index.spec.dimension,
            metric: index.spec.metric,
            ready: Instant::now() >= index.ready_at,
            host: None,
        })
    }

    async fn index(&self, name: &str) -> AppResult<Arc<dyn IndexHandle>> {
        let index = self.lock()?.get(name).cloned().ok_or_else(|| {
            AppError::IndexUnavailable(format!("Index '{}' does not exist", name))
        })?;

        Ok(Arc::new(MemoryIndexHandle { index }))
    }
}

#[derive(Debug)]
struct MemoryIndex {
    spec: IndexSpec,
    ready_at: Instant,
    visibility_lag: Duration,
    state: Mutex<IndexState>,
}

impl MemoryIndex {
    fn lock(&self) -> AppResult<MutexGuard<'_, IndexState>> {
        self.state
            .lock()
            .map_err(|_| AppError::Index(format!("Index '{}' lock poisoned", self.spec.name)))
    }

    /// Lock the state, fail if dropped, and apply every write that is due.
    fn visible_state(&self) -> AppResult<MutexGuard<'_, IndexState>> {
        let mut state = self.lock()?;
        if state.dropped {
            return Err(AppError::IndexUnavailable(format!(
                "Index '{}' was deleted",
                self.spec.name
            )));
        }
        state.apply_due(Instant::now());
        Ok(state)
    }

    fn check_dimension(&self, len: usize, what: &str) -> AppResult<()> {
        if len != self.spec.dimension {
            return Err(AppError::Index(format!(
                "{} dimension {} does not match index dimension {}",
                what, len, self.spec.dimension
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct IndexState {
    /// Visible entries in first-insertion order
    entries: Vec<StoredVector>,
    /// Writes not yet visible, in submission order
    pending: Vec<PendingOp>,
    dropped: bool,
}

#[derive(Debug, Clone)]
struct StoredVector {
    id: String,
    values: Vec<f32>,
    metadata: Option<Metadata>,
}

#[derive(Debug)]
struct PendingOp {
    visible_at: Instant,
    op: WriteOp,
}

#[derive(Debug)]
enum WriteOp {
    Upsert(Vec<VectorRecord>),
    DeleteAll,
}

impl IndexState {
    fn submit(&mut self, op: WriteOp, lag: Duration) {
        let now = Instant::now();
        self.pending.push(PendingOp {
            visible_at: now + lag,
            op,
        });
        self.apply_due(now);
    }

    fn apply_due(&mut self, now: Instant) {
        let due = self
            .pending
            .iter()
            .take_while(|p| p.visible_at <= now)
            .count();

        for pending in self.pending.drain(..due).collect::<Vec<_>>() {
            match pending.op {
                WriteOp::Upsert(records) => {
                    for record in records {
                        let stored = StoredVector {
                            id: record.id,
                            values: record.values,
                            metadata: record.metadata,
                        };
                        match self.entries.iter_mut().find(|e| e.id == stored.id) {
                            Some(existing) => *existing = stored,
                            None => self.entries.push(stored),
                        }
                    }
                }
                WriteOp::DeleteAll => self.entries.clear(),
            }
        }
    }
}

/// Handle bound to one memory index.
struct MemoryIndexHandle {
    index: Arc<MemoryIndex>,
}

#[async_trait]
impl IndexHandle for MemoryIndexHandle {
    fn name(&self) -> &str {
        &self.index.spec.name
    }

    async fn upsert(&self, records: &[VectorRecord]) -> AppResult<usize> {
        for record in records {
            if record.id.is_empty() {
                return Err(AppError::Index("Vector id must not be empty".to_string()));
            }
            self.index.check_dimension(record.values.len(), "Vector")?;
        }

        let mut state = self.index.visible_state()?;
        state.submit(WriteOp::Upsert(records.to_vec()), self.index.visibility_lag);
        Ok(records.len())
    }

    async fn delete_all(&self) -> AppResult<()> {
        let mut state = self.index.visible_state()?;
        state.submit(WriteOp::DeleteAll, self.index.visibility_lag);
        Ok(())
    }

    async fn describe_stats(&self) -> AppResult<IndexStats> {
        let state = self.index.visible_state()?;
        Ok(IndexStats {
            total_vector_count: state.entries.len() as u64,
            dimension: Some(self.index.spec.dimension),
        })
    }

    async fn query(&self, request: &QueryRequest) -> AppResult<Vec<ScoredVector>> {
        if request.top_k == 0 {
            return Err(AppError::Index("top_k must be at least 1".to_string()));
        }
        self.index.check_dimension(request.vector.len(), "Query vector")?;

        let state = self.index.visible_state()?;
        let mut scored: Vec<(f32, &StoredVector)> = state
            .entries
            .iter()
            .map(|entry| (score(self.index.spec.metric, &request.vector, &entry.values), entry))
            .collect();

        // Stable: equal scores keep insertion order
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(request.top_k);

        Ok(scored
            .into_iter()
            .map(|(score, entry)| ScoredVector {
                id: entry.id.clone(),
                score,
                values: request.include_values.then(|| entry.values.clone()),
                metadata: if request.include_metadata {
                    entry.metadata.clone()
                } else {
                    None
                },
            })
            .collect())
    }
}

/// Higher is more similar for every metric; euclidean is negated distance.
fn score(metric: Metric, a: &[f32], b: &[f32]) -> f32 {
    match metric {
        Metric::Cosine => cosine_similarity(a, b),
        Metric::DotProduct => a.iter().zip(b).map(|(x, y)| x * y).sum(),
        Metric::Euclidean => -a
            .iter()
            .zip(b)
            .map(|(x, y)| (x - y) * (x - y))
            .sum::<f32>()
            .sqrt(),
    }
}

/// Calculate cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}
