//! Memoizing wrapper around an embedding provider.

use crate::embeddings::EmbeddingProvider;
use prodrec_core::{AppError, AppResult};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Caches embeddings by exact input text.
///
/// Catalogs repeat descriptions and query loops repeat queries; since
/// providers are deterministic, a hit returns what the model would have.
/// Failed texts are not cached.
#[derive(Debug)]
pub struct CachedProvider {
    inner: Arc<dyn EmbeddingProvider>,
    cache: RwLock<HashMap<String, Vec<f32>>>,
}

impl CachedProvider {
    pub fn new(inner: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            inner,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Number of cached texts.
    pub fn len(&self) -> usize {
        self.cache.read().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned() -> AppError {
    AppError::Embedding("Embedding cache lock poisoned".to_string())
}

#[async_trait::async_trait]
impl EmbeddingProvider for CachedProvider {
    fn provider_name(&self) -> &str {
        self.inner.provider_name()
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        let mut results: Vec<Option<Vec<f32>>> = Vec::with_capacity(texts.len());
        let mut misses: Vec<String> = Vec::new();
        {
            let cache = self.cache.read().map_err(|_| poisoned())?;
            for text in texts {
                let hit = cache.get(text).cloned();
                if hit.is_none() && !misses.contains(text) {
                    misses.push(text.clone());
                }
                results.push(hit);
            }
        }

        if !misses.is_empty() {
            tracing::debug!(
                "Embedding cache: {} hits, {} misses",
                texts.len() - results.iter().filter(|r| r.is_none()).count(),
                misses.len()
            );

            let fresh = self.inner.embed_batch(&misses).await?;
            if fresh.len() != misses.len() {
                return Err(AppError::Embedding(format!(
                    "Provider returned {} embeddings for {} texts",
                    fresh.len(),
                    misses.len()
                )));
            }

            let mut cache = self.cache.write().map_err(|_| poisoned())?;
            for (text, embedding) in misses.into_iter().zip(fresh) {
                cache.insert(text, embedding);
            }
            for (slot, text) in results.iter_mut().zip(texts) {
                if slot.is_none() {
                    *slot = cache.get(text).cloned();
                }
            }
        }

        results
            .into_iter()
            .map(|r| r.ok_or_else(|| AppError::Embedding("Embedding missing from cache".to_string())))
            .collect()
    }
}
