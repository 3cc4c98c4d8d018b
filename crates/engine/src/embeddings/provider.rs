//! Embedding provider trait and factory.

use crate::embeddings::cache::CachedProvider;
use crate::embeddings::config::EmbeddingConfig;
use crate::embeddings::providers::{ollama::OllamaProvider, trigram::TrigramProvider};
use prodrec_core::{AppError, AppResult};
use std::sync::Arc;

/// Trait for embedding providers.
///
/// Providers are deterministic for a fixed model and do not retry: a failed
/// call is returned to the caller as-is.
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync + std::fmt::Debug {
    /// Get provider name (e.g., "trigram", "ollama")
    fn provider_name(&self) -> &str;

    /// Get model identifier
    fn model_name(&self) -> &str;

    /// Get embedding dimensions
    fn dimensions(&self) -> usize;

    /// Generate embeddings for multiple texts in a batch.
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>>;

    /// Generate embedding for a single text (convenience method).
    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        let mut results = self.embed_batch(&[text.to_string()]).await?;
        results
            .pop()
            .ok_or_else(|| AppError::Embedding("No embedding returned".to_string()))
    }
}

/// Create an embedding provider based on configuration.
///
/// The provider is wrapped in a [`CachedProvider`] when `config.cache` is set.
pub fn create_provider(config: &EmbeddingConfig) -> AppResult<Arc<dyn EmbeddingProvider>> {
    let provider: Arc<dyn EmbeddingProvider> = match config.provider.as_str() {
        "trigram" => Arc::new(TrigramProvider::new(config.dimensions)),
        "ollama" => Arc::new(OllamaProvider::new(config)?),
        _ => {
            return Err(AppError::Config(format!(
                "Unknown embedding provider: '{}'. Supported providers: trigram, ollama",
                config.provider
            )))
        }
    };

    tracing::debug!(
        "Created embedding provider: provider={}, model={}, dimensions={}, cache={}",
        provider.provider_name(),
        provider.model_name(),
        provider.dimensions(),
        config.cache
    );

    if config.cache {
        Ok(Arc::new(CachedProvider::new(provider)))
    } else {
        Ok(provider)
    }
}
