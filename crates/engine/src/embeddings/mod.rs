//! Embedding adapter.
//!
//! Wraps an external embedding model behind [`EmbeddingProvider`]. The
//! produced dimension must equal the index dimension; a mismatch is reported
//! by the index on the first upsert or query, not checked up front.

pub mod cache;
pub mod config;
pub mod provider;
pub mod providers;

pub use cache::CachedProvider;
pub use config::EmbeddingConfig;
pub use provider::{create_provider, EmbeddingProvider};
