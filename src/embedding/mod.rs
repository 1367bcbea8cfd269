//! Embedding generation
//!
//! The embedding model itself is an external collaborator; this module owns
//! the contract (`EmbeddingProvider`), two concrete providers, the
//! content-addressed cache and the per-query concurrent fetch.
//! - `OllamaProvider` talks to an Ollama server ("online" mode)
//! - `FastEmbedProvider` runs a local ONNX model ("offline" mode)

mod batch;
mod cache;
mod ollama;
mod provider;

pub use batch::{EmbeddingFetcher, FetchPolicy, QueryEmbeddings};
pub use cache::EmbeddingCache;
pub use ollama::{OllamaProvider, DEFAULT_OLLAMA_URL};
pub use provider::{EmbeddingError, EmbeddingProvider, FastEmbedProvider};

use crate::config::{parse_duration, EmbeddingConfig};
use crate::error::{RagError, Result};
use std::sync::Arc;

/// Build the provider selected by `config.mode`
pub fn provider_from_config(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.mode.as_str() {
        "online" => Ok(Arc::new(OllamaProvider::new(
            config.model.clone(),
            config.dimension,
            Some(config.base_url.clone()),
        ))),
        "offline" => {
            let provider = FastEmbedProvider::new(&config.model)
                .map_err(|e| RagError::EmbeddingProvider(e.to_string()))?;
            Ok(Arc::new(provider))
        }
        other => Err(RagError::InvalidConfigValue {
            path: "embedding.mode".to_string(),
            message: format!("Mode must be 'offline' or 'online', got '{}'", other),
        }),
    }
}

/// Fetch policy described by the embedding configuration
pub fn fetch_policy_from_config(config: &EmbeddingConfig) -> Result<FetchPolicy> {
    let timeout = parse_duration(&config.timeout).ok_or_else(|| RagError::InvalidConfigValue {
        path: "embedding.timeout".to_string(),
        message: format!("Invalid duration format: {}", config.timeout),
    })?;

    Ok(FetchPolicy {
        timeout,
        max_retries: config.max_retries,
        max_concurrent: config.max_concurrent,
        ..FetchPolicy::default()
    })
}

/// Fetcher wired with the configured provider, policy and optional cache
pub fn fetcher_from_config(
    config: &EmbeddingConfig,
    provider: Arc<dyn EmbeddingProvider>,
) -> Result<EmbeddingFetcher> {
    let fetcher = EmbeddingFetcher::new(provider, fetch_policy_from_config(config)?);
    Ok(if config.cache {
        fetcher.with_cache(Arc::new(EmbeddingCache::new(config.cache_max_entries)))
    } else {
        fetcher
    })
}
