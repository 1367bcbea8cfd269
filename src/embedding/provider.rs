//! Embedding provider trait and FastEmbed implementation
use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum EmbeddingError {
    #[error("Model initialization failed: {0}")]
    InitializationError(String),

    #[error("Embedding generation failed: {0}")]
    GenerationError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    #[error("Embedding request timed out after {0:?}")]
    Timeout(Duration),
}

impl EmbeddingError {
    /// Whether another attempt could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EmbeddingError::GenerationError(_)
                | EmbeddingError::Unavailable(_)
                | EmbeddingError::Timeout(_)
        )
    }
}

/// Trait for embedding providers
///
/// Used identically for chunk text and query text. Implementations may fail
/// or stall; timeouts and retries are applied by the caller.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Get the embedding dimension
    fn dimension(&self) -> usize;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// FastEmbed provider for local embedding generation
///
/// Uses all-MiniLM-L6-v2 model (384 dimensions) by default.
/// Inference is CPU-bound and runs on the blocking thread pool.
pub struct FastEmbedProvider {
    model: Arc<TextEmbedding>,
    model_name: String,
    dimension: usize,
}

impl FastEmbedProvider {
    /// Create a new FastEmbed provider with the specified model
    ///
    /// Models are downloaded on-demand to `~/.cache/huggingface/` on first use.
    pub fn new(model_name: &str) -> Result<Self, EmbeddingError> {
        let (embedding_model, dimension) = match model_name {
            "all-MiniLM-L6-v2" | "all-minilm-l6-v2" => (EmbeddingModel::AllMiniLML6V2, 384),
            "bge-small-en-v1.5" => (EmbeddingModel::BGESmallENV15, 384),
            "bge-base-en-v1.5" => (EmbeddingModel::BGEBaseENV15, 768),
            "nomic-embed-text" | "nomic-embed-text-v1.5" => {
                (EmbeddingModel::NomicEmbedTextV15, 768)
            }
            _ => {
                return Err(EmbeddingError::InitializationError(format!(
                    "Unsupported model: {}. Supported: all-MiniLM-L6-v2, bge-small-en-v1.5, bge-base-en-v1.5, nomic-embed-text",
                    model_name
                )));
            }
        };

        tracing::info!(
            "Initializing local embedding model: {} ({}D)",
            model_name,
            dimension
        );

        let init_options = InitOptions::new(embedding_model).with_show_download_progress(true);

        let model = TextEmbedding::try_new(init_options)
            .map_err(|e| EmbeddingError::InitializationError(e.to_string()))?;

        Ok(Self {
            model: Arc::new(model),
            model_name: model_name.to_string(),
            dimension,
        })
    }

    /// Create provider with default model (all-MiniLM-L6-v2)
    pub fn with_default_model() -> Result<Self, EmbeddingError> {
        Self::new("all-MiniLM-L6-v2")
    }
}

#[async_trait]
impl EmbeddingProvider for FastEmbedProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.is_empty() {
            return Err(EmbeddingError::InvalidInput("Empty text".to_string()));
        }

        let model = Arc::clone(&self.model);
        let input = vec![text.to_string()];

        let embeddings = tokio::task::spawn_blocking(move || model.embed(input, None))
            .await
            .map_err(|e| EmbeddingError::GenerationError(e.to_string()))?
            .map_err(|e| EmbeddingError::GenerationError(e.to_string()))?;

        let embedding = embeddings.into_iter().next().ok_or_else(|| {
            EmbeddingError::GenerationError("No embeddings generated".to_string())
        })?;

        if embedding.len() != self.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }

        Ok(embedding)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::cosine_similarity;

    #[test]
    fn test_retryable_errors() {
        assert!(EmbeddingError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(EmbeddingError::Unavailable("down".into()).is_retryable());
        assert!(!EmbeddingError::InvalidInput("empty".into()).is_retryable());
        assert!(!EmbeddingError::DimensionMismatch {
            expected: 3,
            actual: 2
        }
        .is_retryable());
    }

    #[test]
    fn test_unsupported_model() {
        assert!(matches!(
            FastEmbedProvider::new("not-a-model"),
            Err(EmbeddingError::InitializationError(_))
        ));
    }

    #[tokio::test]
    #[ignore] // Requires model download (~90MB) - run with: cargo test -- --ignored
    async fn test_single_embedding() {
        let provider = FastEmbedProvider::with_default_model().unwrap();
        let embedding = provider
            .embed("This is a test sentence for embedding.")
            .await
            .unwrap();
        assert_eq!(embedding.len(), 384);
    }

    #[tokio::test]
    #[ignore] // Requires model download (~90MB) - run with: cargo test -- --ignored
    async fn test_semantic_similarity() {
        let provider = FastEmbedProvider::with_default_model().unwrap();

        let emb1 = provider.embed("The cat sits on the mat.").await.unwrap();
        let emb2 = provider.embed("A feline rests on the rug.").await.unwrap();
        let emb3 = provider.embed("Python programming language.").await.unwrap();

        assert!(cosine_similarity(&emb1, &emb2) > cosine_similarity(&emb1, &emb3));
    }
}
