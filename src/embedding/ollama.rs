//! Ollama HTTP embedding provider

use super::{EmbeddingError, EmbeddingProvider};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Embeddings from a running Ollama server (`POST /api/embed`)
pub struct OllamaProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    dimension: usize,
}

#[derive(Serialize)]
struct OllamaEmbedRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
    truncate: bool,
}

#[derive(Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl OllamaProvider {
    /// `dimension` is the expected vector size of `model` (768 for nomic-embed-text)
    pub fn new(model: impl Into<String>, dimension: usize, base_url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            model: model.into(),
            dimension,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.is_empty() {
            return Err(EmbeddingError::InvalidInput("Empty text".to_string()));
        }

        let url = format!("{}/api/embed", self.base_url);
        let request = OllamaEmbedRequest {
            model: &self.model,
            input: vec![text],
            truncate: true,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() {
                    EmbeddingError::Unavailable(format!("Ollama unreachable at {}: {}", url, e))
                } else {
                    EmbeddingError::GenerationError(format!("Ollama HTTP error: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = format!("Ollama returned {}: {}", status, body);
            return Err(if status.is_server_error() {
                EmbeddingError::Unavailable(message)
            } else {
                EmbeddingError::GenerationError(message)
            });
        }

        let parsed: OllamaEmbedResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::GenerationError(format!("Ollama JSON parse error: {}", e)))?;

        let embedding = parsed.embeddings.into_iter().next().ok_or_else(|| {
            EmbeddingError::GenerationError("Empty Ollama response".to_string())
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
        &self.model
    }
}
