//! Concurrent embedding fetch for one query
use super::{EmbeddingCache, EmbeddingError, EmbeddingProvider};
use crate::chunking::Chunk;
use crate::error::{RagError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Timeout, retry and concurrency limits for provider calls
#[derive(Debug, Clone)]
pub struct FetchPolicy {
    /// Per-attempt timeout
    pub timeout: Duration,
    /// Extra attempts after the first failure
    pub max_retries: u32,
    /// Maximum provider calls in flight
    pub max_concurrent: usize,
    /// Delay before the first retry, doubled on each further retry
    pub retry_backoff: Duration,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 2,
            max_concurrent: 8,
            retry_backoff: Duration::from_millis(100),
        }
    }
}

/// Embeddings gathered for one query, keyed by chunk id
#[derive(Debug, Default)]
pub struct QueryEmbeddings {
    pub query: Vec<f32>,
    pub chunks: HashMap<String, Arc<Vec<f32>>>,
    /// Chunks whose embedding could not be obtained
    pub failed: Vec<String>,
}

impl QueryEmbeddings {
    pub fn get(&self, chunk_id: &str) -> Option<&[f32]> {
        self.chunks.get(chunk_id).map(|e| e.as_slice())
    }

    pub fn is_degraded(&self) -> bool {
        !self.failed.is_empty()
    }
}

#[derive(Debug)]
enum Target {
    Query,
    Chunk(String),
}

/// Fans embedding requests out to the provider and correlates the answers
/// back to chunks by id.
///
/// Dropping the future returned by [`EmbeddingFetcher::fetch`] aborts every
/// in-flight provider call; the cache only ever receives complete vectors.
pub struct EmbeddingFetcher {
    provider: Arc<dyn EmbeddingProvider>,
    cache: Option<Arc<EmbeddingCache>>,
    policy: FetchPolicy,
}

impl EmbeddingFetcher {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, policy: FetchPolicy) -> Self {
        Self {
            provider,
            cache: None,
            policy,
        }
    }

    /// Memoize chunk embeddings across queries
    pub fn with_cache(mut self, cache: Arc<EmbeddingCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.provider
    }

    pub fn cache(&self) -> Option<&Arc<EmbeddingCache>> {
        self.cache.as_ref()
    }

    /// Embed the query and every chunk lacking an embedding.
    ///
    /// Chunk failures, including vectors whose dimension differs from the
    /// query's, are recorded in [`QueryEmbeddings::failed`] and never fail the
    /// call. Only a failed query embedding returns
    /// [`RagError::EmbeddingProvider`].
    pub async fn fetch(&self, query: &str, chunks: &[Chunk]) -> Result<QueryEmbeddings> {
        let start = std::time::Instant::now();
        let model = self.provider.model_name().to_string();

        let mut resolved: HashMap<String, Arc<Vec<f32>>> = HashMap::new();
        let mut pending: HashMap<String, String> = HashMap::new();

        for chunk in chunks {
            if let Some(embedding) = &chunk.embedding {
                resolved.insert(chunk.id.clone(), Arc::new(embedding.clone()));
            } else if let Some(hit) = self.cache.as_ref().and_then(|c| c.get(&model, &chunk.text)) {
                resolved.insert(chunk.id.clone(), hit);
            } else {
                pending.insert(chunk.id.clone(), chunk.text.clone());
            }
        }

        debug!(
            "Fetching embeddings: {} pending, {} already available",
            pending.len(),
            resolved.len()
        );

        let semaphore = Arc::new(Semaphore::new(self.policy.max_concurrent.max(1)));
        let mut tasks: JoinSet<(Target, std::result::Result<Vec<f32>, EmbeddingError>)> =
            JoinSet::new();

        self.spawn(&mut tasks, &semaphore, Target::Query, query.to_string());
        for (chunk_id, text) in &pending {
            self.spawn(
                &mut tasks,
                &semaphore,
                Target::Chunk(chunk_id.clone()),
                text.clone(),
            );
        }

        let mut query_result: Option<std::result::Result<Vec<f32>, EmbeddingError>> = None;
        let mut fetched: HashMap<String, Vec<f32>> = HashMap::new();
        let mut failed: Vec<String> = Vec::new();

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((Target::Query, result)) => query_result = Some(result),
                Ok((Target::Chunk(chunk_id), Ok(embedding))) => {
                    fetched.insert(chunk_id, embedding);
                }
                Ok((Target::Chunk(chunk_id), Err(e))) => {
                    warn!("Embedding failed for chunk {}: {}", chunk_id, e);
                    failed.push(chunk_id);
                }
                Err(e) => warn!("Embedding task aborted: {}", e),
            }
        }

        let query_embedding = match query_result {
            Some(Ok(embedding)) => embedding,
            Some(Err(e)) => {
                return Err(RagError::EmbeddingProvider(format!(
                    "query embedding failed: {}",
                    e
                )))
            }
            None => {
                return Err(RagError::EmbeddingProvider(
                    "query embedding task did not complete".to_string(),
                ))
            }
        };

        // Anything neither fetched nor reported (aborted task) is a failure too
        for chunk_id in pending.keys() {
            if !fetched.contains_key(chunk_id) && !failed.contains(chunk_id) {
                failed.push(chunk_id.clone());
            }
        }

        let dimension = query_embedding.len();
        resolved.retain(|chunk_id, embedding| {
            let matches = embedding.len() == dimension;
            if !matches {
                warn!(
                    "Ignoring stored embedding for chunk {}: {}",
                    chunk_id,
                    EmbeddingError::DimensionMismatch {
                        expected: dimension,
                        actual: embedding.len(),
                    }
                );
                failed.push(chunk_id.clone());
            }
            matches
        });

        for (chunk_id, embedding) in fetched {
            if embedding.len() != dimension {
                warn!(
                    "Dropping embedding for chunk {}: {}",
                    chunk_id,
                    EmbeddingError::DimensionMismatch {
                        expected: dimension,
                        actual: embedding.len(),
                    }
                );
                failed.push(chunk_id);
                continue;
            }

            let embedding = Arc::new(embedding);
            if let (Some(cache), Some(text)) = (&self.cache, pending.get(&chunk_id)) {
                cache.insert(&model, text, Arc::clone(&embedding));
            }
            resolved.insert(chunk_id, embedding);
        }

        failed.sort();
        info!(
            "Embeddings ready: {} chunks, {} failed, {}ms",
            resolved.len(),
            failed.len(),
            start.elapsed().as_millis()
        );

        Ok(QueryEmbeddings {
            query: query_embedding,
            chunks: resolved,
            failed,
        })
    }

    fn spawn(
        &self,
        tasks: &mut JoinSet<(Target, std::result::Result<Vec<f32>, EmbeddingError>)>,
        semaphore: &Arc<Semaphore>,
        target: Target,
        text: String,
    ) {
        let provider = Arc::clone(&self.provider);
        let semaphore = Arc::clone(semaphore);
        let policy = self.policy.clone();

        tasks.spawn(async move {
            let result = match semaphore.acquire_owned().await {
                Ok(_permit) => embed_with_retry(provider.as_ref(), &text, &policy).await,
                Err(e) => Err(EmbeddingError::Unavailable(e.to_string())),
            };
            (target, result)
        });
    }
}

/// One provider call with timeout, retried while the error is retryable
async fn embed_with_retry(
    provider: &dyn EmbeddingProvider,
    text: &str,
    policy: &FetchPolicy,
) -> std::result::Result<Vec<f32>, EmbeddingError> {
    let mut attempt: u32 = 0;
    loop {
        let outcome = match tokio::time::timeout(policy.timeout, provider.embed(text)).await {
            Ok(result) => result,
            Err(_) => Err(EmbeddingError::Timeout(policy.timeout)),
        };

        match outcome {
            Ok(embedding) if embedding.is_empty() => {
                return Err(EmbeddingError::GenerationError(
                    "provider returned an empty vector".to_string(),
                ))
            }
            Ok(embedding) => return Ok(embedding),
            Err(e) if e.is_retryable() && attempt < policy.max_retries => {
                let delay = policy.retry_backoff * 2u32.saturating_pow(attempt);
                attempt += 1;
                debug!("Embedding attempt {} failed ({}), retrying in {:?}", attempt, e, delay);
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
