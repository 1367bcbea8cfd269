//! Hybrid search combining semantic and keyword search

use super::{bm25_scores, fuse, semantic_scores, FusionConfig, ScoreNormalization, SearchResult};
use crate::chunking::Chunk;
use crate::embedding::EmbeddingFetcher;
use crate::error::{RagError, Result};
use std::collections::HashMap;

/// Outcome of one hybrid search
#[derive(Debug, Default)]
pub struct HybridOutcome {
    /// Candidates sorted by fused score, descending
    pub results: Vec<SearchResult>,

    /// Chunks that fell back to keyword-only scoring because their embedding
    /// could not be obtained
    pub degraded: Vec<String>,
}

impl HybridOutcome {
    pub fn is_degraded(&self) -> bool {
        !self.degraded.is_empty()
    }
}

/// Reject empty or whitespace-only queries
pub fn validate_query(query: &str) -> Result<()> {
    if query.trim().is_empty() {
        return Err(RagError::MalformedQuery(
            "Query text cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Hybrid searcher combining semantic and keyword search
pub struct HybridSearcher {
    fetcher: EmbeddingFetcher,
    normalization: ScoreNormalization,
}

impl HybridSearcher {
    pub fn new(fetcher: EmbeddingFetcher) -> Self {
        Self {
            fetcher,
            normalization: ScoreNormalization::None,
        }
    }

    pub fn with_normalization(mut self, normalization: ScoreNormalization) -> Self {
        self.normalization = normalization;
        self
    }

    pub fn fetcher(&self) -> &EmbeddingFetcher {
        &self.fetcher
    }

    /// Score `chunks` against `query` and return the best `limit` candidates.
    ///
    /// BM25 runs while the embeddings are in flight. A `semantic_weight` of 0
    /// never contacts the embedding provider.
    pub async fn search(
        &self,
        query: &str,
        chunks: &[Chunk],
        limit: usize,
        semantic_weight: f32,
    ) -> Result<HybridOutcome> {
        validate_query(query)?;
        let config = FusionConfig::new(semantic_weight, self.normalization)?;

        if chunks.is_empty() {
            return Err(RagError::EmptyCorpus);
        }

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();

        let (embeddings, keyword) = if semantic_weight > 0.0 {
            let (embeddings, keyword) = tokio::join!(self.fetcher.fetch(query, chunks), async {
                bm25_scores(query, &texts)
            });
            (Some(embeddings?), keyword)
        } else {
            (None, bm25_scores(query, &texts))
        };

        let semantic = match &embeddings {
            Some(e) => semantic_scores(chunks, e),
            None => vec![0.0; chunks.len()],
        };

        let mut results = fuse(chunks, &semantic, &keyword, &config, limit);

        let degraded = match embeddings {
            Some(e) => {
                let by_id: HashMap<&str, &[f32]> =
                    e.chunks.iter().map(|(id, v)| (id.as_str(), v.as_slice())).collect();
                for result in &mut results {
                    result.embedding = by_id.get(result.chunk.id.as_str()).map(|v| v.to_vec());
                }
                e.failed
            }
            None => Vec::new(),
        };

        tracing::debug!(
            "Hybrid search over {} chunks kept {} (semantic_weight={}, degraded={})",
            chunks.len(),
            results.len(),
            semantic_weight,
            degraded.len()
        );

        Ok(HybridOutcome { results, degraded })
    }
}
