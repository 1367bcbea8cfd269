//! Query pipeline
//!
//! Composes the retrieval stages for one request: documents from the store,
//! chunking (cached per document), hybrid search, reranking, citations and
//! context assembly. Every collaborator is owned by the pipeline instance;
//! there is no process-wide state.

use crate::chunking::{Chunk, ChunkCache, ChunkOptions};
use crate::citation::{
    build_context, generate_citations_with_excerpt, Citation, CitationFormat,
    DEFAULT_EXCERPT_CHARS,
};
use crate::config::Config;
use crate::documents::DocumentStore;
use crate::embedding::{fetcher_from_config, EmbeddingProvider};
use crate::error::{RagError, Result};
use crate::retrieval::{validate_query, HybridSearcher, RerankOptions, Reranker, SearchResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

pub const NO_DOCUMENTS_MESSAGE: &str = "No documents found for this agent";
pub const NO_CHUNKS_MESSAGE: &str = "No content available to search for this agent";

fn default_top_k() -> usize {
    5
}

fn default_semantic_weight() -> f32 {
    crate::retrieval::DEFAULT_SEMANTIC_WEIGHT
}

/// One retrieval request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub query: String,
    pub agent_id: String,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_semantic_weight")]
    pub semantic_weight: f32,
    #[serde(default)]
    pub citation_format: CitationFormat,
    #[serde(default)]
    pub rerank_options: RerankOptions,
}

impl QueryRequest {
    pub fn new(query: impl Into<String>, agent_id: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            agent_id: agent_id.into(),
            top_k: default_top_k(),
            semantic_weight: default_semantic_weight(),
            citation_format: CitationFormat::default(),
            rerank_options: RerankOptions::default(),
        }
    }

    /// Request carrying the configured retrieval, rerank and citation defaults
    pub fn from_config(
        config: &Config,
        query: impl Into<String>,
        agent_id: impl Into<String>,
    ) -> Self {
        Self {
            top_k: config.retrieval.top_k,
            semantic_weight: config.retrieval.semantic_weight,
            citation_format: config.citation.format,
            rerank_options: config.rerank_options(),
            ..Self::new(query, agent_id)
        }
    }

    pub fn top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn semantic_weight(mut self, weight: f32) -> Self {
        self.semantic_weight = weight;
        self
    }

    pub fn citation_format(mut self, format: CitationFormat) -> Self {
        self.citation_format = format;
        self
    }

    pub fn rerank_options(mut self, options: RerankOptions) -> Self {
        self.rerank_options = options;
        self
    }
}

/// Candidate counts at each pipeline stage
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryStats {
    pub total_documents: usize,
    pub total_chunks: usize,
    pub searched_chunks: usize,
    pub returned_chunks: usize,
    pub degraded_chunks: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    /// Numbered chunk texts, `"[1] ...\n\n[2] ..."`
    pub context: String,
    pub citations: Vec<Citation>,
    pub chunks: Vec<SearchResult>,
    pub stats: QueryStats,
    /// Some chunks were ranked without a semantic score
    pub degraded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl QueryResponse {
    fn empty(stats: QueryStats, message: &str) -> Self {
        Self {
            stats,
            message: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// Retrieval pipeline for one document store and embedding provider
pub struct RagPipeline {
    store: Arc<dyn DocumentStore>,
    searcher: HybridSearcher,
    chunk_cache: ChunkCache,
    chunk_options: ChunkOptions,
    candidate_multiplier: usize,
    excerpt_chars: usize,
}

impl RagPipeline {
    pub fn new(store: Arc<dyn DocumentStore>, searcher: HybridSearcher) -> Self {
        Self {
            store,
            searcher,
            chunk_cache: ChunkCache::new(),
            chunk_options: ChunkOptions::default(),
            candidate_multiplier: 2,
            excerpt_chars: DEFAULT_EXCERPT_CHARS,
        }
    }

    /// Wire a pipeline from configuration
    pub fn from_config(
        config: &Config,
        store: Arc<dyn DocumentStore>,
        provider: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        let options = config.chunk_options();
        options.validate()?;

        let fetcher = fetcher_from_config(&config.embedding, provider)?;
        let searcher = HybridSearcher::new(fetcher).with_normalization(config.retrieval.normalization);

        Ok(Self::new(store, searcher)
            .with_chunk_options(options)
            .with_candidate_multiplier(config.retrieval.candidate_multiplier)
            .with_excerpt_chars(config.citation.excerpt_chars))
    }

    pub fn with_chunk_options(mut self, options: ChunkOptions) -> Self {
        self.chunk_options = options;
        self
    }

    pub fn with_candidate_multiplier(mut self, multiplier: usize) -> Self {
        self.candidate_multiplier = multiplier.max(1);
        self
    }

    pub fn with_excerpt_chars(mut self, excerpt_chars: usize) -> Self {
        self.excerpt_chars = excerpt_chars;
        self
    }

    pub fn chunk_cache(&self) -> &ChunkCache {
        &self.chunk_cache
    }

    /// Chunk every document the agent owns, evicting cached chunks of
    /// documents the store no longer lists
    pub async fn agent_chunks(&self, agent_id: &str) -> Result<(usize, Vec<Chunk>)> {
        let documents = self.store.list_documents(agent_id).await?;

        let live: HashSet<&str> = documents.iter().map(|d| d.id.as_str()).collect();
        self.chunk_cache.retain_documents(agent_id, &live);

        let mut chunks = Vec::new();
        for document in &documents {
            let cached = self
                .chunk_cache
                .get_or_chunk(agent_id, document, &self.chunk_options)?;
            chunks.extend(cached.iter().cloned());
        }

        Ok((documents.len(), chunks))
    }

    /// Run one query end to end
    pub async fn query(&self, request: &QueryRequest) -> Result<QueryResponse> {
        validate_query(&request.query)?;
        if request.top_k == 0 {
            return Err(RagError::Config("top_k must be greater than 0".to_string()));
        }
        let reranker = Reranker::new(request.rerank_options.clone())?;

        let (total_documents, chunks) = self.agent_chunks(&request.agent_id).await?;
        let mut stats = QueryStats {
            total_documents,
            total_chunks: chunks.len(),
            ..QueryStats::default()
        };

        if total_documents == 0 {
            info!("No documents for agent {}", request.agent_id);
            return Ok(QueryResponse::empty(stats, NO_DOCUMENTS_MESSAGE));
        }

        let limit = request.top_k.saturating_mul(self.candidate_multiplier);
        let outcome = match self
            .searcher
            .search(&request.query, &chunks, limit, request.semantic_weight)
            .await
        {
            Ok(outcome) => outcome,
            Err(RagError::EmptyCorpus) => {
                info!("Agent {} has documents but no chunks", request.agent_id);
                return Ok(QueryResponse::empty(stats, NO_CHUNKS_MESSAGE));
            }
            Err(e) => return Err(e),
        };

        stats.searched_chunks = outcome.results.len();
        stats.degraded_chunks = outcome.degraded.len();

        let mut ranked = reranker.rerank(outcome.results);
        ranked.truncate(request.top_k);
        stats.returned_chunks = ranked.len();

        let warning = if outcome.degraded.is_empty() {
            None
        } else {
            let message = format!(
                "{} of {} chunks were ranked without semantic scores: {}",
                outcome.degraded.len(),
                stats.total_chunks,
                outcome.degraded.join(", ")
            );
            warn!("{}", message);
            Some(message)
        };

        let citations =
            generate_citations_with_excerpt(&ranked, request.citation_format, self.excerpt_chars);
        let context = build_context(&ranked);

        info!(
            "Query for agent {}: {} documents, {} chunks, {} searched, {} returned",
            request.agent_id,
            stats.total_documents,
            stats.total_chunks,
            stats.searched_chunks,
            stats.returned_chunks
        );

        Ok(QueryResponse {
            context,
            citations,
            chunks: ranked,
            stats,
            degraded: warning.is_some(),
            warning,
            message: None,
        })
    }
}
