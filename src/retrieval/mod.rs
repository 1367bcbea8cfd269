//! Hybrid retrieval and reranking
//!
//! Candidates are scored lexically (BM25 over the candidate set) and
//! semantically (cosine similarity against the query embedding), fused with a
//! linear weight, then reordered by diversity, recency and length preference.

mod bm25;
mod fusion;
mod hybrid;
mod reranker;
mod result;
mod semantic;

pub use bm25::{bm25_scores, tokenize};
pub use fusion::{fuse, FusionConfig, ScoreNormalization, DEFAULT_SEMANTIC_WEIGHT};
pub use hybrid::{validate_query, HybridOutcome, HybridSearcher};
pub use reranker::{
    diversity_scores, recency_score, rerank, LengthPreference, RerankOptions, Reranker,
};
pub use result::SearchResult;
pub use semantic::{cosine_similarity, semantic_scores};
