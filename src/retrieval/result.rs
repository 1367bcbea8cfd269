//! Scored search results

use crate::chunking::Chunk;
use serde::{Deserialize, Serialize};

/// A chunk with its lexical, semantic and combined scores for one query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub chunk: Chunk,

    /// Cosine similarity against the query (0 when no embedding was available)
    pub semantic_score: f32,

    /// BM25 score, only comparable within the same candidate set
    pub keyword_score: f32,

    /// Fused score, overwritten by reranking
    pub score: f32,

    /// Embedding used for the semantic score
    #[serde(skip_serializing, default)]
    pub embedding: Option<Vec<f32>>,
}

impl SearchResult {
    pub fn new(chunk: Chunk, semantic_score: f32, keyword_score: f32, score: f32) -> Self {
        Self {
            chunk,
            semantic_score,
            keyword_score,
            score,
            embedding: None,
        }
    }

    pub fn document_id(&self) -> &str {
        &self.chunk.document_id
    }

    /// Get a short preview of the text (first N characters)
    pub fn preview(&self, max_chars: usize) -> String {
        let text = &self.chunk.text;
        match text.char_indices().nth(max_chars) {
            Some((cut, _)) => format!("{}...", &text[..cut]),
            None => text.clone(),
        }
    }
}
