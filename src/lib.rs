//! ragrank - hybrid retrieval and ranking for retrieval-augmented generation
//!
//! Documents are split into chunks, scored against a query with BM25 and
//! embedding cosine similarity, fused, reranked for diversity, recency and
//! length, and returned as numbered context with attributed citations.

pub mod chunking;
pub mod citation;
pub mod cli;
pub mod config;
pub mod documents;
pub mod embedding;
pub mod error;
pub mod pipeline;
pub mod retrieval;

pub use error::{RagError, Result};
