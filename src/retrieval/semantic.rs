//! Cosine similarity between query and chunk embeddings

use crate::chunking::Chunk;
use crate::embedding::QueryEmbeddings;

/// `dot(a, b) / (|a| * |b|)`, accumulated in f64.
///
/// Zero-norm or mismatched vectors yield 0.0 and a logged diagnostic rather
/// than NaN.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        tracing::warn!(
            "Cosine similarity on vectors of different length ({} vs {})",
            a.len(),
            b.len()
        );
        return 0.0;
    }

    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        tracing::warn!("Cosine similarity with a zero-norm vector, scoring 0");
        return 0.0;
    }

    let similarity = dot / (norm_a.sqrt() * norm_b.sqrt());
    if similarity.is_finite() {
        similarity as f32
    } else {
        tracing::warn!("Non-finite cosine similarity, scoring 0");
        0.0
    }
}

/// Semantic score per chunk, in input order. Chunks without an embedding
/// score 0 and survive on their lexical score alone.
pub fn semantic_scores(chunks: &[Chunk], embeddings: &QueryEmbeddings) -> Vec<f32> {
    chunks
        .iter()
        .map(|chunk| match embeddings.get(&chunk.id) {
            Some(embedding) => cosine_similarity(&embeddings.query, embedding),
            None => 0.0,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::{chunk_text, ChunkOptions};
    use std::sync::Arc;

    #[test]
    fn test_self_similarity_is_one() {
        let v = [0.3, -1.7, 2.25, 8.0, 0.001];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_orthogonal_and_opposite() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert!((cosine_similarity(&[1.0, 2.0], &[-1.0, -2.0]) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_degenerate_vectors_score_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn test_missing_embeddings_score_zero() {
        let opts = ChunkOptions {
            max_chunk_size: 10,
            min_chunk_size: 1,
            overlap_size: 0,
            ..ChunkOptions::default()
        };
        let chunks = chunk_text("first one\n\nsecond one", "d", "d.txt", &opts).unwrap();

        let mut embeddings = QueryEmbeddings {
            query: vec![1.0, 0.0],
            ..QueryEmbeddings::default()
        };
        embeddings
            .chunks
            .insert("d_chunk_0".to_string(), Arc::new(vec![2.0, 0.0]));
        embeddings.failed.push("d_chunk_1".to_string());

        let scores = semantic_scores(&chunks, &embeddings);
        assert_eq!(scores.len(), 2);
        assert!((scores[0] - 1.0).abs() < 1e-6);
        assert_eq!(scores[1], 0.0);
    }
}
