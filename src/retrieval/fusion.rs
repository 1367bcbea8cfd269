//! Linear fusion of semantic and keyword scores

use super::SearchResult;
use crate::chunking::Chunk;
use crate::error::{RagError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_SEMANTIC_WEIGHT: f32 = 0.7;

/// How the two signals are scaled before weighting
///
/// BM25 is unbounded while cosine similarity lives in [-1, 1]. `None` fuses
/// the raw values; `MinMax` rescales each signal to [0, 1] across the
/// candidate set first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreNormalization {
    #[default]
    None,
    MinMax,
}

impl FromStr for ScoreNormalization {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(ScoreNormalization::None),
            "min_max" | "minmax" => Ok(ScoreNormalization::MinMax),
            other => Err(RagError::Config(format!(
                "Unknown normalization '{}', expected 'none' or 'min_max'",
                other
            ))),
        }
    }
}

impl fmt::Display for ScoreNormalization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScoreNormalization::None => write!(f, "none"),
            ScoreNormalization::MinMax => write!(f, "min_max"),
        }
    }
}

/// Configuration for fusion
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionConfig {
    /// Weight for semantic scores; keyword scores get `1 - semantic_weight`
    pub semantic_weight: f32,

    pub normalization: ScoreNormalization,
}

impl FusionConfig {
    pub fn new(semantic_weight: f32, normalization: ScoreNormalization) -> Result<Self> {
        if !(0.0..=1.0).contains(&semantic_weight) {
            return Err(RagError::Config(format!(
                "semantic_weight must be between 0.0 and 1.0, got {}",
                semantic_weight
            )));
        }

        Ok(Self {
            semantic_weight,
            normalization,
        })
    }

    pub fn keyword_weight(&self) -> f32 {
        1.0 - self.semantic_weight
    }
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            semantic_weight: DEFAULT_SEMANTIC_WEIGHT,
            normalization: ScoreNormalization::None,
        }
    }
}

fn min_max(scores: &[f32]) -> Vec<f32> {
    let min = scores.iter().copied().fold(f32::INFINITY, f32::min);
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let range = max - min;

    if !range.is_finite() || range <= 0.0 {
        return vec![0.0; scores.len()];
    }
    scores.iter().map(|s| (s - min) / range).collect()
}

/// Combine per-chunk scores into results sorted by fused score descending,
/// keeping at most `limit`.
///
/// `semantic` and `keyword` are parallel to `chunks`. Result scores keep the
/// raw signal values; only the fused `score` reflects normalization.
pub fn fuse(
    chunks: &[Chunk],
    semantic: &[f32],
    keyword: &[f32],
    config: &FusionConfig,
    limit: usize,
) -> Vec<SearchResult> {
    let (semantic_input, keyword_input) = match config.normalization {
        ScoreNormalization::None => (semantic.to_vec(), keyword.to_vec()),
        ScoreNormalization::MinMax => (min_max(semantic), min_max(keyword)),
    };

    let mut results: Vec<SearchResult> = chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            let s = semantic_input.get(i).copied().unwrap_or(0.0);
            let k = keyword_input.get(i).copied().unwrap_or(0.0);
            let fused = s * config.semantic_weight + k * config.keyword_weight();

            SearchResult::new(
                chunk.clone(),
                semantic.get(i).copied().unwrap_or(0.0),
                keyword.get(i).copied().unwrap_or(0.0),
                fused,
            )
        })
        .collect();

    // Stable sort keeps input order among ties
    results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    results.truncate(limit);

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::{chunk_text, ChunkOptions};

    fn chunks(n: usize) -> Vec<Chunk> {
        let text: Vec<String> = (0..n).map(|i| format!("paragraph number {}", i)).collect();
        let opts = ChunkOptions {
            max_chunk_size: 20,
            min_chunk_size: 1,
            overlap_size: 0,
            ..ChunkOptions::default()
        };
        chunk_text(&text.join("\n\n"), "d", "d.txt", &opts).unwrap()
    }

    fn order(results: &[SearchResult]) -> Vec<usize> {
        results.iter().map(|r| r.chunk.chunk_index).collect()
    }

    #[test]
    fn test_weighted_sum() {
        let config = FusionConfig::new(0.7, ScoreNormalization::None).unwrap();
        let results = fuse(&chunks(2), &[0.5, 0.9], &[2.0, 0.0], &config, 10);

        // 0.5*0.7 + 2.0*0.3 = 0.95 beats 0.9*0.7 = 0.63
        assert_eq!(order(&results), vec![0, 1]);
        assert!((results[0].score - 0.95).abs() < 1e-6);
        assert_eq!(results[0].keyword_score, 2.0);
    }

    #[test]
    fn test_extreme_weights_follow_single_signal() {
        let c = chunks(4);
        let semantic = [0.1, 0.9, 0.5, 0.3];
        let keyword = [3.0, 0.0, 1.0, 7.0];

        let semantic_only = FusionConfig::new(1.0, ScoreNormalization::None).unwrap();
        assert_eq!(order(&fuse(&c, &semantic, &keyword, &semantic_only, 4)), vec![1, 2, 3, 0]);

        let keyword_only = FusionConfig::new(0.0, ScoreNormalization::None).unwrap();
        assert_eq!(order(&fuse(&c, &semantic, &keyword, &keyword_only, 4)), vec![3, 0, 2, 1]);
    }

    #[test]
    fn test_limit_truncates() {
        let c = chunks(5);
        let results = fuse(&c, &[0.0; 5], &[0.0; 5], &FusionConfig::default(), 2);
        assert_eq!(order(&results), vec![0, 1]);
    }

    #[test]
    fn test_min_max_mode_rescales_signals() {
        let c = chunks(2);
        // Raw BM25 dominates without normalization
        let raw = FusionConfig::new(0.7, ScoreNormalization::None).unwrap();
        assert_eq!(order(&fuse(&c, &[0.2, 0.9], &[10.0, 8.0], &raw, 2)), vec![0, 1]);

        // Rescaled, the semantic weight decides
        let scaled = FusionConfig::new(0.7, ScoreNormalization::MinMax).unwrap();
        let results = fuse(&c, &[0.2, 0.9], &[10.0, 8.0], &scaled, 2);
        assert_eq!(order(&results), vec![1, 0]);
        assert!((results[0].score - 0.7).abs() < 1e-6);
        assert_eq!(results[0].semantic_score, 0.9);
    }

    #[test]
    fn test_invalid_weight_rejected() {
        assert!(FusionConfig::new(1.5, ScoreNormalization::None).is_err());
        assert!(FusionConfig::new(-0.1, ScoreNormalization::None).is_err());
        assert!("min_max".parse::<ScoreNormalization>().is_ok());
        assert!("zscore".parse::<ScoreNormalization>().is_err());
    }
}
