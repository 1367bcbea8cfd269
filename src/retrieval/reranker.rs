//! Diversity, recency and length reranking
//!
//! A single pass over the fused order; no global optimization. Reranking
//! never adds or removes results, it only overwrites `score` and re-sorts.

use super::SearchResult;
use crate::error::{RagError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Penalty per earlier result from the same document
pub const SAME_DOCUMENT_PENALTY: f32 = 0.3;

/// Cap on the accumulated diversity penalty
pub const MAX_DIVERSITY_PENALTY: f32 = 0.9;

/// Recency decay constant in days
pub const RECENCY_DECAY_DAYS: f32 = 30.0;

/// Recency score for chunks without an upload time
pub const NEUTRAL_RECENCY: f32 = 0.5;

/// Fixed weight of the length preference term
pub const LENGTH_WEIGHT: f32 = 0.1;

/// Preferred chunk length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LengthPreference {
    Short,
    #[default]
    Medium,
    Long,
}

impl LengthPreference {
    /// Score in (0, 1] for a chunk of `len` characters
    pub fn score(self, len: usize) -> f32 {
        let len = len as f32;
        match self {
            LengthPreference::Short => (-len / 200.0).exp(),
            LengthPreference::Long => (len / 500.0).min(1.0),
            LengthPreference::Medium => (-(len - 300.0).abs() / 200.0).exp(),
        }
    }
}

impl FromStr for LengthPreference {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "short" => Ok(LengthPreference::Short),
            "medium" => Ok(LengthPreference::Medium),
            "long" => Ok(LengthPreference::Long),
            other => Err(RagError::Config(format!(
                "Unknown length preference '{}', expected short, medium or long",
                other
            ))),
        }
    }
}

impl fmt::Display for LengthPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LengthPreference::Short => write!(f, "short"),
            LengthPreference::Medium => write!(f, "medium"),
            LengthPreference::Long => write!(f, "long"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RerankOptions {
    pub diversity_weight: f32,
    pub recency_weight: f32,
    pub length_preference: LengthPreference,
}

impl Default for RerankOptions {
    fn default() -> Self {
        Self {
            diversity_weight: 0.2,
            recency_weight: 0.1,
            length_preference: LengthPreference::Medium,
        }
    }
}

impl RerankOptions {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("diversity_weight", self.diversity_weight),
            ("recency_weight", self.recency_weight),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(RagError::Config(format!(
                    "{} must be between 0.0 and 1.0, got {}",
                    name, value
                )));
            }
        }
        if self.diversity_weight + self.recency_weight > 1.0 {
            return Err(RagError::Config(format!(
                "diversity_weight + recency_weight must not exceed 1.0, got {}",
                self.diversity_weight + self.recency_weight
            )));
        }
        Ok(())
    }
}

/// `1 - min(0.3 * earlier results from the same document, 0.9)` per result,
/// in input order
pub fn diversity_scores(results: &[SearchResult]) -> Vec<f32> {
    let mut seen: HashMap<&str, usize> = HashMap::new();
    results
        .iter()
        .map(|result| {
            let earlier = seen.entry(result.document_id()).or_insert(0);
            let penalty = (*earlier as f32 * SAME_DOCUMENT_PENALTY).min(MAX_DIVERSITY_PENALTY);
            *earlier += 1;
            1.0 - penalty
        })
        .collect()
}

/// `exp(-days_since_upload / 30)`; uploads in the future count as today
pub fn recency_score(uploaded_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f32 {
    match uploaded_at {
        Some(at) => {
            let days = (now - at).num_milliseconds() as f64 / 86_400_000.0;
            (-(days.max(0.0)) / f64::from(RECENCY_DECAY_DAYS)).exp() as f32
        }
        None => NEUTRAL_RECENCY,
    }
}

/// Reorders fused results by diversity, recency and length preference
#[derive(Debug, Clone, Default)]
pub struct Reranker {
    options: RerankOptions,
}

impl Reranker {
    pub fn new(options: RerankOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self { options })
    }

    pub fn options(&self) -> &RerankOptions {
        &self.options
    }

    pub fn rerank(&self, results: Vec<SearchResult>) -> Vec<SearchResult> {
        self.rerank_at(results, Utc::now())
    }

    /// Rerank relative to a fixed clock
    pub fn rerank_at(&self, mut results: Vec<SearchResult>, now: DateTime<Utc>) -> Vec<SearchResult> {
        let RerankOptions {
            diversity_weight,
            recency_weight,
            length_preference,
        } = self.options;
        let fused_weight = 1.0 - diversity_weight - recency_weight;

        let diversity = diversity_scores(&results);

        for (result, diversity_score) in results.iter_mut().zip(diversity) {
            let recency = recency_score(result.chunk.metadata.uploaded_at, now);
            let length = length_preference.score(result.chunk.len());

            result.score = result.score * fused_weight
                + diversity_score * diversity_weight
                + recency * recency_weight
                + length * LENGTH_WEIGHT;
        }

        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        results
    }
}

/// Rerank `results` with `options` against the current time
pub fn rerank(results: Vec<SearchResult>, options: &RerankOptions) -> Result<Vec<SearchResult>> {
    Ok(Reranker::new(options.clone())?.rerank(results))
}
