//! BM25 lexical scoring over a candidate set
//!
//! Statistics (document frequency, average length) are computed over the
//! candidates passed in, not over a global corpus, so scores are only
//! meaningful for ranking within one call.

use ahash::{HashMap, HashMapExt};
use regex::Regex;
use std::sync::OnceLock;

/// Term frequency saturation
pub const K1: f64 = 1.5;

/// Length normalization
pub const B: f64 = 0.75;

/// Tokens this short or shorter are discarded
const MIN_TOKEN_CHARS: usize = 2;

fn non_word() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\w\s]").expect("valid non-word regex"))
}

/// Lowercase, replace non-word characters with spaces, split on whitespace
/// and drop tokens of two characters or fewer
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    non_word()
        .replace_all(&lowered, " ")
        .split_whitespace()
        .filter(|t| t.chars().count() > MIN_TOKEN_CHARS)
        .map(str::to_string)
        .collect()
}

/// Score every document against `query`, returning one score per document in
/// input order. An empty candidate set yields an empty vector.
pub fn bm25_scores<T: AsRef<str>>(query: &str, documents: &[T]) -> Vec<f32> {
    if documents.is_empty() {
        return Vec::new();
    }

    let query_terms = tokenize(query);
    let docs: Vec<Vec<String>> = documents.iter().map(|d| tokenize(d.as_ref())).collect();

    let term_counts: Vec<HashMap<&str, usize>> = docs
        .iter()
        .map(|tokens| {
            let mut counts = HashMap::new();
            for token in tokens {
                *counts.entry(token.as_str()).or_insert(0) += 1;
            }
            counts
        })
        .collect();

    let n = docs.len() as f64;
    let avg_doc_length = docs.iter().map(Vec::len).sum::<usize>() as f64 / n;

    let mut idf: HashMap<&str, f64> = HashMap::new();
    for term in &query_terms {
        idf.entry(term.as_str()).or_insert_with(|| {
            let df = term_counts
                .iter()
                .filter(|counts| counts.contains_key(term.as_str()))
                .count() as f64;
            ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
        });
    }

    docs.iter()
        .zip(&term_counts)
        .map(|(tokens, counts)| {
            if avg_doc_length == 0.0 {
                return 0.0;
            }
            let length_ratio = tokens.len() as f64 / avg_doc_length;

            query_terms
                .iter()
                .map(|term| {
                    let tf = counts.get(term.as_str()).copied().unwrap_or(0) as f64;
                    let numerator = tf * (K1 + 1.0);
                    let denominator = tf + K1 * (1.0 - B + B * length_ratio);
                    idf.get(term.as_str()).copied().unwrap_or(0.0) * numerator / denominator
                })
                .sum::<f64>() as f32
        })
        .collect()
}
