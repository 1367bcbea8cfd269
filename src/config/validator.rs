use crate::config::{parse_duration, Config, SCHEMA_VERSION};
use crate::error::{RagError, Result, ValidationError};

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration, reporting every violation at once
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);
        Self::validate_chunking(config, &mut errors);
        Self::validate_embedding(config, &mut errors);
        Self::validate_retrieval(config, &mut errors);
        Self::validate_rerank(config, &mut errors);
        Self::validate_citation(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(RagError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != SCHEMA_VERSION {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_chunking(config: &Config, errors: &mut Vec<ValidationError>) {
        let chunking = &config.chunking;

        if chunking.max_chunk_size == 0 {
            errors.push(ValidationError::new(
                "chunking.max_chunk_size",
                "Max chunk size must be greater than 0",
            ));
        }
        if chunking.min_chunk_size == 0 {
            errors.push(ValidationError::new(
                "chunking.min_chunk_size",
                "Min chunk size must be greater than 0",
            ));
        }
        if chunking.min_chunk_size > chunking.max_chunk_size {
            errors.push(ValidationError::new(
                "chunking.min_chunk_size",
                format!(
                    "Min chunk size ({}) exceeds max chunk size ({})",
                    chunking.min_chunk_size, chunking.max_chunk_size
                ),
            ));
        }
    }

    fn validate_embedding(config: &Config, errors: &mut Vec<ValidationError>) {
        let embedding = &config.embedding;

        let mode = &embedding.mode;
        if mode != "offline" && mode != "online" {
            errors.push(ValidationError::new(
                "embedding.mode",
                format!("Mode must be 'offline' or 'online', got '{}'", mode),
            ));
        }

        if embedding.model.trim().is_empty() {
            errors.push(ValidationError::new(
                "embedding.model",
                "Model name cannot be empty",
            ));
        }

        if mode == "online" && embedding.base_url.trim().is_empty() {
            errors.push(ValidationError::new(
                "embedding.base_url",
                "Base URL cannot be empty in online mode",
            ));
        }

        if embedding.dimension == 0 {
            errors.push(ValidationError::new(
                "embedding.dimension",
                "Dimension must be greater than 0",
            ));
        }

        match parse_duration(&embedding.timeout) {
            Some(d) if !d.is_zero() => {}
            _ => errors.push(ValidationError::new(
                "embedding.timeout",
                format!("Invalid duration format: {}", embedding.timeout),
            )),
        }

        if embedding.max_concurrent == 0 {
            errors.push(ValidationError::new(
                "embedding.max_concurrent",
                "Max concurrent requests must be greater than 0",
            ));
        }
    }

    fn validate_retrieval(config: &Config, errors: &mut Vec<ValidationError>) {
        let retrieval = &config.retrieval;

        if retrieval.top_k == 0 {
            errors.push(ValidationError::new(
                "retrieval.top_k",
                "top_k must be greater than 0",
            ));
        }

        Self::check_weight("retrieval.semantic_weight", retrieval.semantic_weight, errors);

        if retrieval.candidate_multiplier == 0 {
            errors.push(ValidationError::new(
                "retrieval.candidate_multiplier",
                "Candidate multiplier must be at least 1",
            ));
        }
    }

    fn validate_rerank(config: &Config, errors: &mut Vec<ValidationError>) {
        let rerank = &config.rerank;

        Self::check_weight("rerank.diversity_weight", rerank.diversity_weight, errors);
        Self::check_weight("rerank.recency_weight", rerank.recency_weight, errors);

        let total = rerank.diversity_weight + rerank.recency_weight;
        if total > 1.0 {
            errors.push(ValidationError::new(
                "rerank",
                format!(
                    "diversity_weight + recency_weight must not exceed 1.0, got {}",
                    total
                ),
            ));
        }
    }

    fn validate_citation(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.citation.excerpt_chars == 0 {
            errors.push(ValidationError::new(
                "citation.excerpt_chars",
                "Excerpt length must be greater than 0",
            ));
        }
    }

    fn check_weight(path: &str, value: f32, errors: &mut Vec<ValidationError>) {
        if !(0.0..=1.0).contains(&value) {
            errors.push(ValidationError::new(
                path,
                format!("Weight must be between 0.0 and 1.0, got {}", value),
            ));
        }
    }
}
