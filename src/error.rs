use std::path::PathBuf;
use thiserror::Error;

/// Main error type for ragrank
#[derive(Error, Debug)]
pub enum RagError {
    /// Configuration related errors (invalid chunking or rerank parameters)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration validation errors
    #[error("Configuration validation failed: {errors:?}")]
    ConfigValidation { errors: Vec<ValidationError> },

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Invalid configuration value
    #[error("Invalid configuration value at {path}: {message}")]
    InvalidConfigValue { path: String, message: String },

    /// The embedding provider is unreachable for the whole query
    #[error("Embedding provider error: {0}")]
    EmbeddingProvider(String),

    /// No chunks are available to search
    #[error("No documents available to search")]
    EmptyCorpus,

    /// Empty or whitespace-only query
    #[error("Malformed query: {0}")]
    MalformedQuery(String),

    /// Document store failures
    #[error("Document store error: {0}")]
    DocumentStore(String),

    /// IO errors
    #[error("IO error: {context}: {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },

    /// TOML deserialization errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),

    /// JSON errors
    #[error("JSON error: {context}: {source}")]
    Json {
        source: serde_json::Error,
        context: String,
    },
}

impl RagError {
    /// True for errors raised before any retrieval work started
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            RagError::Config(_)
                | RagError::ConfigValidation { .. }
                | RagError::ConfigNotFound { .. }
                | RagError::InvalidConfigValue { .. }
        )
    }
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Path to the configuration key that failed validation
    pub path: String,
    /// Error message describing the validation failure
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result type for ragrank operations
pub type Result<T> = std::result::Result<T, RagError>;
