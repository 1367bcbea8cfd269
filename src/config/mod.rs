//! Configuration management for ragrank
//!
//! A single TOML file drives chunking, embedding, retrieval, reranking and
//! citation defaults. Values are layered: file, then named profile, then
//! `RAGRANK_<SECTION>__<KEY>` environment variables, then validation.

use crate::chunking::{ChunkOptions, SplitBy};
use crate::citation::{CitationFormat, DEFAULT_EXCERPT_CHARS};
use crate::embedding::DEFAULT_OLLAMA_URL;
use crate::error::{RagError, Result};
use crate::retrieval::{LengthPreference, RerankOptions, ScoreNormalization};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

mod validator;

pub use validator::ConfigValidator;

pub const SCHEMA_VERSION: &str = "1.0.0";

const ENV_PREFIX: &str = "RAGRANK_";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub rerank: RerankConfig,
    #[serde(default)]
    pub citation: CitationConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub profiles: HashMap<String, ProfileOverrides>,
}

/// Metadata about the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub schema_version: String,
    #[serde(default = "current_timestamp")]
    pub created_at: String,
    #[serde(default = "current_timestamp")]
    pub last_modified: String,
}

fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Chunker settings, sizes in characters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub max_chunk_size: usize,
    pub min_chunk_size: usize,
    pub overlap_size: usize,
    pub split_by: SplitBy,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        let options = ChunkOptions::default();
        Self {
            max_chunk_size: options.max_chunk_size,
            min_chunk_size: options.min_chunk_size,
            overlap_size: options.overlap_size,
            split_by: options.split_by,
        }
    }
}

impl ChunkingConfig {
    pub fn to_options(&self) -> ChunkOptions {
        ChunkOptions {
            max_chunk_size: self.max_chunk_size,
            min_chunk_size: self.min_chunk_size,
            overlap_size: self.overlap_size,
            split_by: self.split_by,
        }
    }
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub mode: String, // "offline" or "online"
    pub model: String,
    pub base_url: String,
    /// Expected vector length for the online provider
    pub dimension: usize,
    /// Per-call timeout as a duration string
    pub timeout: String,
    pub max_retries: u32,
    pub max_concurrent: usize,
    pub cache: bool,
    pub cache_max_entries: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            mode: "online".to_string(),
            model: "nomic-embed-text".to_string(),
            base_url: DEFAULT_OLLAMA_URL.to_string(),
            dimension: 768,
            timeout: "30s".to_string(),
            max_retries: 2,
            max_concurrent: 8,
            cache: true,
            cache_max_entries: 100_000,
        }
    }
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub semantic_weight: f32,
    /// Fusion keeps `top_k * candidate_multiplier` results for reranking
    pub candidate_multiplier: usize,
    pub normalization: ScoreNormalization,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            semantic_weight: 0.7,
            candidate_multiplier: 2,
            normalization: ScoreNormalization::None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RerankConfig {
    pub diversity_weight: f32,
    pub recency_weight: f32,
    pub length_preference: LengthPreference,
}

impl Default for RerankConfig {
    fn default() -> Self {
        let options = RerankOptions::default();
        Self {
            diversity_weight: options.diversity_weight,
            recency_weight: options.recency_weight,
            length_preference: options.length_preference,
        }
    }
}

impl RerankConfig {
    pub fn to_options(&self) -> RerankOptions {
        RerankOptions {
            diversity_weight: self.diversity_weight,
            recency_weight: self.recency_weight,
            length_preference: self.length_preference,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CitationConfig {
    pub format: CitationFormat,
    pub excerpt_chars: usize,
}

impl Default for CitationConfig {
    fn default() -> Self {
        Self {
            format: CitationFormat::Simple,
            excerpt_chars: DEFAULT_EXCERPT_CHARS,
        }
    }
}

/// Where the directory document store reads from
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub documents_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            documents_dir: PathBuf::from("~/.ragrank/documents"),
        }
    }
}

/// Profile-specific configuration overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub semantic_weight: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub citation_format: Option<CitationFormat>,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(RagError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| RagError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;
        let mut config: Config = toml::from_str(&content)?;

        config.apply_env_overrides();
        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Save configuration to a file, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| RagError::Io {
                source: e,
                context: format!("Failed to create config directory: {:?}", parent),
            })?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| RagError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Load configuration with a specific profile applied
    pub fn load_with_profile(path: &Path, profile: &str) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_profile(profile)?;
        ConfigValidator::validate(&config)?;
        Ok(config)
    }

    /// Apply a profile's overrides to the configuration
    pub fn apply_profile(&mut self, profile: &str) -> Result<()> {
        let overrides = self
            .profiles
            .get(profile)
            .cloned()
            .ok_or_else(|| RagError::Config(format!("Unknown profile: {}", profile)))?;

        if let Some(mode) = overrides.embedding_mode {
            self.embedding.mode = mode;
        }
        if let Some(model) = overrides.embedding_model {
            self.embedding.model = model;
        }
        if let Some(weight) = overrides.semantic_weight {
            self.retrieval.semantic_weight = weight;
        }
        if let Some(format) = overrides.citation_format {
            self.citation.format = format;
        }

        tracing::debug!("Applied config profile '{}'", profile);
        Ok(())
    }

    /// Apply environment variable overrides
    /// Environment variables in format: RAGRANK_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(std::env::vars());
    }

    fn apply_overrides(&mut self, vars: impl IntoIterator<Item = (String, String)>) {
        for (key, value) in vars {
            if let Some(config_key) = key.strip_prefix(ENV_PREFIX) {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        match path {
            "CHUNKING__MAX_CHUNK_SIZE" => self.chunking.max_chunk_size = parse_env(path, value)?,
            "CHUNKING__MIN_CHUNK_SIZE" => self.chunking.min_chunk_size = parse_env(path, value)?,
            "CHUNKING__OVERLAP_SIZE" => self.chunking.overlap_size = parse_env(path, value)?,
            "CHUNKING__SPLIT_BY" => self.chunking.split_by = value.parse()?,
            "EMBEDDING__MODE" => self.embedding.mode = value.to_string(),
            "EMBEDDING__MODEL" => self.embedding.model = value.to_string(),
            "EMBEDDING__BASE_URL" => self.embedding.base_url = value.to_string(),
            "EMBEDDING__DIMENSION" => self.embedding.dimension = parse_env(path, value)?,
            "EMBEDDING__TIMEOUT" => self.embedding.timeout = value.to_string(),
            "EMBEDDING__MAX_RETRIES" => self.embedding.max_retries = parse_env(path, value)?,
            "EMBEDDING__MAX_CONCURRENT" => self.embedding.max_concurrent = parse_env(path, value)?,
            "EMBEDDING__CACHE" => self.embedding.cache = parse_env(path, value)?,
            "RETRIEVAL__TOP_K" => self.retrieval.top_k = parse_env(path, value)?,
            "RETRIEVAL__SEMANTIC_WEIGHT" => {
                self.retrieval.semantic_weight = parse_env(path, value)?
            }
            "RETRIEVAL__CANDIDATE_MULTIPLIER" => {
                self.retrieval.candidate_multiplier = parse_env(path, value)?
            }
            "RETRIEVAL__NORMALIZATION" => self.retrieval.normalization = value.parse()?,
            "RERANK__DIVERSITY_WEIGHT" => self.rerank.diversity_weight = parse_env(path, value)?,
            "RERANK__RECENCY_WEIGHT" => self.rerank.recency_weight = parse_env(path, value)?,
            "RERANK__LENGTH_PREFERENCE" => self.rerank.length_preference = value.parse()?,
            "CITATION__FORMAT" => self.citation.format = value.parse()?,
            "CITATION__EXCERPT_CHARS" => self.citation.excerpt_chars = parse_env(path, value)?,
            "STORE__DOCUMENTS_DIR" => self.store.documents_dir = PathBuf::from(value),
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    pub fn chunk_options(&self) -> ChunkOptions {
        self.chunking.to_options()
    }

    pub fn rerank_options(&self) -> RerankOptions {
        self.rerank.to_options()
    }

    /// Documents directory with `~` expanded
    pub fn documents_dir(&self) -> PathBuf {
        expand_path(&self.store.documents_dir)
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| RagError::Config("Cannot determine config directory".to_string()))?;

        Ok(config_dir.join("ragrank").join("config.toml"))
    }

    /// Load from `path`, falling back to defaults when no file exists there
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Err(RagError::ConfigNotFound { .. }) => {
                tracing::debug!("No config at {:?}, using defaults", path);
                let mut config = Self::default();
                config.apply_env_overrides();
                ConfigValidator::validate(&config)?;
                Ok(config)
            }
            other => other,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            meta: MetaConfig {
                schema_version: SCHEMA_VERSION.to_string(),
                created_at: current_timestamp(),
                last_modified: current_timestamp(),
            },
            chunking: ChunkingConfig::default(),
            embedding: EmbeddingConfig::default(),
            retrieval: RetrievalConfig::default(),
            rerank: RerankConfig::default(),
            citation: CitationConfig::default(),
            store: StoreConfig::default(),
            profiles: HashMap::new(),
        }
    }
}

fn parse_env<T: FromStr>(path: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| RagError::InvalidConfigValue {
        path: path.to_string(),
        message: format!("Cannot parse '{}'", value),
    })
}

/// Parse duration strings such as "500ms", "30s", "5m", "1h". Plain digits
/// are seconds.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    let (digits, millis_per_unit) = if let Some(n) = s.strip_suffix("ms") {
        (n, 1)
    } else if let Some(n) = s.strip_suffix('s') {
        (n, 1_000)
    } else if let Some(n) = s.strip_suffix('m') {
        (n, 60_000)
    } else if let Some(n) = s.strip_suffix('h') {
        (n, 3_600_000)
    } else {
        (s, 1_000)
    };

    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let value: u64 = digits.parse().ok()?;
    value.checked_mul(millis_per_unit).map(Duration::from_millis)
}

/// Expand a leading `~` to the home directory
pub fn expand_path(path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}
