//! Configuration management
//!
//! One TOML file drives the whole engine. Values load in three layers:
//! file, named profile overrides, then `SCOLIA_SECTION__KEY` environment
//! variables. Validation collects every problem instead of stopping at the
//! first.

use crate::error::{Result, ScoliaError};
use crate::router::{CanonicalTarget, SignalWeights};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

mod validator;

pub use validator::ConfigValidator;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(rename = "_meta", default)]
    pub meta: MetaConfig,
    #[serde(default)]
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub indexing: IndexingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub router: RouterConfig,
    #[serde(default)]
    pub rewriter: RewriterConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub profiles: HashMap<String, ProfileOverrides>,
}

/// Metadata about the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub schema_version: String,
}

impl Default for MetaConfig {
    fn default() -> Self {
        Self {
            schema_version: "1.0.0".to_string(),
        }
    }
}

/// Corpus catalog and index locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusConfig {
    /// JSON-lines chunk catalog, one chunk per line
    pub catalog_file: PathBuf,
    /// Directory holding the lexical index
    pub index_dir: PathBuf,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        let data_dir = PathBuf::from("~/.scolia");
        Self {
            catalog_file: data_dir.join("catalog.jsonl"),
            index_dir: data_dir.join("index"),
        }
    }
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub model: String,
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "multilingual-e5-small".to_string(),
            batch_size: 32,
        }
    }
}

/// HNSW indexing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingConfig {
    pub vector_dim: usize,
    pub hnsw_ef_construction: usize,
    pub hnsw_m: usize,
    pub hnsw_ef_search: usize,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            vector_dim: 384,
            hnsw_ef_construction: 200,
            hnsw_m: 16,
            hnsw_ef_search: 50,
        }
    }
}

/// Hybrid retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Candidates fetched per source, as a multiple of the requested k
    pub candidate_multiplier: usize,
    /// RRF K constant
    pub rrf_k: f32,
    /// Lexical weight for queries with technical markers
    pub technical_lexical_weight: f32,
    /// Lexical weight for open questions
    pub default_lexical_weight: f32,
    /// Whether to load the cross-encoder at startup
    pub enable_reranking: bool,
    /// Cross-encoder model name
    pub reranker_model: String,
    /// How many fusion candidates go through the reranker
    pub rerank_candidates: usize,
    /// Reranker budget before the step is skipped
    pub rerank_timeout_ms: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            candidate_multiplier: 4,
            rrf_k: 60.0,
            technical_lexical_weight: 0.7,
            default_lexical_weight: 0.3,
            enable_reranking: false,
            reranker_model: "bge-reranker-base".to_string(),
            rerank_candidates: 20,
            rerank_timeout_ms: 2000,
        }
    }
}

/// Router configuration
///
/// The weights and thresholds are tuned values; treat them as defaults to
/// revisit against a golden question set, not as constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    pub weights: SignalWeights,
    /// Combined score at or above which the turn retrieves
    pub retrieve_threshold: f32,
    /// Similarity below which the weak-probe penalty applies
    pub weak_probe_threshold: f32,
    /// Penalty for a weak probe
    pub weak_probe_penalty: f32,
    /// Reduced penalty when the structure signal already fired
    pub weak_probe_penalty_structured: f32,
    /// Probe retrieval size
    pub probe_k: usize,
    /// Extra canonical routes, appended to the built-in table
    #[serde(default)]
    pub canonical: Vec<CanonicalTarget>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            weights: SignalWeights::default(),
            retrieve_threshold: 0.5,
            weak_probe_threshold: 0.25,
            weak_probe_penalty: 0.20,
            weak_probe_penalty_structured: 0.10,
            probe_k: 3,
            canonical: Vec::new(),
        }
    }
}

/// Query rewriter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewriterConfig {
    /// Budget for the reformulation call before falling back to identity
    pub timeout_ms: u64,
    /// History turns included in the reformulation prompt (1 or 2)
    pub context_turns: usize,
}

impl Default for RewriterConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 4000,
            context_turns: 2,
        }
    }
}

/// Session memory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Maximum remembered turns per chat
    pub history_cap: usize,
    /// Default auto-link setting for new sessions
    pub auto_link: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            history_cap: 5,
            auto_link: true,
        }
    }
}

/// Pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Passages requested per retrieval
    pub retrieval_k: usize,
    /// History summary length, in characters
    pub summary_chars: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            retrieval_k: 6,
            summary_chars: 200,
        }
    }
}

/// Profile-specific configuration overrides
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProfileOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_reranking: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retrieve_threshold: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retrieval_k: Option<usize>,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ScoliaError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| ScoliaError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;
        let mut config: Config = toml::from_str(&content)?;

        config.apply_env_overrides();
        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| ScoliaError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Load configuration with a specific profile applied
    pub fn load_with_profile(path: &Path, profile: &str) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_profile(profile)?;
        Ok(config)
    }

    /// Apply a profile's overrides to the configuration
    pub fn apply_profile(&mut self, profile: &str) -> Result<()> {
        let Some(overrides) = self.profiles.get(profile).cloned() else {
            return Err(ScoliaError::Config(format!("Unknown profile: {}", profile)));
        };

        if let Some(model) = overrides.embedding_model {
            self.embedding.model = model;
        }
        if let Some(enabled) = overrides.enable_reranking {
            self.retrieval.enable_reranking = enabled;
        }
        if let Some(threshold) = overrides.retrieve_threshold {
            self.router.retrieve_threshold = threshold;
        }
        if let Some(k) = overrides.retrieval_k {
            self.pipeline.retrieval_k = k;
        }

        Ok(())
    }

    /// Apply environment variable overrides
    /// Environment variables in format: SCOLIA_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        for (key, value) in std::env::vars() {
            if let Some(config_key) = key.strip_prefix("SCOLIA_") {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        let invalid = |message: String| ScoliaError::InvalidConfigValue {
            path: path.to_string(),
            message,
        };

        match path {
            "CORPUS__CATALOG_FILE" => {
                self.corpus.catalog_file = PathBuf::from(value);
            }
            "CORPUS__INDEX_DIR" => {
                self.corpus.index_dir = PathBuf::from(value);
            }
            "EMBEDDING__MODEL" => {
                self.embedding.model = value.to_string();
            }
            "RETRIEVAL__ENABLE_RERANKING" => {
                self.retrieval.enable_reranking = value
                    .parse()
                    .map_err(|_| invalid(format!("Cannot parse '{}' as boolean", value)))?;
            }
            "ROUTER__RETRIEVE_THRESHOLD" => {
                self.router.retrieve_threshold = value
                    .parse()
                    .map_err(|_| invalid(format!("Cannot parse '{}' as float", value)))?;
            }
            "PIPELINE__RETRIEVAL_K" => {
                self.pipeline.retrieval_k = value
                    .parse()
                    .map_err(|_| invalid(format!("Cannot parse '{}' as integer", value)))?;
            }
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| ScoliaError::Config("Cannot determine config directory".to_string()))?;

        Ok(config_dir.join("scolia").join("config.toml"))
    }

    /// Get the default data directory
    pub fn default_data_dir() -> Result<PathBuf> {
        let home_dir = dirs::home_dir()
            .ok_or_else(|| ScoliaError::Config("Cannot determine home directory".to_string()))?;

        Ok(home_dir.join(".scolia"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validates() {
        let config = Config::default();
        assert!(ConfigValidator::validate(&config).is_ok());
    }

    #[test]
    fn test_roundtrip_through_toml() {
        let config = Config::default();
        let serialized = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(parsed.router.retrieve_threshold, config.router.retrieve_threshold);
        assert_eq!(parsed.pipeline.retrieval_k, config.pipeline.retrieval_k);
    }

    #[test]
    fn test_unknown_profile_is_an_error() {
        let mut config = Config::default();
        assert!(config.apply_profile("missing").is_err());
    }

    #[test]
    fn test_profile_overrides() {
        let mut config = Config::default();
        config.profiles.insert(
            "exam".to_string(),
            ProfileOverrides {
                enable_reranking: Some(true),
                retrieval_k: Some(10),
                ..ProfileOverrides::default()
            },
        );

        config.apply_profile("exam").unwrap();
        assert!(config.retrieval.enable_reranking);
        assert_eq!(config.pipeline.retrieval_k, 10);
    }
}
