//! Configuration management for assayer
//!
//! Handles loading, saving, and validating configuration from TOML files.
//! Every tunable threshold and composite weight lives here so the scorers
//! can be re-tuned without code changes.

mod defaults;

pub use defaults::*;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Workspace partition all records are read/written under
    #[serde(default = "default_workspace")]
    pub workspace: String,

    /// Classification provider configuration
    #[serde(default)]
    pub classification: ClassificationConfig,

    /// Embedding provider configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Quality score weights
    #[serde(default)]
    pub weights: ScoreWeights,

    /// Quality status thresholds
    #[serde(default)]
    pub quality: QualityConfig,

    /// Boundary analysis configuration
    #[serde(default)]
    pub boundary: BoundaryConfig,

    /// Embedding stability configuration
    #[serde(default)]
    pub stability: StabilityConfig,

    /// Relationship graph configuration
    #[serde(default)]
    pub graph: GraphConfig,

    /// Retrieval evaluation thresholds
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Concurrency limits for external calls
    #[serde(default)]
    pub concurrency: ConcurrencyConfig,

    /// Paths configuration (internal, not user-editable)
    #[serde(skip)]
    pub paths: PathsConfig,
}

/// Classification provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationConfig {
    /// Backend URL for the HTTP classification service
    #[serde(default = "default_classification_backend_url")]
    pub backend_url: String,

    /// Model identifier passed to the backend
    #[serde(default = "default_classification_model")]
    pub model: String,

    /// Request timeout in seconds
    #[serde(default = "default_provider_timeout_secs")]
    pub timeout_secs: u64,

    /// Retry attempts per request
    #[serde(default = "default_provider_retries")]
    pub retries: usize,

    /// Use the local keyword classifier when remote providers are exhausted
    #[serde(default = "default_keyword_fallback")]
    pub keyword_fallback: bool,

    /// Circuit breaker settings for this provider
    #[serde(default)]
    pub breaker: BreakerConfig,
}

/// Embedding provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Backend URL for the HTTP embedding service
    #[serde(default = "default_embedding_backend_url")]
    pub backend_url: String,

    /// Model name/identifier
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Embedding dimension (must match model)
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// Batch size for embedding calls
    #[serde(default = "default_provider_batch_size")]
    pub batch_size: usize,

    /// Request timeout in seconds
    #[serde(default = "default_provider_timeout_secs")]
    pub timeout_secs: u64,

    /// Retry attempts per request
    #[serde(default = "default_provider_retries")]
    pub retries: usize,

    /// Use embeddings to double-check lexically unsupported response
    /// sentences during response evaluation
    #[serde(default = "default_semantic_check")]
    pub semantic_check: bool,

    /// Circuit breaker settings for this provider
    #[serde(default)]
    pub breaker: BreakerConfig,
}

/// Circuit breaker settings shared by provider chains
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerConfig {
    /// Consecutive failures before the circuit opens
    #[serde(default = "default_breaker_failure_threshold")]
    pub failure_threshold: u32,

    /// Seconds before an open circuit admits a trial request
    #[serde(default = "default_breaker_reset_secs")]
    pub reset_secs: u64,
}

/// Weights for the composite chunk quality score; must sum to 1.0
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScoreWeights {
    #[serde(default = "default_weight_semantic_completeness")]
    pub semantic_completeness: f64,

    #[serde(default = "default_weight_boundary_quality")]
    pub boundary_quality: f64,

    #[serde(default = "default_weight_context_preservation")]
    pub context_preservation: f64,

    #[serde(default = "default_weight_structural_integrity")]
    pub structural_integrity: f64,

    #[serde(default = "default_weight_metadata_richness")]
    pub metadata_richness: f64,
}

impl ScoreWeights {
    pub fn sum(&self) -> f64 {
        self.semantic_completeness
            + self.boundary_quality
            + self.context_preservation
            + self.structural_integrity
            + self.metadata_richness
    }
}

/// Quality status derivation thresholds
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct QualityConfig {
    /// Overall score at or above which a chunk is validated
    #[serde(default = "default_validated_threshold")]
    pub validated_threshold: f64,

    /// Overall score below which a chunk always needs review
    #[serde(default = "default_review_threshold")]
    pub review_threshold: f64,

    /// Sub-score floor below which issues/recommendations are generated
    #[serde(default = "default_subscore_floor")]
    pub subscore_floor: f64,
}

/// Boundary analysis configuration
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BoundaryConfig {
    /// Similarity below which a transition qualifies as a product boundary
    #[serde(default = "default_product_similarity_threshold")]
    pub product_similarity_threshold: f64,

    /// Sliding window size for the topic-shift clustering step
    #[serde(default = "default_topic_window")]
    pub topic_window: usize,

    /// Iterations for the per-window clustering step
    #[serde(default = "default_topic_iterations")]
    pub topic_iterations: usize,
}

/// Embedding stability configuration
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StabilityConfig {
    /// Sigma multiplier for the per-batch anomaly rule
    #[serde(default = "default_anomaly_sigma")]
    pub anomaly_sigma: f64,

    /// Neighbor count for the consistency score
    #[serde(default = "default_consistency_k")]
    pub consistency_k: usize,

    /// Embeddings scored per window when a batch exceeds this size
    #[serde(default = "default_stability_window")]
    pub window_size: usize,
}

/// Relationship graph configuration
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Cosine similarity above which a semantic edge is created
    #[serde(default = "default_semantic_edge_threshold")]
    pub semantic_threshold: f64,

    /// Locality window bounding semantic edge candidates per chunk
    #[serde(default = "default_semantic_edge_window")]
    pub semantic_window: usize,
}

/// Retrieval evaluation band thresholds
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_precision_threshold")]
    pub precision_threshold: f64,

    #[serde(default = "default_recall_threshold")]
    pub recall_threshold: f64,

    #[serde(default = "default_mrr_threshold")]
    pub mrr_threshold: f64,

    #[serde(default = "default_latency_threshold_ms")]
    pub latency_threshold_ms: u64,
}

/// Concurrency limits for batched external calls
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ConcurrencyConfig {
    /// Concurrent in-flight classification requests
    #[serde(default = "default_classification_concurrency")]
    pub classification: usize,

    /// Concurrent in-flight embedding requests
    #[serde(default = "default_embedding_concurrency")]
    pub embedding: usize,
}

/// Internal paths configuration
#[derive(Debug, Clone, Default)]
pub struct PathsConfig {
    /// Base directory for assayer data
    pub base_dir: PathBuf,

    /// Path to config file
    pub config_file: PathBuf,

    /// Path to SQLite database
    pub db_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workspace: default_workspace(),
            classification: ClassificationConfig::default(),
            embedding: EmbeddingConfig::default(),
            weights: ScoreWeights::default(),
            quality: QualityConfig::default(),
            boundary: BoundaryConfig::default(),
            stability: StabilityConfig::default(),
            graph: GraphConfig::default(),
            retrieval: RetrievalConfig::default(),
            concurrency: ConcurrencyConfig::default(),
            paths: PathsConfig::default(),
        }
    }
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            backend_url: default_classification_backend_url(),
            model: default_classification_model(),
            timeout_secs: default_provider_timeout_secs(),
            retries: default_provider_retries(),
            keyword_fallback: default_keyword_fallback(),
            breaker: BreakerConfig::default(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend_url: default_embedding_backend_url(),
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            batch_size: default_provider_batch_size(),
            timeout_secs: default_provider_timeout_secs(),
            retries: default_provider_retries(),
            semantic_check: default_semantic_check(),
            breaker: BreakerConfig::default(),
        }
    }
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_breaker_failure_threshold(),
            reset_secs: default_breaker_reset_secs(),
        }
    }
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            semantic_completeness: default_weight_semantic_completeness(),
            boundary_quality: default_weight_boundary_quality(),
            context_preservation: default_weight_context_preservation(),
            structural_integrity: default_weight_structural_integrity(),
            metadata_richness: default_weight_metadata_richness(),
        }
    }
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            validated_threshold: default_validated_threshold(),
            review_threshold: default_review_threshold(),
            subscore_floor: default_subscore_floor(),
        }
    }
}

impl Default for BoundaryConfig {
    fn default() -> Self {
        Self {
            product_similarity_threshold: default_product_similarity_threshold(),
            topic_window: default_topic_window(),
            topic_iterations: default_topic_iterations(),
        }
    }
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            anomaly_sigma: default_anomaly_sigma(),
            consistency_k: default_consistency_k(),
            window_size: default_stability_window(),
        }
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            semantic_threshold: default_semantic_edge_threshold(),
            semantic_window: default_semantic_edge_window(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            precision_threshold: default_precision_threshold(),
            recall_threshold: default_recall_threshold(),
            mrr_threshold: default_mrr_threshold(),
            latency_threshold_ms: default_latency_threshold_ms(),
        }
    }
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            classification: default_classification_concurrency(),
            embedding: default_embedding_concurrency(),
        }
    }
}

impl Config {
    /// Get the default base directory for assayer (~/.assayer)
    pub fn default_base_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".assayer")
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        Self::default_base_dir().join("config.toml")
    }

    /// Initialize paths configuration
    pub fn init_paths(&mut self, base_dir: Option<PathBuf>) {
        let base = base_dir.unwrap_or_else(Self::default_base_dir);
        self.paths = PathsConfig {
            config_file: base.join("config.toml"),
            db_file: base.join("records.db"),
            base_dir: base,
        };
    }

    /// Load configuration from a specific file path
    pub fn load(config_path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", config_path);

        if !config_path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                config_path.display()
            )));
        }

        let content = std::fs::read_to_string(config_path)?;
        let mut config: Config = toml::from_str(&content)?;

        // Set up paths based on config file location
        let base = config_path.parent().unwrap_or(Path::new(".")).to_path_buf();
        config.paths = PathsConfig {
            config_file: config_path.to_path_buf(),
            db_file: base.join("records.db"),
            base_dir: base,
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific base directory
    pub fn load_from(base_dir: Option<PathBuf>) -> Result<Self> {
        let mut config = Config::default();
        config.init_paths(base_dir);

        if config.paths.config_file.exists() {
            debug!("Loading config from {:?}", config.paths.config_file);
            let content = std::fs::read_to_string(&config.paths.config_file)?;
            let mut loaded: Config = toml::from_str(&content)?;
            loaded.paths = config.paths;
            config = loaded;
            config.validate()?;
        } else {
            debug!("No config file found, using defaults");
        }

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = self.paths.config_file.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&self.paths.config_file, content)?;
        info!("Saved config to {:?}", self.paths.config_file);
        Ok(())
    }

    /// Check if assayer is initialized (config and DB exist)
    pub fn is_initialized(&self) -> bool {
        self.paths.config_file.exists() && self.paths.db_file.exists()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let weight_sum = self.weights.sum();
        if (weight_sum - 1.0).abs() > 1e-6 {
            return Err(Error::Config(format!(
                "weights must sum to 1.0, got {}",
                weight_sum
            )));
        }

        for (name, value) in [
            ("quality.validated_threshold", self.quality.validated_threshold),
            ("quality.review_threshold", self.quality.review_threshold),
            ("quality.subscore_floor", self.quality.subscore_floor),
            (
                "boundary.product_similarity_threshold",
                self.boundary.product_similarity_threshold,
            ),
            ("graph.semantic_threshold", self.graph.semantic_threshold),
            ("retrieval.precision_threshold", self.retrieval.precision_threshold),
            ("retrieval.recall_threshold", self.retrieval.recall_threshold),
            ("retrieval.mrr_threshold", self.retrieval.mrr_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::Config(format!(
                    "{} must be between 0.0 and 1.0",
                    name
                )));
            }
        }

        if self.quality.review_threshold > self.quality.validated_threshold {
            return Err(Error::Config(
                "quality.review_threshold must be <= quality.validated_threshold".to_string(),
            ));
        }

        if self.stability.anomaly_sigma <= 0.0 {
            return Err(Error::Config(
                "stability.anomaly_sigma must be positive".to_string(),
            ));
        }

        if self.stability.window_size == 0 {
            return Err(Error::Config(
                "stability.window_size must be positive".to_string(),
            ));
        }

        if self.embedding.dimension == 0 {
            return Err(Error::Config(
                "embedding.dimension must be positive".to_string(),
            ));
        }

        if self.concurrency.classification == 0 || self.concurrency.embedding == 0 {
            return Err(Error::Config(
                "concurrency limits must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

/// Get the database URL for sqlx
pub fn database_url(config: &Config) -> String {
    format!("sqlite://{}?mode=rwc", config.paths.db_file.display())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.workspace, "default");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_weights_sum_to_one() {
        let weights = ScoreWeights::default();
        assert!((weights.sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_config_save_load() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.init_paths(Some(tmp.path().to_path_buf()));
        config.workspace = "catalog-qa".to_string();

        config.save().unwrap();
        assert!(config.paths.config_file.exists());

        let loaded = Config::load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert_eq!(loaded.workspace, "catalog-qa");
    }

    #[test]
    fn test_config_validation_rejects_bad_weights() {
        let mut config = Config::default();
        config.weights.boundary_quality = 0.9;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_rejects_inverted_thresholds() {
        let mut config = Config::default();
        config.quality.review_threshold = 0.9;
        config.quality.validated_threshold = 0.8;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_rejects_zero_sigma() {
        let mut config = Config::default();
        config.stability.anomaly_sigma = 0.0;
        assert!(config.validate().is_err());
    }
}
