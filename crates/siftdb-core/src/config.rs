//! Typed configuration loaded through Figment.
//!
//! Merges `config.toml` + `config.<env>.toml` + `SIFTDB_*` environment
//! variables (nested keys separated by `__`, e.g. `SIFTDB_FUSION__SEMANTIC_WEIGHT`).

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use crate::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SearchConfig {
    pub chunking: ChunkingConfig,
    pub embedding: EmbeddingConfig,
    pub fusion: FusionConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Target chunk size in tokens. Clamped to 500–2000.
    pub target_tokens: usize,
    /// Overlap between consecutive chunks in tokens. Clamped to 50–300.
    pub overlap_tokens: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { target_tokens: 1000, overlap_tokens: 150 }
    }
}

impl ChunkingConfig {
    /// Clamp the tunables into their supported ranges.
    pub fn clamped(&self) -> Self {
        Self {
            target_tokens: self.target_tokens.clamp(500, 2000),
            overlap_tokens: self.overlap_tokens.clamp(50, 300),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Directory holding tokenizer.json / config.json / pytorch_model.bin.
    pub model_dir: Option<String>,
    /// Number of texts embedded per forward pass.
    pub batch_size: usize,
    /// Use the deterministic hash embedder instead of the real model.
    pub use_fake: bool,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self { model_dir: None, batch_size: 128, use_fake: false }
    }
}

/// Weighted-sum fusion tunables. With `cross_bonus >= 1` and positive
/// weights, a chunk found by both engines with nonzero normalized scores
/// fuses strictly above either of its single-engine contributions.
/// `validate` keeps the weights non-negative and the bonus at least 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    pub semantic_weight: f32,
    pub lexical_weight: f32,
    /// Multiplier applied when a chunk appears in both top-k sets.
    pub cross_bonus: f32,
    /// Per-sub-query timeout for search operations.
    pub query_timeout_ms: u64,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            semantic_weight: 0.7,
            lexical_weight: 0.3,
            cross_bonus: 1.15,
            query_timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory for the vector and lexical indices.
    pub data_dir: String,
    /// Optional content-addressed output location for extracted artifacts.
    pub artifacts_dir: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { data_dir: "data".to_string(), artifacts_dir: None }
    }
}

impl SearchConfig {
    pub fn load() -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(SearchConfig::default()))
            .merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("SIFTDB_").split("__"));

        let config: SearchConfig = figment
            .extract()
            .map_err(|e| Error::validation(format!("failed to load configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.fusion.semantic_weight < 0.0 || self.fusion.lexical_weight < 0.0 {
            return Err(Error::validation("fusion weights must be non-negative"));
        }
        if self.fusion.cross_bonus < 1.0 {
            return Err(Error::validation("fusion.cross_bonus must be >= 1.0"));
        }
        if self.embedding.batch_size == 0 {
            return Err(Error::validation("embedding.batch_size must be > 0"));
        }
        Ok(())
    }

    pub fn data_dir(&self) -> PathBuf {
        expand_path(&self.storage.data_dir)
    }

    pub fn artifacts_dir(&self) -> Option<PathBuf> {
        self.storage.artifacts_dir.as_deref().map(expand_path)
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}
