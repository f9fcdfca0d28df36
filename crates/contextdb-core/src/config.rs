//! Layered configuration loader, typed settings and path helpers.
//!
//! Uses Figment to merge built-in defaults + `config.toml` + `config.<env>.toml`
//! + `APP_*` env vars (`__` separates nested keys, e.g. `APP_RETRIEVAL__TOP_K`).
//! `expand_path` expands `~` and `${VAR}` in user-supplied directories.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{Error, Result};

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        Self::load_from(Path::new("."), &env_name)
    }

    /// Load with an explicit config directory and environment name.
    pub fn load_from(dir: &Path, env_name: &str) -> anyhow::Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(dir.join("config.toml")));
        match env_name {
            "dev" | "development" => figment = figment.merge(Toml::file(dir.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(dir.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(dir.join("config.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.settings()?;
        Ok(config)
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// The full typed settings tree, validated.
    pub fn settings(&self) -> anyhow::Result<Settings> {
        let settings: Settings = self
            .figment
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to read settings: {}", e))?;
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
    pub embedding: EmbeddingConfig,
    pub data: DataConfig,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        self.chunking.validate()?;
        self.retrieval.validate()?;
        self.embedding.validate()
    }
}

/// Unit the chunker counts in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkUnit {
    Chars,
    #[default]
    Words,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub unit: ChunkUnit,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { chunk_size: 500, chunk_overlap: 50, unit: ChunkUnit::Words }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::Configuration("chunk_size must be at least 1".into()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(Error::Configuration(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// Whether and how lexical matches take part in retrieval.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeywordMode {
    /// Vector similarity only.
    #[default]
    Off,
    /// Keyword matches stand in when the embedding provider fails or no
    /// vector match survives the threshold.
    Fallback,
    /// Keyword and vector matches are fused, best score per chunk.
    Hybrid,
}

impl FromStr for KeywordMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "off" => Ok(Self::Off),
            "fallback" => Ok(Self::Fallback),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(Error::Configuration(format!("unknown keyword mode '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub include_neighbors: bool,
    pub neighbor_range: usize,
    pub neighbor_decay_factor: f32,
    /// Primary matches scoring below this are dropped. Disabled when unset.
    pub similarity_threshold: Option<f32>,
    pub keyword: KeywordMode,
    pub embed_timeout_ms: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            include_neighbors: true,
            neighbor_range: 1,
            neighbor_decay_factor: 0.8,
            similarity_threshold: None,
            keyword: KeywordMode::Off,
            embed_timeout_ms: 10_000,
        }
    }
}

impl RetrievalConfig {
    pub fn validate(&self) -> Result<()> {
        validate_decay_factor(self.neighbor_decay_factor)?;
        if let Some(t) = self.similarity_threshold {
            if !t.is_finite() {
                return Err(Error::Configuration("similarity_threshold must be finite".into()));
            }
        }
        if self.embed_timeout_ms == 0 {
            return Err(Error::Configuration("embed_timeout_ms must be at least 1".into()));
        }
        Ok(())
    }
}

pub fn validate_decay_factor(decay: f32) -> Result<()> {
    if !decay.is_finite() || !(0.0..=1.0).contains(&decay) {
        return Err(Error::Configuration(format!(
            "neighbor_decay_factor must be within [0, 1], got {decay}"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: String,
    pub dim: usize,
    pub cache: bool,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self { provider: "hash".to_string(), dim: 384, cache: true }
    }
}

impl EmbeddingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.dim == 0 {
            return Err(Error::Configuration("embedding.dim must be at least 1".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub raw_txt_dir: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self { raw_txt_dir: "data/txt".to_string() }
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    // Expand env vars first
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}
