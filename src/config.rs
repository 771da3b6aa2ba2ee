use crate::error::{RagError, Result};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Retrieval and synthesis parameters for one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Words per chunk.
    pub chunk_size: usize,
    /// Words shared by consecutive chunks. Must be smaller than `chunk_size`.
    pub overlap: usize,
    /// Number of chunks retrieved per question.
    pub top_k: usize,
    pub temperature: f32,
    pub max_output_tokens: u32,
    /// Retrieved chunks farther than this squared L2 distance are dropped.
    /// `None` keeps every result.
    pub max_distance: Option<f32>,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 200,
            overlap: 50,
            top_k: 3,
            temperature: 0.7,
            max_output_tokens: 150,
            max_distance: None,
        }
    }
}

impl RagConfig {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(RagError::InvalidConfig("chunk_size must be positive".into()));
        }
        if self.overlap >= self.chunk_size {
            return Err(RagError::InvalidConfig(format!(
                "overlap ({}) must be smaller than chunk_size ({})",
                self.overlap, self.chunk_size
            )));
        }
        if self.top_k == 0 {
            return Err(RagError::InvalidConfig("top_k must be positive".into()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(RagError::InvalidConfig(format!(
                "temperature {} is outside [0, 2]",
                self.temperature
            )));
        }
        if self.max_output_tokens == 0 {
            return Err(RagError::InvalidConfig(
                "max_output_tokens must be positive".into(),
            ));
        }
        if let Some(cutoff) = self.max_distance {
            if !cutoff.is_finite() || cutoff < 0.0 {
                return Err(RagError::InvalidConfig(format!(
                    "max_distance {} must be a non-negative number",
                    cutoff
                )));
            }
        }
        Ok(())
    }
}

/// Which embedding model backs the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EmbedderKind {
    /// Local sentence-transformer (all-MiniLM-L6-v2 by default).
    #[value(name = "minilm")]
    MiniLm,
    /// Word-hashing embedder with no notion of meaning. Offline testing only.
    Hashing,
    /// Azure OpenAI embeddings deployment.
    Azure,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbedderSettings {
    pub kind: EmbedderKind,
    /// HuggingFace Hub id of the local sentence model.
    pub model_id: String,
    /// Output dimension of the hashing embedder.
    pub dimension: usize,
    /// Azure deployment name, overridden by `AZURE_EMBEDDING_DEPLOYMENT`.
    pub deployment: String,
}

impl Default for EmbedderSettings {
    fn default() -> Self {
        Self {
            kind: EmbedderKind::MiniLm,
            model_id: crate::minilm::DEFAULT_MODEL_ID.to_string(),
            dimension: 384,
            deployment: "text-embedding-3-small".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// Chat deployment name, overridden by `AZURE_DEPLOYMENT`.
    pub model_name: String,
    pub request_timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            model_name: "gpt-4o-mini".to_string(),
            request_timeout_secs: 60,
        }
    }
}

/// On-disk configuration file layout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub retrieval: RagConfig,
    pub embedder: EmbedderSettings,
    pub llm: LlmSettings,
}

impl Config {
    /// Load configuration from a TOML file. Missing keys take their defaults.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {:?}", path))?;
        Ok(config)
    }

    /// Load from the default location, or fall back to defaults when absent.
    pub fn load_or_default() -> anyhow::Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(path),
            _ => Ok(Self::default()),
        }
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("docqa").join("config.toml"))
    }
}
