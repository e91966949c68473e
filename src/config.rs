//! TOML configuration.
//!
//! Only `[data] dir` is mandatory; every other section falls back to
//! defaults matching a local Ollama installation.
//!
//! ```toml
//! [data]
//! dir = "dades/dades_preprocessades"
//!
//! [output]
//! dir = "informes"
//!
//! [chunking]
//! max_length = 512
//!
//! [retrieval]
//! top_k = 7
//!
//! [embedding]
//! provider = "ollama"
//! model = "bge-m3"
//!
//! [generation]
//! model = "gemma3:4b"
//! temperature = 0.1
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub data: DataConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DataConfig {
    /// Directory holding the five preprocessed CSV tables.
    pub dir: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    /// Maximum segment length in characters for the fallback chunker.
    #[serde(default = "default_max_length")]
    pub max_length: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_length: default_max_length(),
        }
    }
}

fn default_max_length() -> usize {
    512
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: i64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> i64 {
    7
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            url: None,
            batch_size: default_batch_size(),
            max_retries: 0,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_ollama_url")]
    pub url: String,
    #[serde(default = "default_generation_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,
    /// Fixed wait between starting the service and re-checking it.
    #[serde(default = "default_startup_wait_secs")]
    pub startup_wait_secs: u64,
    /// Command line used to start the service when it is not reachable.
    #[serde(default = "default_serve_command")]
    pub serve_command: Vec<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            url: default_ollama_url(),
            model: default_generation_model(),
            temperature: default_temperature(),
            timeout_secs: default_generation_timeout_secs(),
            startup_wait_secs: default_startup_wait_secs(),
            serve_command: default_serve_command(),
        }
    }
}

pub(crate) fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_generation_model() -> String {
    "gemma3:4b".to_string()
}
fn default_temperature() -> f64 {
    0.1
}
fn default_generation_timeout_secs() -> u64 {
    300
}
fn default_startup_wait_secs() -> u64 {
    10
}
fn default_serve_command() -> Vec<String> {
    vec!["ollama".to_string(), "serve".to_string()]
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.chunking.max_length == 0 {
        anyhow::bail!("chunking.max_length must be > 0");
    }

    if config.retrieval.top_k < 1 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }

    match config.embedding.provider.as_str() {
        "disabled" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled or ollama.",
            other
        ),
    }

    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }

    if config.generation.serve_command.is_empty() {
        anyhow::bail!("generation.serve_command must not be empty");
    }

    if !(0.0..=2.0).contains(&config.generation.temperature) {
        anyhow::bail!("generation.temperature must be in [0.0, 2.0]");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_src: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_src)?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = parse("[data]\ndir = \"dades\"\n").unwrap();
        assert_eq!(config.chunking.max_length, 512);
        assert_eq!(config.retrieval.top_k, 7);
        assert_eq!(config.output.dir, PathBuf::from("."));
        assert_eq!(config.embedding.provider, "disabled");
        assert_eq!(config.embedding.max_retries, 0);
        assert_eq!(config.generation.model, "gemma3:4b");
        assert_eq!(config.generation.startup_wait_secs, 10);
        assert_eq!(config.generation.serve_command, vec!["ollama", "serve"]);
    }

    #[test]
    fn test_rejects_zero_max_length() {
        let err = parse("[data]\ndir = \"d\"\n[chunking]\nmax_length = 0\n").unwrap_err();
        assert!(err.to_string().contains("max_length"));
    }

    #[test]
    fn test_rejects_non_positive_top_k() {
        assert!(parse("[data]\ndir = \"d\"\n[retrieval]\ntop_k = 0\n").is_err());
    }

    #[test]
    fn test_rejects_unknown_provider() {
        let err = parse("[data]\ndir = \"d\"\n[embedding]\nprovider = \"openai\"\n").unwrap_err();
        assert!(err.to_string().contains("Unknown embedding provider"));
    }

    #[test]
    fn test_missing_data_section_fails() {
        assert!(parse("[chunking]\nmax_length = 10\n").is_err());
    }
}
