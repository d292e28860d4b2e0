//! Configuration loading.
//!
//! Settings come from three layers, later layers winning:
//!
//! 1. Built-in defaults (every field has one, so no file is required).
//! 2. An optional TOML file (`--config`, default `./config/panda.toml`).
//! 3. Environment variables (`OLLAMA_HOST`, `OLLAMA_MODEL`,
//!    `OLLAMA_SYSTEM_MESSAGE`, `OLLAMA_TEMPERATURE`, `PINECONE_HOST`,
//!    `PINECONE_API_KEY`, `GITHUB_TOKEN`), including any loaded from `.env`.
//!
//! The merged result is validated before being returned.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub ollama: OllamaConfig,
    pub embedding: EmbeddingConfig,
    pub chunking: ChunkingConfig,
    pub pinecone: PineconeConfig,
    pub csv: CsvConfig,
    pub github: GithubConfig,
    pub issues: IssuesConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct OllamaConfig {
    pub host: String,
    pub model: String,
    pub system_message: String,
    pub temperature: f64,
    pub timeout_secs: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: "http://localhost:11434".to_string(),
            model: "llama3:latest".to_string(),
            system_message: "I am a Prompt Engineer".to_string(),
            temperature: 0.5,
            timeout_secs: 300,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: String,
    /// Falls back to `ollama.model` when unset.
    pub model: Option<String>,
    pub batch_size: usize,
    pub max_retries: u32,
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            model: None,
            batch_size: 16,
            max_retries: 0,
            timeout_secs: 60,
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 100,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PineconeConfig {
    pub host: String,
    pub api_key: String,
    pub index_name: String,
    pub namespace: String,
    pub top_k: usize,
    pub source_tag: String,
    pub settle_secs: u64,
    pub timeout_secs: u64,
}

impl Default for PineconeConfig {
    fn default() -> Self {
        Self {
            host: "http://localhost:5081".to_string(),
            api_key: "pclocal".to_string(),
            index_name: "ollama-llama3-embeddings".to_string(),
            namespace: "csv-hobby".to_string(),
            top_k: 2,
            source_tag: "ollama_llama3_demo".to_string(),
            settle_secs: 2,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CsvConfig {
    pub path: PathBuf,
}

impl Default for CsvConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("res/my-data.csv"),
        }
    }
}

#[derive(Deserialize, Clone)]
#[serde(default)]
pub struct GithubConfig {
    pub api_url: String,
    pub repo: String,
    pub state: String,
    pub per_page: u32,
    pub token: Option<String>,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.github.com".to_string(),
            repo: "goharbor/harbor".to_string(),
            state: "open".to_string(),
            per_page: 100,
            token: None,
        }
    }
}

// Keep the token out of debug output.
impl std::fmt::Debug for GithubConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GithubConfig")
            .field("api_url", &self.api_url)
            .field("repo", &self.repo)
            .field("state", &self.state)
            .field("per_page", &self.per_page)
            .field(
                "token",
                if self.token.is_some() {
                    &"<redacted>"
                } else {
                    &"<not set>"
                },
            )
            .finish()
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct IssuesConfig {
    pub file: PathBuf,
    pub persist_dir: PathBuf,
    pub limit: Option<usize>,
    pub k: usize,
    pub candidate_k: usize,
    pub query: String,
}

impl Default for IssuesConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from("data/goharbor-issues.json"),
            persist_dir: PathBuf::from("db/goharbor-issues-open"),
            limit: None,
            k: 1,
            candidate_k: 20,
            query: "Redis connection?".to_string(),
        }
    }
}

impl Config {
    /// Model used for embeddings: `embedding.model`, else the chat model.
    pub fn embedding_model(&self) -> &str {
        self.embedding
            .model
            .as_deref()
            .unwrap_or(self.ollama.model.as_str())
    }

    /// Apply environment overrides through `lookup` (usually `std::env::var`).
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("OLLAMA_HOST") {
            self.ollama.host = host;
        }
        if let Some(model) = lookup("OLLAMA_MODEL") {
            self.ollama.model = model;
        }
        if let Some(message) = lookup("OLLAMA_SYSTEM_MESSAGE") {
            self.ollama.system_message = message;
        }
        if let Some(raw) = lookup("OLLAMA_TEMPERATURE") {
            self.ollama.temperature = raw
                .trim()
                .parse::<f64>()
                .with_context(|| format!("OLLAMA_TEMPERATURE is not a number: '{}'", raw))?;
        }
        if let Some(host) = lookup("PINECONE_HOST") {
            self.pinecone.host = host;
        }
        if let Some(key) = lookup("PINECONE_API_KEY") {
            self.pinecone.api_key = key;
        }
        if let Some(token) = lookup("GITHUB_TOKEN") {
            if !token.is_empty() {
                self.github.token = Some(token);
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=2.0).contains(&self.ollama.temperature) {
            bail!(
                "ollama.temperature must be in [0.0, 2.0], got {}",
                self.ollama.temperature
            );
        }

        if self.chunking.chunk_size == 0 {
            bail!("chunking.chunk_size must be > 0");
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            bail!(
                "chunking.chunk_overlap ({}) must be smaller than chunking.chunk_size ({})",
                self.chunking.chunk_overlap,
                self.chunking.chunk_size
            );
        }

        match self.embedding.provider.as_str() {
            "disabled" | "ollama" => {}
            other => bail!(
                "Unknown embedding provider: '{}'. Must be disabled or ollama.",
                other
            ),
        }
        if self.embedding.batch_size == 0 {
            bail!("embedding.batch_size must be > 0");
        }

        if self.pinecone.top_k == 0 {
            bail!("pinecone.top_k must be > 0");
        }
        if self.issues.k == 0 {
            bail!("issues.k must be > 0");
        }

        if !(1..=100).contains(&self.github.per_page) {
            bail!("github.per_page must be in 1..=100");
        }
        let repo_ok = matches!(
            self.github.repo.split_once('/'),
            Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/')
        );
        if !repo_ok {
            bail!(
                "github.repo must look like 'owner/name', got '{}'",
                self.github.repo
            );
        }

        Ok(())
    }
}

/// Read the TOML file at `path` if it exists; defaults otherwise.
pub fn load_file(path: &Path) -> Result<Config> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Load the file, overlay the process environment, and validate.
pub fn load_config(path: &Path) -> Result<Config> {
    let mut config = load_file(path)?;
    config.apply_env(|key| std::env::var(key).ok())?;
    config.validate()?;
    Ok(config)
}
