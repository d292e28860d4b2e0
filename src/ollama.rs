//! Ollama chat and model-listing client.
//!
//! Wraps the two non-embedding endpoints used by the CLI:
//! `POST /api/chat` (non-streaming completion over a full transcript) and
//! `GET /api/tags` (locally pulled models).

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::OllamaConfig;
use crate::models::Message;

/// A single model entry returned by `/api/tags`.
#[derive(Debug, Clone, Deserialize)]
pub struct OllamaModel {
    pub name: String,
    #[serde(default)]
    pub size: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<OllamaModel>,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f64,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: String,
}

pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    temperature: f64,
}

impl OllamaClient {
    pub fn new(config: &OllamaConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.host.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send the whole transcript and return the assistant's reply text.
    pub async fn chat(&self, messages: &[Message]) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: messages
                .iter()
                .map(|m| WireMessage {
                    role: m.role.wire_name(),
                    content: &m.content,
                })
                .collect(),
            stream: false,
            options: ChatOptions {
                temperature: self.temperature,
            },
        };

        tracing::debug!(model = %self.model, messages = messages.len(), "sending chat request");

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&request)
            .send()
            .await
            .with_context(|| format!("Ollama unreachable at {}", self.base_url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Ollama API error {}: {}", status, body);
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .context("Failed to parse Ollama chat response")?;
        Ok(parsed.message.content)
    }

    /// List the models pulled on the server.
    pub async fn list_models(&self) -> Result<Vec<OllamaModel>> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Ollama unreachable at {}", self.base_url))?;

        if !response.status().is_success() {
            bail!("Ollama returned HTTP {}", response.status());
        }

        let tags: TagsResponse = response
            .json()
            .await
            .context("Failed to parse Ollama response")?;
        Ok(tags.models)
    }
}

/// CLI entry point for `panda models`.
pub async fn run_models(config: &OllamaConfig) -> Result<()> {
    let client = OllamaClient::new(config)?;

    let models = client.list_models().await?;

    println!("Ollama at {}", client.base_url());
    if models.is_empty() {
        println!("  no models found");
        println!("  Run `ollama pull {}` to download a model.", client.model());
        return Ok(());
    }

    for m in &models {
        let marker = if m.name == client.model() { "▶" } else { " " };
        match m.size {
            Some(bytes) => println!("  {} {} ({:.1} GB)", marker, m.name, bytes as f64 / 1e9),
            None => println!("  {} {}", marker, m.name),
        }
    }

    Ok(())
}
