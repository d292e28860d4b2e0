//! Embedding provider abstraction and the Ollama backend.
//!
//! Defines the [`EmbeddingProvider`] trait and two implementations:
//! - **[`DisabledProvider`]**: returns errors; used when embeddings are turned off.
//! - **[`OllamaProvider`]**: calls the Ollama server's `/api/embed` endpoint.
//!
//! Also provides vector utilities for the on-disk store:
//! - [`cosine_similarity`]: similarity between two embedding vectors
//! - [`vec_to_blob`]: encode a `Vec<f32>` as little-endian bytes for SQLite BLOB storage
//! - [`blob_to_vec`]: decode a SQLite BLOB back into a `Vec<f32>`
//!
//! # Retry Strategy
//!
//! Retries are off by default (`embedding.max_retries = 0`). When enabled:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::config::{EmbeddingConfig, OllamaConfig};

/// Trait for embedding providers.
///
/// A provider is built once per command and reused for every batch, so the
/// underlying HTTP client and the learned dimension are shared.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"llama3:latest"`).
    fn model_name(&self) -> &str;
    /// Vector dimension, or 0 until the first successful response.
    fn dims(&self) -> usize;
    /// Embed a batch of texts, returning one vector per input in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Embed a batch of texts through `provider`.
///
/// # Errors
///
/// - `"disabled"` provider: always returns an error.
/// - `"ollama"` provider: returns an error if the server responds with a
///   non-retryable status, all retries are exhausted, the response does not
///   contain exactly one vector per input, or a vector's length differs from
///   the dimension seen so far.
pub async fn embed_texts(
    provider: &dyn EmbeddingProvider,
    texts: &[String],
) -> Result<Vec<Vec<f32>>> {
    if texts.is_empty() {
        return Ok(Vec::new());
    }
    provider.embed(texts).await
}

/// Embed a single query text.
pub async fn embed_query(provider: &dyn EmbeddingProvider, text: &str) -> Result<Vec<f32>> {
    let results = embed_texts(provider, &[text.to_string()]).await?;
    results
        .into_iter()
        .next()
        .ok_or_else(|| anyhow::anyhow!("Empty embedding response"))
}

/// Embed many texts in `batch_size` groups, tolerating failures.
///
/// A failed batch prints an error line per text and yields `None` in those
/// positions; callers skip them.
pub async fn embed_each(
    provider: &dyn EmbeddingProvider,
    texts: &[String],
    batch_size: usize,
) -> Vec<Option<Vec<f32>>> {
    let mut out = Vec::with_capacity(texts.len());

    for batch in texts.chunks(batch_size.max(1)) {
        match embed_texts(provider, batch).await {
            Ok(vectors) => out.extend(vectors.into_iter().map(Some)),
            Err(e) => {
                for text in batch {
                    println!("Error generating embedding for '{}': {}", text, e);
                    out.push(None);
                }
            }
        }
    }

    let failed = out.iter().filter(|v| v.is_none()).count();
    if failed > 0 {
        tracing::warn!(failed, total = texts.len(), "some embeddings failed");
    }

    out
}

// ============ Disabled Provider ============

/// A no-op embedding provider.
///
/// Used when `embedding.provider = "disabled"`. Any attempt to embed text
/// fails with a descriptive error.
pub struct DisabledProvider;

#[async_trait]
impl EmbeddingProvider for DisabledProvider {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        bail!("Embedding provider is disabled")
    }
}

// ============ Ollama Provider ============

/// Embedding provider using the Ollama server.
///
/// Calls `POST /api/embed` on `ollama.host` (default `http://localhost:11434`).
/// The model must already be pulled (e.g. `ollama pull llama3`).
pub struct OllamaProvider {
    client: reqwest::Client,
    model: String,
    url: String,
    max_retries: u32,
    dims: AtomicUsize,
}

impl OllamaProvider {
    pub fn new(embedding: &EmbeddingConfig, ollama: &OllamaConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(embedding.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            model: embedding
                .model
                .clone()
                .unwrap_or_else(|| ollama.model.clone()),
            url: ollama.host.trim_end_matches('/').to_string(),
            max_retries: embedding.max_retries,
            dims: AtomicUsize::new(0),
        })
    }

    /// Record the dimension on first use; later vectors must match it.
    fn check_dims(&self, vectors: &[Vec<f32>]) -> Result<()> {
        for v in vectors {
            let known = self.dims.load(Ordering::Relaxed);
            if known == 0 {
                self.dims.store(v.len(), Ordering::Relaxed);
            } else if v.len() != known {
                bail!(
                    "Ollama returned a {}-dimensional embedding, expected {}",
                    v.len(),
                    known
                );
            }
        }
        Ok(())
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims.load(Ordering::Relaxed)
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tracing::debug!(attempt, ?delay, "retrying embedding request");
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(format!("{}/api/embed", self.url))
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        let vectors = parse_ollama_response(&json)?;
                        if vectors.len() != texts.len() {
                            bail!(
                                "Ollama returned {} embeddings for {} inputs",
                                vectors.len(),
                                texts.len()
                            );
                        }
                        self.check_dims(&vectors)?;
                        return Ok(vectors);
                    }

                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(anyhow::anyhow!(
                            "Ollama API error {}: {}",
                            status,
                            body_text
                        ));
                        continue;
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    bail!("Ollama API error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(anyhow::anyhow!(
                        "Ollama connection error (is Ollama running at {}?): {}",
                        self.url,
                        e
                    ));
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Ollama embedding failed after retries")))
    }
}

fn parse_ollama_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: missing embeddings array"))?;

    let mut result = Vec::with_capacity(embeddings.len());

    for embedding in embeddings {
        let vec: Vec<f32> = embedding
            .as_array()
            .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: embedding is not an array"))?
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();
        result.push(vec);
    }

    Ok(result)
}

/// Create the [`EmbeddingProvider`] named by `embedding.provider`.
pub fn create_provider(
    embedding: &EmbeddingConfig,
    ollama: &OllamaConfig,
) -> Result<Box<dyn EmbeddingProvider>> {
    match embedding.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledProvider)),
        "ollama" => Ok(Box::new(OllamaProvider::new(embedding, ollama)?)),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// # Example
///
/// ```rust
/// use panda_rag::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12); // 3 × 4 bytes
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`, or `0.0` for empty vectors or vectors
/// of different lengths.
///
/// ```text
///            a · b
/// cos(θ) = ─────────
///          ‖a‖ × ‖b‖
/// ```
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}
