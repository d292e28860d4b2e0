//! Pinecone Local client over the REST data plane.
//!
//! Pinecone Local serves each index on its own host (default
//! `http://localhost:5081`) and accepts the same JSON requests as the hosted
//! service: `POST /vectors/upsert`, `POST /query` and
//! `POST /describe_index_stats`, authenticated with an `Api-Key` header.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::VectorStore;
use crate::config::PineconeConfig;
use crate::models::{QueryMatch, VectorRecord};

const API_VERSION: &str = "2025-01";

/// Records per upsert request. Keeps large (e.g. 4096-d) vectors under the
/// request size limit.
const UPSERT_BATCH: usize = 50;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UpsertRequest<'a> {
    vectors: &'a [VectorRecord],
    namespace: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
    #[serde(default)]
    upserted_count: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_values: bool,
    include_metadata: bool,
    namespace: &'a str,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatsResponse {
    #[serde(default)]
    namespaces: std::collections::HashMap<String, NamespaceSummary>,
    #[serde(default)]
    dimension: usize,
    #[serde(default)]
    total_vector_count: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NamespaceSummary {
    #[serde(default)]
    vector_count: u64,
}

/// Index-level counts from `describe_index_stats`.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexStats {
    pub dimension: usize,
    pub total_vector_count: u64,
    pub namespace_vector_count: u64,
}

pub struct PineconeIndex {
    client: reqwest::Client,
    host: String,
    api_key: String,
    namespace: String,
}

impl PineconeIndex {
    pub fn new(config: &PineconeConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            host: config.host.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            namespace: config.namespace.clone(),
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    async fn post<B: Serialize + ?Sized>(&self, route: &str, body: &B) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.host, route);
        let response = self
            .client
            .post(&url)
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
            .json(body)
            .send()
            .await
            .with_context(|| format!("Pinecone unreachable at {}", self.host))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            bail!("Pinecone API error {} on {}: {}", status, route, text);
        }
        Ok(response)
    }

    pub async fn describe_stats(&self) -> Result<IndexStats> {
        let response = self
            .post("/describe_index_stats", &serde_json::json!({}))
            .await?;
        let stats: StatsResponse = response
            .json()
            .await
            .context("Invalid describe_index_stats response")?;

        Ok(IndexStats {
            dimension: stats.dimension,
            total_vector_count: stats.total_vector_count,
            namespace_vector_count: stats
                .namespaces
                .get(&self.namespace)
                .map(|n| n.vector_count)
                .unwrap_or(0),
        })
    }
}

#[async_trait]
impl VectorStore for PineconeIndex {
    async fn upsert(&self, records: &[VectorRecord]) -> Result<usize> {
        let mut written = 0;
        for batch in records.chunks(UPSERT_BATCH) {
            let request = UpsertRequest {
                vectors: batch,
                namespace: &self.namespace,
            };
            let response = self.post("/vectors/upsert", &request).await?;
            let parsed: UpsertResponse = response
                .json()
                .await
                .context("Invalid upsert response")?;
            tracing::debug!(count = parsed.upserted_count, "pinecone upsert batch");
            written += parsed.upserted_count;
        }
        Ok(written)
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<QueryMatch>> {
        let request = QueryRequest {
            vector,
            top_k,
            include_values: false,
            include_metadata: true,
            namespace: &self.namespace,
        };
        let response = self.post("/query", &request).await?;
        let parsed: QueryResponse = response.json().await.context("Invalid query response")?;
        Ok(parsed.matches)
    }
}
