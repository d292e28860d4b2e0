//! On-disk vector store backed by SQLite.
//!
//! A store lives in a persist directory holding a single `store.sqlite`
//! file. Embeddings are stored as little-endian `f32` blobs and queries are
//! brute-force cosine similarity over every row, which is plenty for a few
//! thousand issue chunks.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::{Row, SqlitePool};
use std::path::{Path, PathBuf};

use super::VectorStore;
use crate::chunk::text_hash;
use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::models::{QueryMatch, VectorRecord};
use crate::{db, migrate};

const DB_FILE: &str = "store.sqlite";

pub struct SqliteStore {
    pool: SqlitePool,
    model: String,
}

impl SqliteStore {
    /// True when the persist directory is already present.
    pub fn exists(persist_dir: &Path) -> bool {
        persist_dir.exists()
    }

    pub fn db_path(persist_dir: &Path) -> PathBuf {
        persist_dir.join(DB_FILE)
    }

    /// Open (creating if needed) the store in `persist_dir`. `model` is
    /// recorded against every row written through this handle.
    pub async fn open(persist_dir: &Path, model: &str) -> Result<Self> {
        std::fs::create_dir_all(persist_dir)
            .with_context(|| format!("Failed to create {}", persist_dir.display()))?;

        let pool = db::connect(&Self::db_path(persist_dir), true).await?;
        migrate::run_migrations(&pool).await?;

        Ok(Self {
            pool,
            model: model.to_string(),
        })
    }

    /// Open a store that was already built, without creating or migrating
    /// anything. `None` when `persist_dir` holds no store file.
    pub async fn open_existing(persist_dir: &Path, model: &str) -> Result<Option<Self>> {
        let path = Self::db_path(persist_dir);
        if !path.exists() {
            return Ok(None);
        }
        let pool = db::connect(&path, false).await?;
        Ok(Some(Self {
            pool,
            model: model.to_string(),
        }))
    }

    /// Dimension and model of the stored vectors, `None` while empty.
    pub async fn stored_shape(&self) -> Result<Option<(usize, String)>> {
        let row = sqlx::query("SELECT dims, model FROM vectors LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| (r.get::<i64, _>("dims") as usize, r.get("model"))))
    }

    pub async fn count(&self) -> Result<i64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM vectors")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

fn document_id(record: &VectorRecord) -> String {
    match record.metadata.get("issue_id") {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => record.id.clone(),
    }
}

#[async_trait]
impl VectorStore for SqliteStore {
    async fn upsert(&self, records: &[VectorRecord]) -> Result<usize> {
        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        for record in records {
            let text = record.text().unwrap_or("");
            let metadata_json = serde_json::to_string(&record.metadata)?;

            sqlx::query(
                r#"
                INSERT INTO vectors (id, document_id, text, metadata_json, model, dims, hash, embedding, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    document_id = excluded.document_id,
                    text = excluded.text,
                    metadata_json = excluded.metadata_json,
                    model = excluded.model,
                    dims = excluded.dims,
                    hash = excluded.hash,
                    embedding = excluded.embedding,
                    created_at = excluded.created_at
                "#,
            )
            .bind(&record.id)
            .bind(document_id(record))
            .bind(text)
            .bind(&metadata_json)
            .bind(&self.model)
            .bind(record.values.len() as i64)
            .bind(text_hash(text))
            .bind(vec_to_blob(&record.values))
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(records.len())
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<QueryMatch>> {
        if let Some((dims, model)) = self.stored_shape().await? {
            if dims != vector.len() {
                bail!(
                    "Query vector has {} dimensions but the store holds {}-dimensional vectors from model {}",
                    vector.len(),
                    dims,
                    model
                );
            }
        }

        let rows = sqlx::query("SELECT id, metadata_json, embedding FROM vectors")
            .fetch_all(&self.pool)
            .await?;

        let mut matches = Vec::with_capacity(rows.len());
        for row in &rows {
            let blob: Vec<u8> = row.get("embedding");
            let metadata_json: String = row.get("metadata_json");
            let metadata: Map<String, Value> = serde_json::from_str(&metadata_json)
                .context("Corrupt metadata in vector store")?;

            matches.push(QueryMatch {
                id: row.get("id"),
                score: cosine_similarity(vector, &blob_to_vec(&blob)),
                metadata,
            });
        }

        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        matches.truncate(top_k);
        Ok(matches)
    }
}
