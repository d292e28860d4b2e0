//! Vector store abstraction.
//!
//! The [`VectorStore`] trait covers the two operations every pipeline needs
//! (upsert and nearest-neighbour query), with two backends:
//!
//! | Backend | Where vectors live |
//! |---------|--------------------|
//! | [`pinecone::PineconeIndex`] | A Pinecone Local index, over its REST data plane |
//! | [`sqlite::SqliteStore`] | A SQLite file inside a persist directory |
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod pinecone;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{QueryMatch, VectorRecord};

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or replace records by id. Returns the number written.
    async fn upsert(&self, records: &[VectorRecord]) -> Result<usize>;

    /// Return up to `top_k` matches for `vector`, best first.
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<QueryMatch>>;
}
