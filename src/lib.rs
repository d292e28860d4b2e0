//! # panda-rag
//!
//! Small retrieval-augmented pipelines around a local Ollama server.
//!
//! Three workflows share one configuration, one embedding client and one
//! vector-store trait:
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌────────────────┐
//! │ CSV file │──▶│  Chunk   │──▶│ Pinecone Local │
//! └──────────┘   │ + Embed  │   └────────────────┘
//! ┌──────────┐   │ (Ollama) │   ┌────────────────┐
//! │  GitHub  │──▶│          │──▶│ SQLite on disk │
//! │  issues  │   └──────────┘   └────────────────┘
//! └──────────┘
//!          ┌────────────────────────┐
//!          │ Terminal chat (Ollama) │
//!          └────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! panda chat                    # talk to the model
//! panda csv                     # index res/my-data.csv, then ask
//! panda issues pull             # download GitHub issues
//! panda issues index            # embed them into db/
//! panda issues ask "Redis connection?"
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration, env overrides, validation |
//! | [`models`] | Core data types |
//! | [`chunk`] | Recursive character text splitter |
//! | [`embedding`] | Ollama embeddings and vector helpers |
//! | [`ollama`] | Chat completion and model listing |
//! | [`chat`] | Interactive chatbot and summary table |
//! | [`store`] | Vector store trait, Pinecone Local and SQLite backends |
//! | [`vdb`] | CSV → Pinecone Local pipeline |
//! | [`github`] | GitHub issue puller |
//! | [`issues`] | Issue documents and index build |
//! | [`ask`] | Similarity search over the issue store |
//! | [`telemetry`] | `tracing` subscriber setup |
//! | [`db`] | SQLite connection |
//! | [`migrate`] | Schema migrations |

pub mod ask;
pub mod chat;
pub mod chunk;
pub mod config;
pub mod db;
pub mod embedding;
pub mod github;
pub mod issues;
pub mod migrate;
pub mod models;
pub mod ollama;
pub mod store;
pub mod telemetry;
pub mod vdb;
