//! CSV → Pinecone Local pipeline.
//!
//! Reads a CSV file line by line, splits each line into chunks, embeds them
//! with Ollama and upserts the vectors into a Pinecone Local index. After
//! indexing, an interactive prompt embeds each question and prints the
//! nearest chunks.

use anyhow::{Context, Result};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use serde_json::{Map, Value};
use std::path::Path;
use std::time::Duration;

use crate::chat::PROMPT;
use crate::chunk::split_text;
use crate::config::Config;
use crate::embedding::{create_provider, embed_each, embed_query, EmbeddingProvider};
use crate::models::{QueryMatch, VectorRecord};
use crate::store::pinecone::PineconeIndex;
use crate::store::VectorStore;

/// Every line of the file, trimmed. Blank lines are kept.
pub fn load_lines(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(content.lines().map(|l| l.trim().to_string()).collect())
}

/// Split each line with the configured chunk size and overlap.
pub fn split_lines(config: &Config, lines: &[String]) -> Vec<String> {
    lines
        .iter()
        .flat_map(|line| {
            split_text(
                line,
                config.chunking.chunk_size,
                config.chunking.chunk_overlap,
            )
        })
        .collect()
}

/// Embed `chunks` and build upsert records.
///
/// Ids are `doc_{i}` with `i` the chunk's position in `chunks`, so a chunk
/// whose embedding failed leaves a gap rather than shifting later ids.
pub async fn build_records(
    config: &Config,
    provider: &dyn EmbeddingProvider,
    chunks: &[String],
) -> Vec<VectorRecord> {
    let vectors = embed_each(provider, chunks, config.embedding.batch_size).await;

    chunks
        .iter()
        .zip(vectors)
        .enumerate()
        .filter_map(|(i, (text, vector))| {
            let values = vector.filter(|v| !v.is_empty())?;
            let mut metadata = Map::new();
            metadata.insert("text".to_string(), Value::from(text.as_str()));
            metadata.insert(
                "source".to_string(),
                Value::from(config.pinecone.source_tag.as_str()),
            );
            Some(VectorRecord {
                id: format!("doc_{}", i),
                values,
                metadata,
            })
        })
        .collect()
}

/// Load, split, embed and upsert the CSV file. An upsert failure is
/// printed, not returned.
pub async fn index_csv(
    config: &Config,
    provider: &dyn EmbeddingProvider,
    store: &dyn VectorStore,
) -> Result<usize> {
    let lines = load_lines(&config.csv.path)?;
    let chunks = split_lines(config, &lines);
    tracing::info!(
        lines = lines.len(),
        chunks = chunks.len(),
        model = provider.model_name(),
        "csv loaded"
    );

    let records = build_records(config, provider, &chunks).await;
    tracing::debug!(dims = provider.dims(), "csv embedded");

    let written = match store.upsert(&records).await {
        Ok(_) => {
            println!(
                "Successfully upserted {} vectors to Pinecone Local.",
                records.len()
            );
            records.len()
        }
        Err(e) => {
            println!("Error upserting to Pinecone Local: {:#}", e);
            0
        }
    };

    tokio::time::sleep(Duration::from_secs(config.pinecone.settle_secs)).await;
    Ok(written)
}

/// Embed `text` and fetch the `top_k` nearest records. Failures are printed
/// and yield `None`.
pub async fn query(
    config: &Config,
    provider: &dyn EmbeddingProvider,
    store: &dyn VectorStore,
    text: &str,
) -> Option<Vec<QueryMatch>> {
    let result = async {
        let vector = embed_query(provider, text).await?;
        store.query(&vector, config.pinecone.top_k).await
    }
    .await;

    match result {
        Ok(matches) => Some(matches),
        Err(e) => {
            println!("Error querying Pinecone Local: {:#}", e);
            None
        }
    }
}

pub fn format_match(m: &QueryMatch) -> String {
    format!("  ID: {}, Score: {}, Text: {}", m.id, m.score, m.text())
}

fn print_results(results: Option<Vec<QueryMatch>>) {
    match results {
        Some(matches) => {
            println!("🌰: {}", matches.len());
            for m in &matches {
                println!("{}", format_match(m));
            }
        }
        None => {
            println!("🌰: ");
            println!("No query results found.");
        }
    }
}

fn connect(config: &Config) -> Result<PineconeIndex> {
    println!("Initializing Pinecone Local client...");
    let index = PineconeIndex::new(&config.pinecone)?;
    tracing::debug!(
        host = %config.pinecone.host,
        index = %config.pinecone.index_name,
        namespace = %index.namespace(),
        "pinecone client ready"
    );
    println!("Pinecone Local client initialized.");
    Ok(index)
}

/// CLI entry point for `panda csv`.
pub async fn run_csv(config: &Config, skip_index: bool) -> Result<()> {
    let index = connect(config)?;
    let provider = create_provider(&config.embedding, &config.ollama)?;

    if !skip_index {
        index_csv(config, provider.as_ref(), &index).await?;
        match index.describe_stats().await {
            Ok(stats) => {
                println!(
                    "Namespace {} holds {} vectors ({} dimensions).",
                    index.namespace(),
                    stats.namespace_vector_count,
                    stats.dimension
                );
                tracing::info!(total = stats.total_vector_count, "index stats");
            }
            Err(e) => tracing::debug!(error = %e, "describe_index_stats unavailable"),
        }
    }

    let mut editor = DefaultEditor::new()?;
    while let Some(line) = next_query(editor.readline(PROMPT)) {
        let _ = editor.add_history_entry(line.as_str());
        print_results(query(config, provider.as_ref(), &index, &line).await);
    }

    Ok(())
}

/// The next question to run, or `None` once the loop should stop: on
/// `exit`, Ctrl-C, end of input, or a terminal error.
fn next_query(read: rustyline::Result<String>) -> Option<String> {
    match read {
        Ok(line) if line.trim().to_lowercase() == "exit" => None,
        Ok(line) => Some(line),
        Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
            println!("Bye...");
            None
        }
        Err(e) => {
            println!("Error occurred: {}", e);
            None
        }
    }
}

/// CLI entry point for `panda csv-query`: one query, no prompt, no indexing.
pub async fn run_csv_query(config: &Config, text: &str) -> Result<()> {
    let index = connect(config)?;
    let provider = create_provider(&config.embedding, &config.ollama)?;
    print_results(query(config, provider.as_ref(), &index, text).await);
    Ok(())
}
