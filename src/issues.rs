//! Issue documents and the on-disk index build.
//!
//! Turns each pulled GitHub issue into a readable text document with
//! string metadata, splits it into chunks, embeds the chunks and writes them
//! to a [`SqliteStore`] under `issues.persist_dir`.

use anyhow::{bail, Context, Result};
use serde_json::{Map, Value};
use std::path::Path;

use crate::chunk::split_text;
use crate::config::Config;
use crate::embedding::{create_provider, embed_each};
use crate::models::{Issue, IssueDocument, VectorRecord};
use crate::store::sqlite::SqliteStore;
use crate::store::VectorStore;

/// Render an issue as text plus metadata.
pub fn issue_content(issue: &Issue) -> IssueDocument {
    let or_unknown = |v: Option<String>| v.unwrap_or_else(|| "unknown".to_string());

    let mut content = format!(
        "Title: {}\n\n",
        issue.title.as_deref().unwrap_or("No title")
    );

    if let Some(body) = issue.body.as_deref().filter(|b| !b.is_empty()) {
        content.push_str(&format!("Description: {}\n\n", body));
    }

    content.push_str(&format!("State: {}\n", or_unknown(issue.state.clone())));
    content.push_str(&format!(
        "Issue Number: {}\n",
        or_unknown(issue.number.map(|n| n.to_string()))
    ));
    content.push_str(&format!("Created: {}\n", or_unknown(issue.created_at.clone())));
    content.push_str(&format!("Updated: {}\n", or_unknown(issue.updated_at.clone())));

    if !issue.labels.is_empty() {
        let names: Vec<&str> = issue
            .labels
            .iter()
            .map(|l| l.name.as_deref().unwrap_or(""))
            .collect();
        content.push_str(&format!("Labels: {}\n", names.join(", ")));
    }

    content.push_str(&format!("URL: {}", issue.html_url.as_deref().unwrap_or("")));

    let text = |v: &Option<String>| Value::from(v.clone().unwrap_or_default());
    let mut metadata = Map::new();
    metadata.insert(
        "issue_id".into(),
        Value::from(issue.id.map(|n| n.to_string()).unwrap_or_default()),
    );
    metadata.insert(
        "issue_number".into(),
        Value::from(issue.number.map(|n| n.to_string()).unwrap_or_default()),
    );
    metadata.insert("title".into(), text(&issue.title));
    metadata.insert("state".into(), text(&issue.state));
    metadata.insert("url".into(), text(&issue.html_url));
    metadata.insert("created_at".into(), text(&issue.created_at));
    metadata.insert("updated_at".into(), text(&issue.updated_at));

    IssueDocument { content, metadata }
}

/// Parse the pulled issues file.
pub fn load_issues(path: &Path) -> Result<Vec<Issue>> {
    if !path.exists() {
        bail!(
            "The file {} does not exist. Please check the path.",
            path.display()
        );
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let issues: Vec<Issue> = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(issues)
}

/// Build documents for the first `limit` issues (all when `None`).
pub fn build_documents(issues: &[Issue], limit: Option<usize>) -> Vec<IssueDocument> {
    let take = limit.unwrap_or(issues.len()).min(issues.len());
    let mut docs = Vec::with_capacity(take);

    for (i, issue) in issues.iter().take(take).enumerate() {
        docs.push(issue_content(issue));
        if (i + 1) % 100 == 0 {
            println!("Processed {} / {} issues", i + 1, issues.len());
        }
    }
    docs
}

/// A chunk ready for embedding: id, text and metadata (including `text`).
#[derive(Debug, Clone)]
pub struct IssueChunk {
    pub id: String,
    pub text: String,
    pub metadata: Map<String, Value>,
}

/// Split every document; chunk ids are `<issue_id>-<chunk_index>`.
pub fn chunk_documents(config: &Config, docs: &[IssueDocument]) -> Vec<IssueChunk> {
    let mut chunks = Vec::new();

    for (doc_index, doc) in docs.iter().enumerate() {
        let key = match doc.issue_id() {
            "" => format!("doc{}", doc_index),
            id => id.to_string(),
        };
        let pieces = split_text(
            &doc.content,
            config.chunking.chunk_size,
            config.chunking.chunk_overlap,
        );
        for (i, piece) in pieces.into_iter().enumerate() {
            let mut metadata = doc.metadata.clone();
            metadata.insert("text".into(), Value::from(piece.as_str()));
            chunks.push(IssueChunk {
                id: format!("{}-{}", key, i),
                text: piece,
                metadata,
            });
        }
    }
    chunks
}

async fn build_store(config: &Config, chunks: Vec<IssueChunk>) -> Result<()> {
    let provider = create_provider(&config.embedding, &config.ollama)?;
    tracing::info!(
        model = provider.model_name(),
        chunks = chunks.len(),
        "embedding issue chunks"
    );

    println!("\n--- Creating embeddings ---");
    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let vectors = embed_each(provider.as_ref(), &texts, config.embedding.batch_size).await;

    let records: Vec<VectorRecord> = chunks
        .into_iter()
        .zip(vectors)
        .filter_map(|(chunk, vector)| {
            Some(VectorRecord {
                id: chunk.id,
                values: vector.filter(|v| !v.is_empty())?,
                metadata: chunk.metadata,
            })
        })
        .collect();
    println!("\n--- Finished creating embeddings ---");

    if records.is_empty() {
        bail!("No embeddings were created; is Ollama running?");
    }

    tracing::info!(records = records.len(), dims = provider.dims(), "embeddings ready");
    println!("\n--- Creating vector store ---");
    let store = SqliteStore::open(&config.issues.persist_dir, provider.model_name()).await?;
    let result = store.upsert(&records).await;
    store.close().await;
    let written = result?;
    tracing::info!(written, dir = %config.issues.persist_dir.display(), "vector store created");
    println!("\n--- Finished creating vector store ---");
    Ok(())
}

/// CLI entry point for `panda issues index`.
pub async fn run_index(config: &Config) -> Result<()> {
    let persist_dir = &config.issues.persist_dir;
    if SqliteStore::exists(persist_dir) {
        println!("Vector store already exists. No need to initialize.");
        return Ok(());
    }

    println!("Persistent directory does not exist. Initializing vector store...");
    let issues = load_issues(&config.issues.file)?;
    println!("Length of issues {}", issues.len());

    let docs = build_documents(&issues, config.issues.limit);
    let Some(first) = docs.first() else {
        bail!("No issues to index in {}", config.issues.file.display());
    };

    println!("\n--- Document Chunks Information ---");
    println!("Number of document chunks: {}", docs.len());
    println!("Sample chunk:\n{}\n", first.content);

    let chunks = chunk_documents(config, &docs);
    tracing::debug!(documents = docs.len(), chunks = chunks.len(), "issues chunked");

    if let Err(e) = build_store(config, chunks).await {
        if persist_dir.exists() {
            let _ = std::fs::remove_dir_all(persist_dir);
        }
        return Err(e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Label;
    use serde_json::json;

    fn full_issue() -> Issue {
        Issue {
            id: Some(123456),
            number: Some(42),
            title: Some("Redis connection refused".into()),
            body: Some("Core cannot reach redis:6379".into()),
            state: Some("open".into()),
            created_at: Some("2024-01-02T03:04:05Z".into()),
            updated_at: Some("2024-02-03T04:05:06Z".into()),
            labels: vec![
                Label {
                    name: Some("kind/bug".into()),
                },
                Label {
                    name: Some("area/redis".into()),
                },
            ],
            html_url: Some("https://github.com/goharbor/harbor/issues/42".into()),
        }
    }

    #[test]
    fn test_issue_content_full() {
        let doc = issue_content(&full_issue());
        assert_eq!(
            doc.content,
            "Title: Redis connection refused\n\n\
             Description: Core cannot reach redis:6379\n\n\
             State: open\n\
             Issue Number: 42\n\
             Created: 2024-01-02T03:04:05Z\n\
             Updated: 2024-02-03T04:05:06Z\n\
             Labels: kind/bug, area/redis\n\
             URL: https://github.com/goharbor/harbor/issues/42"
        );
    }

    #[test]
    fn test_issue_content_missing_fields() {
        let doc = issue_content(&Issue::default());
        assert_eq!(
            doc.content,
            "Title: No title\n\n\
             State: unknown\n\
             Issue Number: unknown\n\
             Created: unknown\n\
             Updated: unknown\n\
             URL: "
        );
        assert!(doc.metadata.values().all(|v| v.as_str() == Some("")));
    }

    #[test]
    fn test_empty_body_is_omitted() {
        let mut issue = full_issue();
        issue.body = Some(String::new());
        assert!(!issue_content(&issue).content.contains("Description"));
    }

    #[test]
    fn test_metadata_order_and_values() {
        let doc = issue_content(&full_issue());
        let keys: Vec<&str> = doc.metadata.keys().map(|k| k.as_str()).collect();
        assert_eq!(
            keys,
            vec![
                "issue_id",
                "issue_number",
                "title",
                "state",
                "url",
                "created_at",
                "updated_at"
            ]
        );
        assert_eq!(doc.metadata["issue_id"], json!("123456"));
        assert_eq!(doc.metadata["issue_number"], json!("42"));
        assert_eq!(doc.issue_id(), "123456");
    }

    #[test]
    fn test_issue_parses_from_github_json() {
        let raw = json!({
            "id": 7,
            "number": 3,
            "title": "t",
            "body": null,
            "labels": [{ "name": "x", "color": "fff" }],
            "user": { "login": "someone" }
        });
        let issue: Issue = serde_json::from_value(raw).unwrap();
        assert_eq!(issue.id, Some(7));
        assert!(issue.body.is_none());
        assert_eq!(issue.labels[0].name.as_deref(), Some("x"));
    }

    #[test]
    fn test_build_documents_honours_limit() {
        let issues = vec![full_issue(), Issue::default(), full_issue()];
        assert_eq!(build_documents(&issues, Some(2)).len(), 2);
        assert_eq!(build_documents(&issues, None).len(), 3);
        assert_eq!(build_documents(&issues, Some(10)).len(), 3);
    }

    #[test]
    fn test_chunk_ids_and_metadata() {
        let mut config = Config::default();
        config.chunking.chunk_size = 60;
        config.chunking.chunk_overlap = 0;

        let docs = vec![issue_content(&full_issue())];
        let chunks = chunk_documents(&config, &docs);

        assert!(chunks.len() > 1);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.id, format!("123456-{}", i));
            assert_eq!(chunk.metadata["text"], json!(chunk.text));
            assert_eq!(chunk.metadata["issue_number"], json!("42"));
            assert!(chunk.text.chars().count() <= 60);
        }
    }

    #[test]
    fn test_load_issues_missing_file_message() {
        let err = load_issues(Path::new("/nonexistent/issues.json")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "The file /nonexistent/issues.json does not exist. Please check the path."
        );
    }
}
