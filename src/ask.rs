//! Similarity search over the on-disk issue store.
//!
//! The store holds chunks, but answers are issues: the query asks for
//! `candidate_k` chunk matches, keeps the best-scoring chunk of each issue,
//! then cuts the list to `k`.

use anyhow::{bail, Result};
use serde_json::{Map, Value};
use std::collections::HashSet;

use crate::config::Config;
use crate::embedding::{create_provider, embed_query};
use crate::models::QueryMatch;
use crate::store::sqlite::SqliteStore;
use crate::store::VectorStore;

/// How matches are selected.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SearchKind {
    /// The `k` most similar issues.
    Similarity { k: usize },
    /// Up to `k` issues scoring at least `threshold`.
    ScoreThreshold { k: usize, threshold: f32 },
}

impl SearchKind {
    pub fn k(&self) -> usize {
        match *self {
            SearchKind::Similarity { k } | SearchKind::ScoreThreshold { k, .. } => k,
        }
    }

    fn admits(&self, score: f32) -> bool {
        match *self {
            SearchKind::Similarity { .. } => true,
            SearchKind::ScoreThreshold { threshold, .. } => score >= threshold,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RelevantDocument {
    pub id: String,
    pub score: f32,
    pub metadata: Map<String, Value>,
}

/// Collapse chunk matches (best first) into one per issue, keeping order.
pub fn select_documents(matches: Vec<QueryMatch>, kind: SearchKind) -> Vec<RelevantDocument> {
    let mut seen = HashSet::new();
    let mut docs = Vec::new();

    for m in matches {
        if docs.len() >= kind.k() {
            break;
        }
        if !kind.admits(m.score) {
            continue;
        }
        let key = match m.metadata.get("issue_id").and_then(Value::as_str) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => m.id.clone(),
        };
        if !seen.insert(key) {
            continue;
        }
        docs.push(RelevantDocument {
            id: m.id,
            score: m.score,
            metadata: m.metadata,
        });
    }
    docs
}

/// `<key>: <value>` lines for every metadata field except `text`.
pub fn metadata_lines(metadata: &Map<String, Value>) -> Vec<String> {
    metadata
        .iter()
        .filter(|(key, _)| key.as_str() != "text")
        .map(|(key, value)| match value {
            Value::String(s) => format!("{}: {}", key, s),
            other => format!("{}: {}", key, other),
        })
        .collect()
}

/// Query the store under `issues.persist_dir`, printing the matches.
///
/// Returns `None` (without embedding anything) when the store is missing.
/// The store is opened as-is: asking never creates or migrates it.
pub async fn query_vector_store(
    config: &Config,
    store_name: &str,
    query: &str,
    kind: SearchKind,
) -> Result<Option<Vec<RelevantDocument>>> {
    let persist_dir = &config.issues.persist_dir;
    let existing = if SqliteStore::exists(persist_dir) {
        SqliteStore::open_existing(persist_dir, config.embedding_model()).await?
    } else {
        None
    };
    let Some(store) = existing else {
        println!("Vector store {} does not exist.", store_name);
        return Ok(None);
    };

    println!("\n--- Querying the Vector Store {} ---", store_name);
    let result = async {
        let provider = create_provider(&config.embedding, &config.ollama)?;
        let vector = embed_query(provider.as_ref(), query).await?;
        let candidate_k = config.issues.candidate_k.max(kind.k());
        store.query(&vector, candidate_k).await
    }
    .await;
    store.close().await;
    let matches = result?;
    tracing::debug!(candidates = matches.len(), ?kind, "store queried");

    let docs = select_documents(matches, kind);

    println!("\n--- Relevant Documents for {} ---", store_name);
    for doc in &docs {
        if doc.metadata.is_empty() {
            continue;
        }
        for line in metadata_lines(&doc.metadata) {
            println!("{}", line);
        }
    }

    Ok(Some(docs))
}

/// Display name for the store: the persist directory's final component.
pub fn store_name(config: &Config) -> String {
    config
        .issues
        .persist_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| config.issues.persist_dir.display().to_string())
}

/// CLI entry point for `panda issues ask`.
pub async fn run_ask(
    config: &Config,
    query: Option<&str>,
    k: Option<usize>,
    score_threshold: Option<f32>,
) -> Result<()> {
    let query = query.unwrap_or(&config.issues.query);
    let k = k.unwrap_or(config.issues.k);
    if k == 0 {
        bail!("k must be greater than 0");
    }
    let kind = match score_threshold {
        Some(threshold) => SearchKind::ScoreThreshold { k, threshold },
        None => SearchKind::Similarity { k },
    };

    println!("\n--- Using Similarity Search ---");
    query_vector_store(config, &store_name(config), query, kind).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn chunk(id: &str, issue_id: &str, score: f32) -> QueryMatch {
        let mut metadata = Map::new();
        metadata.insert("issue_id".into(), json!(issue_id));
        metadata.insert("title".into(), json!(format!("issue {}", issue_id)));
        metadata.insert("text".into(), json!("chunk text"));
        QueryMatch {
            id: id.to_string(),
            score,
            metadata,
        }
    }

    #[test]
    fn test_keeps_best_chunk_per_issue() {
        let matches = vec![
            chunk("1-2", "1", 0.9),
            chunk("1-0", "1", 0.8),
            chunk("2-0", "2", 0.7),
            chunk("3-0", "3", 0.6),
        ];
        let docs = select_documents(matches, SearchKind::Similarity { k: 2 });
        let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["1-2", "2-0"]);
    }

    #[test]
    fn test_score_threshold_filters() {
        let matches = vec![chunk("1-0", "1", 0.9), chunk("2-0", "2", 0.3)];
        let docs = select_documents(
            matches,
            SearchKind::ScoreThreshold {
                k: 5,
                threshold: 0.5,
            },
        );
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "1-0");
    }

    #[test]
    fn test_missing_issue_id_groups_by_chunk_id() {
        let mut a = chunk("a", "", 0.9);
        a.metadata.remove("issue_id");
        let b = chunk("b", "", 0.8);
        let docs = select_documents(vec![a, b], SearchKind::Similarity { k: 5 });
        assert_eq!(docs.len(), 2);
    }

    #[test]
    fn test_metadata_lines_skip_text_and_keep_order() {
        let m = chunk("1-0", "1", 0.9);
        assert_eq!(
            metadata_lines(&m.metadata),
            vec!["issue_id: 1", "title: issue 1"]
        );
    }

    #[test]
    fn test_store_name_is_last_component() {
        assert_eq!(store_name(&Config::default()), "goharbor-issues-open");
    }

    #[tokio::test]
    async fn test_missing_store_returns_none() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut config = Config::default();
        config.issues.persist_dir = tmp.path().join("absent");
        // Unroutable host: any embedding call would fail the test.
        config.ollama.host = "http://127.0.0.1:9".to_string();

        let result = query_vector_store(&config, "absent", "q", SearchKind::Similarity { k: 1 })
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_empty_persist_dir_is_left_untouched() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut config = Config::default();
        config.issues.persist_dir = tmp.path().to_path_buf();
        config.ollama.host = "http://127.0.0.1:9".to_string();

        let result = query_vector_store(&config, "empty", "q", SearchKind::Similarity { k: 1 })
            .await
            .unwrap();
        assert!(result.is_none());
        assert!(!SqliteStore::db_path(tmp.path()).exists());
    }
}
