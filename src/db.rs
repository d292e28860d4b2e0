//! SQLite connection pool for the on-disk vector store.

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

/// Connect to the store file at `db_path` in WAL mode.
///
/// With `create` the file (and its parent directory) is created when
/// missing; without it a missing file is an error.
pub async fn connect(db_path: &Path, create: bool) -> Result<SqlitePool> {
    if create {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .create_if_missing(create)
        .journal_mode(SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to open vector store at {}", db_path.display()))?;

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_connect_creates_parent_and_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("db").join("store.sqlite");
        let pool = connect(&path, true).await.unwrap();
        assert!(path.exists());
        pool.close().await;
    }

    #[tokio::test]
    async fn test_connect_without_create_names_missing_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("store.sqlite");
        let err = connect(&path, false).await.unwrap_err();
        assert!(err.to_string().contains("store.sqlite"));
        assert!(!path.exists());
    }
}
