//! SQLite-backed document store.
//!
//! Holds the full text of every ingested paper, keyed by document id.
//! Lookups are point reads; random sampling backs the retrieval fallback.

use std::path::PathBuf;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};

use super::{DocKey, DocumentRecord, DocumentStore};
use crate::core::config::AppPaths;
use crate::core::errors::ApiError;

const SELECT_COLUMNS: &str = "SELECT doc_id, filename, content FROM documents";

pub struct SqliteDocumentStore {
    pool: SqlitePool,
    #[allow(dead_code)]
    db_path: PathBuf,
}

impl SqliteDocumentStore {
    pub async fn new(paths: &AppPaths) -> Result<Self, ApiError> {
        Self::with_path(paths.db_path.clone()).await
    }

    /// Open (or create) a store at an explicit path.
    pub async fn with_path(db_path: PathBuf) -> Result<Self, ApiError> {
        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(ApiError::internal)?;

        let store = Self { pool, db_path };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), ApiError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS documents (
                doc_id TEXT PRIMARY KEY,
                filename TEXT NOT NULL DEFAULT '',
                content TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        Ok(())
    }

    /// Point read with the key bound in its raw form.
    async fn fetch_raw(&self, key: &DocKey) -> Result<Option<DocumentRecord>, ApiError> {
        let query = format!("{} WHERE doc_id = ?1", SELECT_COLUMNS);
        let row = match key {
            DocKey::Int(n) => sqlx::query(&query).bind(*n).fetch_optional(&self.pool),
            DocKey::Text(s) => sqlx::query(&query).bind(s).fetch_optional(&self.pool),
        }
        .await
        .map_err(ApiError::internal)?;

        Ok(row.as_ref().map(row_to_record))
    }

    /// Point read with the key cast to its canonical string form.
    async fn fetch_canonical(&self, key: &DocKey) -> Result<Option<DocumentRecord>, ApiError> {
        let query = format!("{} WHERE doc_id = ?1", SELECT_COLUMNS);
        let row = sqlx::query(&query)
            .bind(key.canonical())
            .fetch_optional(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        Ok(row.as_ref().map(row_to_record))
    }

    /// Single query matching either form.
    async fn fetch_either(&self, key: &DocKey) -> Result<Option<DocumentRecord>, ApiError> {
        let query = format!("{} WHERE doc_id IN (?1, ?2)", SELECT_COLUMNS);
        let builder = match key {
            DocKey::Int(n) => sqlx::query(&query).bind(*n),
            DocKey::Text(s) => sqlx::query(&query).bind(s),
        };
        let row = builder
            .bind(key.canonical())
            .fetch_optional(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        Ok(row.as_ref().map(row_to_record))
    }
}

fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> DocumentRecord {
    let doc_id: String = row.get("doc_id");
    DocumentRecord {
        key: DocKey::Text(doc_id),
        filename: row.get("filename"),
        content: row.get("content"),
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn resolve(&self, key: &DocKey) -> Result<Option<DocumentRecord>, ApiError> {
        // The index and the store were written by independent ingestion
        // runs, so the key may be typed differently on each side. Probe the
        // raw form, the string-cast form, then both at once, short-circuiting
        // on the first hit.
        if let Some(record) = self.fetch_raw(key).await? {
            return Ok(Some(record));
        }
        if let Some(record) = self.fetch_canonical(key).await? {
            return Ok(Some(record));
        }
        if let Some(record) = self.fetch_either(key).await? {
            return Ok(Some(record));
        }

        tracing::debug!("Document {} not found under any key form", key);
        Ok(None)
    }

    async fn sample(&self, n: usize) -> Result<Vec<DocumentRecord>, ApiError> {
        if n == 0 {
            return Ok(Vec::new());
        }

        let query = format!("{} ORDER BY RANDOM() LIMIT ?1", SELECT_COLUMNS);
        let rows = sqlx::query(&query)
            .bind(n as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        Ok(rows.iter().map(row_to_record).collect())
    }

    async fn count(&self) -> Result<usize, ApiError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        Ok(count as usize)
    }

    async fn insert(&self, record: DocumentRecord) -> Result<(), ApiError> {
        // Keys are always written in canonical string form; the multi-form
        // probe in `resolve` covers corpora written before this rule.
        sqlx::query(
            "INSERT OR REPLACE INTO documents (doc_id, filename, content)
             VALUES (?1, ?2, ?3)",
        )
        .bind(record.key.canonical())
        .bind(&record.filename)
        .bind(&record.content)
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store() -> (tempfile::TempDir, SqliteDocumentStore) {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = SqliteDocumentStore::with_path(tmp.path().join("documents.db"))
            .await
            .expect("store");
        (tmp, store)
    }

    fn record(key: DocKey, filename: &str, content: &str) -> DocumentRecord {
        DocumentRecord {
            key,
            filename: filename.to_string(),
            content: content.to_string(),
        }
    }

    #[tokio::test]
    async fn insert_and_resolve() {
        let (_tmp, store) = test_store().await;

        store
            .insert(record(DocKey::from("paper-1"), "a.pdf", "text"))
            .await
            .unwrap();

        let found = store.resolve(&DocKey::from("paper-1")).await.unwrap();
        assert_eq!(found.unwrap().filename, "a.pdf");
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn integer_key_resolves_string_stored_document() {
        let (_tmp, store) = test_store().await;

        store
            .insert(record(DocKey::from("42"), "b.pdf", "text"))
            .await
            .unwrap();

        let found = store.resolve(&DocKey::Int(42)).await.unwrap();
        assert_eq!(found.expect("record").filename, "b.pdf");
    }

    #[tokio::test]
    async fn missing_key_is_none_not_error() {
        let (_tmp, store) = test_store().await;
        let found = store.resolve(&DocKey::Int(7)).await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn sample_is_bounded_by_store_size() {
        let (_tmp, store) = test_store().await;

        assert!(store.sample(3).await.unwrap().is_empty());

        for i in 0..2 {
            store
                .insert(record(DocKey::Int(i), "f.pdf", "text"))
                .await
                .unwrap();
        }

        assert_eq!(store.sample(3).await.unwrap().len(), 2);
        assert_eq!(store.sample(1).await.unwrap().len(), 1);
        assert!(store.sample(0).await.unwrap().is_empty());
    }
}
