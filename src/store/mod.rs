//! Document store — key-value lookup of full paper records.
//!
//! The vector index and the document store were populated by separate
//! ingestion runs and may disagree on how a document's key is typed
//! (integer vs. string). `DocKey` makes both representations explicit and
//! `canonical()` gives the string form used for reconciliation.

mod sqlite;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::errors::ApiError;

pub use sqlite::SqliteDocumentStore;

/// A document identifier as it appears in either storage system.
///
/// Untagged so a serialized identifier array may freely mix integers and
/// strings; `42` and `"42"` name the same logical document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DocKey {
    Int(i64),
    Text(String),
}

impl DocKey {
    /// Canonical string form; the representation both stores agree on.
    pub fn canonical(&self) -> String {
        match self {
            DocKey::Int(n) => n.to_string(),
            DocKey::Text(s) => s.clone(),
        }
    }
}

impl fmt::Display for DocKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

impl From<i64> for DocKey {
    fn from(n: i64) -> Self {
        DocKey::Int(n)
    }
}

impl From<&str> for DocKey {
    fn from(s: &str) -> Self {
        DocKey::Text(s.to_string())
    }
}

/// A full document record as held by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub key: DocKey,
    pub filename: String,
    pub content: String,
}

/// Abstract interface for the document store backend.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Look up a record by key, tolerating type mismatches between the
    /// index's key representation and the store's primary key. Absence is
    /// `Ok(None)`; callers skip the hit rather than failing the retrieval.
    async fn resolve(&self, key: &DocKey) -> Result<Option<DocumentRecord>, ApiError>;

    /// Sample up to `n` records uniformly at random.
    async fn sample(&self, n: usize) -> Result<Vec<DocumentRecord>, ApiError>;

    /// Total number of records.
    async fn count(&self) -> Result<usize, ApiError>;

    /// Insert or replace a record (corpus loading and tests).
    async fn insert(&self, record: DocumentRecord) -> Result<(), ApiError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_form_agrees_across_representations() {
        assert_eq!(DocKey::Int(42).canonical(), "42");
        assert_eq!(DocKey::Text("42".to_string()).canonical(), "42");
        assert_ne!(DocKey::Int(42), DocKey::Text("42".to_string()));
    }

    #[test]
    fn keys_deserialize_untagged() {
        let keys: Vec<DocKey> = serde_json::from_str(r#"[7, "paper-7"]"#).expect("parse");
        assert_eq!(keys, vec![DocKey::Int(7), DocKey::from("paper-7")]);
    }
}
