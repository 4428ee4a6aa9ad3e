//! Context retrieval orchestration.
//!
//! One query flows through: embed → normalize → nearest-neighbor search →
//! per-hit document resolution → snippet extraction. Individual bad hits are
//! skipped; a completely failed retrieval degrades to a random sample so the
//! caller never gets an error from this operation.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::snippet::{extract_snippet, SNIPPET_MAX_LEN};
use crate::core::errors::ApiError;
use crate::index::{l2_normalize, VectorIndex};
use crate::llm::LlmProvider;
use crate::store::{DocKey, DocumentStore};

/// How many random documents to return when retrieval yields nothing.
const FALLBACK_SAMPLE_SIZE: usize = 3;

/// Placeholder relevance score for fallback-sampled items.
const FALLBACK_SCORE: f32 = 0.5;

/// One retrieved excerpt plus metadata, ready for prompt assembly.
///
/// Ordering across a returned list is retrieval order (the index's native
/// similarity ordering), not necessarily score-descending.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextItem {
    pub document_id: DocKey,
    pub filename: String,
    /// Snippet of at most [`SNIPPET_MAX_LEN`] characters.
    pub content: String,
    pub score: f32,
    /// True when this item came from the random-sample fallback rather than
    /// a genuine similarity hit.
    pub is_fallback: bool,
}

pub struct ContextRetriever {
    index: Arc<VectorIndex>,
    store: Arc<dyn DocumentStore>,
    llm: Arc<dyn LlmProvider>,
    embedding_model: String,
}

impl ContextRetriever {
    pub fn new(
        index: Arc<VectorIndex>,
        store: Arc<dyn DocumentStore>,
        llm: Arc<dyn LlmProvider>,
        embedding_model: String,
    ) -> Self {
        Self {
            index,
            store,
            llm,
            embedding_model,
        }
    }

    /// Retrieve at most `2 * top_k` context items for a query.
    ///
    /// This operation never fails: any error along the pipeline is logged
    /// and converted into an empty list.
    pub async fn retrieve_context(&self, query: &str, top_k: usize) -> Vec<ContextItem> {
        match self.try_retrieve(query, top_k).await {
            Ok(items) => {
                tracing::debug!("Retrieved {} context items", items.len());
                items
            }
            Err(err) => {
                tracing::error!("Context retrieval failed: {}", err);
                Vec::new()
            }
        }
    }

    async fn try_retrieve(&self, query: &str, top_k: usize) -> Result<Vec<ContextItem>, ApiError> {
        let mut embedding = self
            .llm
            .embed(&[query.to_string()], &self.embedding_model)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::Embedding("provider returned no embedding".to_string()))?;
        l2_normalize(&mut embedding)?;

        // Over-fetch to compensate for hits that fail resolution below.
        let hits = self.index.search(&embedding, top_k * 2)?;

        let mut items = Vec::new();
        for (score, position) in hits {
            let Some(key) = self.index.doc_key(position) else {
                tracing::warn!(
                    "Index position {} out of bounds for identifier array of length {}",
                    position,
                    self.index.len()
                );
                continue;
            };

            let Some(record) = self.store.resolve(key).await? else {
                match self.index.doc_info(key) {
                    Some(info) => {
                        tracing::debug!("Skipping unresolvable document {} ({})", key, info)
                    }
                    None => tracing::debug!("Skipping unresolvable document {}", key),
                }
                continue;
            };
            if record.content.is_empty() {
                tracing::debug!("Skipping empty document {}", key);
                continue;
            }

            items.push(ContextItem {
                document_id: key.clone(),
                filename: record.filename,
                content: extract_snippet(&record.content, query, SNIPPET_MAX_LEN),
                score,
                is_fallback: false,
            });
        }

        if items.is_empty() {
            items = self.fallback_sample().await?;
        }

        Ok(items)
    }

    /// Random-sample fallback: relevance is traded for "never return
    /// nothing" when retrieval fails corpus-wide (e.g. an identifier
    /// mismatch between the index and the store).
    async fn fallback_sample(&self) -> Result<Vec<ContextItem>, ApiError> {
        let sampled = self.store.sample(FALLBACK_SAMPLE_SIZE).await?;
        if sampled.is_empty() {
            return Ok(Vec::new());
        }

        tracing::warn!(
            "No candidates resolved; falling back to {} random documents",
            sampled.len()
        );

        Ok(sampled
            .into_iter()
            .map(|record| ContextItem {
                content: record.content.chars().take(SNIPPET_MAX_LEN).collect(),
                document_id: record.key,
                filename: record.filename,
                score: FALLBACK_SCORE,
                is_fallback: true,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use async_trait::async_trait;

    use super::*;
    use crate::index::FlatIndex;
    use crate::llm::{ChatRequest, LlmProvider};
    use crate::store::DocumentRecord;

    /// In-memory store keyed by canonical id.
    #[derive(Default)]
    struct MemStore {
        records: BTreeMap<String, DocumentRecord>,
    }

    impl MemStore {
        fn with(records: Vec<DocumentRecord>) -> Self {
            Self {
                records: records
                    .into_iter()
                    .map(|r| (r.key.canonical(), r))
                    .collect(),
            }
        }
    }

    #[async_trait]
    impl DocumentStore for MemStore {
        async fn resolve(&self, key: &DocKey) -> Result<Option<DocumentRecord>, ApiError> {
            Ok(self.records.get(&key.canonical()).cloned())
        }

        async fn sample(&self, n: usize) -> Result<Vec<DocumentRecord>, ApiError> {
            Ok(self.records.values().take(n).cloned().collect())
        }

        async fn count(&self) -> Result<usize, ApiError> {
            Ok(self.records.len())
        }

        async fn insert(&self, _record: DocumentRecord) -> Result<(), ApiError> {
            unimplemented!("not used in tests")
        }
    }

    /// Provider stub: fixed embedding, canned chat reply.
    struct StubLlm {
        embedding: Vec<f32>,
        fail: bool,
    }

    impl StubLlm {
        fn embedding(embedding: Vec<f32>) -> Self {
            Self {
                embedding,
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                embedding: Vec::new(),
                fail: true,
            }
        }
    }

    #[async_trait]
    impl LlmProvider for StubLlm {
        fn name(&self) -> &str {
            "stub"
        }

        async fn health_check(&self) -> Result<bool, ApiError> {
            Ok(!self.fail)
        }

        async fn chat(&self, _request: ChatRequest, _model_id: &str) -> Result<String, ApiError> {
            Ok("stub answer".to_string())
        }

        async fn embed(
            &self,
            inputs: &[String],
            _model_id: &str,
        ) -> Result<Vec<Vec<f32>>, ApiError> {
            if self.fail {
                return Err(ApiError::Embedding("stub failure".to_string()));
            }
            Ok(inputs.iter().map(|_| self.embedding.clone()).collect())
        }
    }

    fn record(key: DocKey, filename: &str, content: &str) -> DocumentRecord {
        DocumentRecord {
            key,
            filename: filename.to_string(),
            content: content.to_string(),
        }
    }

    fn axis_index(keys: Vec<DocKey>) -> Arc<VectorIndex> {
        // One axis-aligned unit vector per key, dimension = number of keys.
        let dim = keys.len();
        let mut data = vec![0.0f32; dim * dim];
        for i in 0..dim {
            data[i * dim + i] = 1.0;
        }
        let flat = FlatIndex::from_vectors(dim, data).expect("index");
        Arc::new(VectorIndex::from_parts(flat, keys).expect("vector index"))
    }

    fn retriever(
        index: Arc<VectorIndex>,
        store: MemStore,
        llm: StubLlm,
    ) -> ContextRetriever {
        ContextRetriever::new(index, Arc::new(store), Arc::new(llm), "embed-test".to_string())
    }

    #[tokio::test]
    async fn output_size_is_bounded_by_twice_top_k() {
        let keys: Vec<DocKey> = (0..6).map(DocKey::Int).collect();
        let store = MemStore::with(
            (0..6)
                .map(|i| record(DocKey::Int(i), "f.pdf", "employment data"))
                .collect(),
        );
        let r = retriever(
            axis_index(keys),
            store,
            StubLlm::embedding(vec![1.0, 0.5, 0.4, 0.3, 0.2, 0.1]),
        );

        let items = r.retrieve_context("employment", 2).await;
        assert!(items.len() <= 4);
        assert_eq!(items.len(), 4);
        assert!(items.iter().all(|item| !item.is_fallback));
    }

    #[tokio::test]
    async fn unresolved_and_empty_hits_are_skipped() {
        let keys = vec![DocKey::Int(0), DocKey::Int(1), DocKey::Int(2)];
        // Document 1 is missing from the store, document 2 has no content.
        let store = MemStore::with(vec![
            record(DocKey::Int(0), "kept.pdf", "employment outcomes improve"),
            record(DocKey::Int(2), "empty.pdf", ""),
        ]);
        let r = retriever(
            axis_index(keys),
            store,
            StubLlm::embedding(vec![1.0, 0.9, 0.8]),
        );

        let items = r.retrieve_context("employment", 5).await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].filename, "kept.pdf");
        assert!(!items[0].is_fallback);
    }

    #[tokio::test]
    async fn scores_reflect_the_normalized_query() {
        let keys = vec![DocKey::Int(0), DocKey::Int(1)];
        let store = MemStore::with(vec![
            record(DocKey::Int(0), "a.pdf", "text"),
            record(DocKey::Int(1), "b.pdf", "text"),
        ]);
        // Un-normalized embedding; after normalization the best inner
        // product against a unit basis vector is at most 1.
        let r = retriever(axis_index(keys), store, StubLlm::embedding(vec![30.0, 40.0]));

        let items = r.retrieve_context("anything", 1).await;
        assert_eq!(items.len(), 2);
        assert!((items[0].score - 0.8).abs() < 1e-5);
        assert!((items[1].score - 0.6).abs() < 1e-5);
    }

    #[tokio::test]
    async fn fallback_samples_when_nothing_resolves() {
        let keys = vec![DocKey::Int(100), DocKey::Int(101)];
        // Store holds documents, but none match the index identifiers.
        let store = MemStore::with(
            (0..4)
                .map(|i| record(DocKey::Int(i), "f.pdf", &"c".repeat(3000)))
                .collect(),
        );
        let r = retriever(axis_index(keys), store, StubLlm::embedding(vec![1.0, 0.0]));

        let items = r.retrieve_context("anything", 5).await;
        assert_eq!(items.len(), 3);
        for item in &items {
            assert!(item.is_fallback);
            assert!((item.score - 0.5).abs() < f32::EPSILON);
            assert!(item.content.chars().count() <= SNIPPET_MAX_LEN);
        }
    }

    #[tokio::test]
    async fn empty_store_and_empty_index_yield_empty_list() {
        // Zero vectors, but a real dimensionality: search returns no hits
        // and the fallback has nothing to sample.
        let flat = FlatIndex::from_vectors(2, Vec::new()).expect("index");
        let index = Arc::new(VectorIndex::from_parts(flat, Vec::new()).expect("vector index"));
        let r = retriever(index, MemStore::default(), StubLlm::embedding(vec![1.0, 0.0]));

        let items = r.retrieve_context("anything", 5).await;
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn provider_failure_degrades_to_empty_list() {
        let keys = vec![DocKey::Int(0)];
        let store = MemStore::with(vec![record(DocKey::Int(0), "a.pdf", "text")]);
        let r = retriever(axis_index(keys), store, StubLlm::failing());

        let items = r.retrieve_context("anything", 5).await;
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn zero_embedding_degrades_to_empty_list() {
        let keys = vec![DocKey::Int(0)];
        let store = MemStore::with(vec![record(DocKey::Int(0), "a.pdf", "text")]);
        let r = retriever(axis_index(keys), store, StubLlm::embedding(vec![0.0, 0.0]));

        let items = r.retrieve_context("anything", 5).await;
        assert!(items.is_empty());
    }
}
