//! Process-wide application state.
//!
//! Everything the request handlers need is constructed once here and passed
//! by `Arc`; there is no global registry. The vector index and identifier
//! array are read-only for the process lifetime, so concurrent readers need
//! no locking.

use std::sync::Arc;

use thiserror::Error;

use crate::core::config::{validate_index_files, AppPaths, Settings};
use crate::index::VectorIndex;
use crate::llm::{LlmProvider, OpenAiProvider};
use crate::rag::ContextRetriever;
use crate::store::{DocumentStore, SqliteDocumentStore};

#[derive(Debug, Error)]
pub enum InitializationError {
    #[error("Invalid configuration: {0}")]
    Config(#[source] anyhow::Error),

    #[error("OPENAI_API_KEY is required but not set")]
    MissingApiKey,

    #[error("Failed to load vector index: {0}")]
    Index(#[source] anyhow::Error),

    #[error("Failed to initialize document store: {0}")]
    Store(#[source] anyhow::Error),
}

pub struct AppState {
    pub paths: Arc<AppPaths>,
    pub settings: Settings,
    pub index: Arc<VectorIndex>,
    pub store: Arc<dyn DocumentStore>,
    pub llm: Arc<dyn LlmProvider>,
    pub retriever: ContextRetriever,
}

impl AppState {
    /// Build the full component graph.
    ///
    /// Fails fast when the persisted index files are missing or mutually
    /// inconsistent, or when required credentials are absent; the service
    /// must not answer requests in a half-initialized state.
    pub async fn initialize() -> Result<Arc<Self>, InitializationError> {
        let paths = Arc::new(AppPaths::new());
        let settings =
            Settings::load(&paths).map_err(|e| InitializationError::Config(e.into()))?;
        let api_key = Settings::api_key().ok_or(InitializationError::MissingApiKey)?;

        validate_index_files(&paths).map_err(|e| InitializationError::Index(e.into()))?;
        let index = Arc::new(
            VectorIndex::load(&paths).map_err(|e| InitializationError::Index(e.into()))?,
        );

        let store: Arc<dyn DocumentStore> = Arc::new(
            SqliteDocumentStore::new(&paths)
                .await
                .map_err(|e| InitializationError::Store(e.into()))?,
        );
        match store.count().await {
            Ok(count) => tracing::info!("Document store ready with {} records", count),
            Err(e) => tracing::warn!("Could not count documents: {}", e),
        }

        let llm: Arc<dyn LlmProvider> = Arc::new(OpenAiProvider::new(
            settings.llm_base_url.clone(),
            api_key,
        ));

        let retriever = ContextRetriever::new(
            index.clone(),
            store.clone(),
            llm.clone(),
            settings.embedding_model.clone(),
        );

        Ok(Arc::new(AppState {
            paths,
            settings,
            index,
            store,
            llm,
            retriever,
        }))
    }
}
