use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::core::errors::ApiError;
use crate::llm::{ChatMessage, ChatRequest};
use crate::rag::prompt::{build_prompt, NO_CONTEXT_ANSWER, SYSTEM_PROMPT};
use crate::rag::ContextItem;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequestBody {
    pub query: String,
    #[serde(default)]
    pub conversation_history: Vec<ChatMessage>,
}

/// A context item as surfaced to the caller: metadata only, content
/// stripped before it crosses the boundary.
#[derive(Debug, Serialize)]
pub struct SourceInfo {
    pub document_id: String,
    pub filename: String,
    pub relevance_score: f32,
    pub is_fallback: bool,
}

impl From<&ContextItem> for SourceInfo {
    fn from(item: &ContextItem) -> Self {
        Self {
            document_id: item.document_id.canonical(),
            filename: item.filename.clone(),
            relevance_score: item.score,
            is_fallback: item.is_fallback,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ChatResponseBody {
    pub answer: String,
    pub sources: Vec<SourceInfo>,
}

pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ChatRequestBody>,
) -> Result<impl IntoResponse, ApiError> {
    if body.query.trim().is_empty() {
        return Err(ApiError::BadRequest("query must not be empty".to_string()));
    }

    tracing::info!("Chat query: {}", body.query);
    let items = state
        .retriever
        .retrieve_context(&body.query, state.settings.top_k)
        .await;

    if items.is_empty() {
        return Ok(Json(ChatResponseBody {
            answer: NO_CONTEXT_ANSWER.to_string(),
            sources: Vec::new(),
        }));
    }

    let prompt = build_prompt(&body.query, &items, &body.conversation_history);
    let request = ChatRequest {
        messages: vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(prompt)],
        temperature: Some(state.settings.temperature),
        max_tokens: Some(state.settings.max_tokens),
    };

    let answer = state.llm.chat(request, &state.settings.chat_model).await?;
    let sources = items.iter().map(SourceInfo::from).collect();

    Ok(Json(ChatResponseBody { answer, sources }))
}
