use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::server::handlers::{chat, health};
use crate::state::AppState;

/// Creates the application router.
///
/// The HTTP surface is deliberately small: a health probe, a status
/// endpoint, and the chat endpoint that drives retrieval + generation.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/api/status", get(health::get_status))
        .route("/api/chat", post(chat::chat))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
