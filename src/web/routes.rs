//! Route table for the HTTP surface.

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use super::handlers;
use super::state::AppState;

/// Build the router with every endpoint. CORS is layered on by the server.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        // Retrieval
        .route("/api/search", post(handlers::search))
        .route("/api/embeddings", post(handlers::embed))
        .route("/api/embeddings/batch", post(handlers::embed_batch))
        .route("/api/knowledge-stats", get(handlers::knowledge_stats))
        // Operations
        .route("/api/cache/stats", get(handlers::cache_stats))
        .route("/api/cache/clear", delete(handlers::clear_cache))
        // Answers
        .route("/api/chat", post(handlers::chat))
        .route("/metrics", get(handlers::metrics_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
