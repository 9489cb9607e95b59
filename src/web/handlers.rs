//! HTTP request handlers.
//!
//! Input validation happens here; a rejected request never reaches the engine.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Instant;
use tracing::{info, warn};

use super::state::AppState;
use crate::cache::CacheStats;
use crate::config::SearchMode;
use crate::error::{RagError, Result};
use crate::llm::ChatMessage;
use crate::metrics;

/// Unwrap a JSON body, turning every extractor rejection into a 400.
fn json_body<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| RagError::validation(rejection.body_text()))
}

/// POST /api/search body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub query: Option<String>,
    pub top_k: Option<usize>,
    pub search_type: Option<SearchMode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingRequest {
    /// Kept loose so a non-string value is reported as a 400, not a 422
    pub text: Option<Value>,
    pub use_cache: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingResponse {
    pub embedding: Vec<f32>,
    pub dimensions: usize,
    pub cached: bool,
    pub processing_time_ms: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchEmbeddingRequest {
    pub texts: Option<Vec<Value>>,
    pub use_cache: Option<bool>,
}

/// One item of a batch: an embedding or the reason there is none.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItem {
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchEmbeddingResponse {
    pub results: Vec<BatchItem>,
    pub total_processing_time_ms: u64,
    pub total_texts: usize,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: Option<String>,
    #[serde(default)]
    pub history: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
pub struct HealthServices {
    pub retrieval: bool,
    pub embedding: bool,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
    pub services: HealthServices,
    pub version: &'static str,
}

/// GET /health
///
/// `healthy` when the index holds documents and the embedding provider
/// answers; `degraded` otherwise.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let retrieval = !state.engine.snapshot().documents().is_empty();
    let embedding = match state.engine.embeddings().provider().health_check().await {
        Ok(status) => status.is_healthy(),
        Err(e) => {
            warn!("Embedding health check failed: {}", e);
            false
        }
    };

    Json(HealthResponse {
        status: if retrieval && embedding { "healthy" } else { "degraded" },
        timestamp: Utc::now().to_rfc3339(),
        services: HealthServices { retrieval, embedding },
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// POST /api/search
pub async fn search(
    State(state): State<AppState>,
    payload: std::result::Result<Json<SearchRequest>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let request = json_body(payload)?;
    let query = request.query.unwrap_or_default();
    let top_k = request.top_k.unwrap_or(state.config.search.default_top_k);
    let mode = request.search_type.unwrap_or(state.config.search.default_mode);

    state.engine.validate(&query, top_k)?;

    info!(query = %query, top_k = top_k, search_type = %mode, "Processing search request");
    let response = state.engine.search(&query, top_k, mode).await?;
    Ok(Json(response))
}

fn validate_text(value: Option<&Value>, max_chars: usize) -> Result<String> {
    let text = match value {
        Some(Value::String(text)) => text,
        Some(_) => return Err(RagError::validation("text must be a string")),
        None => return Err(RagError::validation("text is required")),
    };
    if text.trim().is_empty() {
        return Err(RagError::validation("text must not be empty"));
    }
    if text.chars().count() > max_chars {
        return Err(RagError::validation(format!(
            "text exceeds {} characters",
            max_chars
        )));
    }
    Ok(text.clone())
}

/// POST /api/embeddings
pub async fn embed(
    State(state): State<AppState>,
    payload: std::result::Result<Json<EmbeddingRequest>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let request = json_body(payload)?;
    let text = validate_text(request.text.as_ref(), state.config.embeddings.max_text_chars)?;

    let start = Instant::now();
    let (embedding, cached) = state
        .engine
        .embeddings()
        .embed_text(&text, request.use_cache.unwrap_or(true))
        .await?;

    Ok(Json(EmbeddingResponse {
        dimensions: embedding.len(),
        embedding,
        cached,
        processing_time_ms: start.elapsed().as_millis() as u64,
    }))
}

/// POST /api/embeddings/batch
pub async fn embed_batch(
    State(state): State<AppState>,
    payload: std::result::Result<Json<BatchEmbeddingRequest>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let request = json_body(payload)?;
    let texts = request.texts.unwrap_or_default();
    let max_texts = state.config.embeddings.max_batch_texts;
    if texts.is_empty() || texts.len() > max_texts {
        return Err(RagError::validation(format!(
            "texts must contain between 1 and {} items",
            max_texts
        )));
    }

    let use_cache = request.use_cache.unwrap_or(true);
    let max_chars = state.config.embeddings.max_text_chars;
    let start = Instant::now();
    let mut results = Vec::with_capacity(texts.len());

    for (index, value) in texts.iter().enumerate() {
        let outcome = match validate_text(Some(value), max_chars) {
            Ok(text) => state.engine.embeddings().embed_text(&text, use_cache).await,
            Err(e) => Err(e),
        };
        results.push(match outcome {
            Ok((embedding, cached)) => BatchItem {
                index,
                embedding: Some(embedding),
                cached: Some(cached),
                error: None,
            },
            Err(e) => BatchItem {
                index,
                embedding: None,
                cached: None,
                error: Some(e.to_string()),
            },
        });
    }

    Ok(Json(BatchEmbeddingResponse {
        results,
        total_processing_time_ms: start.elapsed().as_millis() as u64,
        total_texts: texts.len(),
    }))
}

/// GET /api/knowledge-stats
pub async fn knowledge_stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.engine.stats())
}

/// GET /api/cache/stats
pub async fn cache_stats(State(state): State<AppState>) -> impl IntoResponse {
    let search = state.engine.search_cache_stats();
    let embedding = state.engine.embeddings().cache_stats();
    let total = CacheStats::combine(&[search, embedding]);

    Json(json!({
        "searchCache": search,
        "embeddingCache": embedding,
        "total": total,
    }))
}

/// DELETE /api/cache/clear
pub async fn clear_cache(State(state): State<AppState>) -> impl IntoResponse {
    state.engine.clear_search_cache();
    state.engine.embeddings().clear_cache();
    info!("Search and embedding caches cleared");

    Json(json!({ "message": "All caches cleared" }))
}

/// POST /api/chat
pub async fn chat(
    State(state): State<AppState>,
    payload: std::result::Result<Json<ChatRequest>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let request = json_body(payload)?;
    let message = request.message.unwrap_or_default();

    let answer = state.orchestrator.answer(&message, &request.history).await?;
    Ok(Json(answer))
}

/// GET /metrics
pub async fn metrics_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        metrics::gather_metrics(),
    )
}
