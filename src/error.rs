//! Error taxonomy shared by the engine, the answer pipeline and the HTTP layer.
//!
//! An empty result set is not an error: it is an empty `Vec`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RagError>;

#[derive(Debug, Error)]
pub enum RagError {
    /// Missing, malformed or oversized input. Rejected at the boundary.
    #[error("validation error: {0}")]
    Validation(String),

    /// Health check failed, or a network/timeout error reaching a backend.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// The embedding provider returned nothing usable.
    #[error("embedding failure: {0}")]
    EmbeddingFailure(String),

    /// The language model call failed or returned empty content.
    #[error("generation failure: {0}")]
    GenerationFailure(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl RagError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::BackendUnavailable(msg.into())
    }

    pub fn embedding(msg: impl Into<String>) -> Self {
        Self::EmbeddingFailure(msg.into())
    }

    pub fn generation(msg: impl Into<String>) -> Self {
        Self::GenerationFailure(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Short machine-readable name, used as a metrics label.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::BackendUnavailable(_) => "backend_unavailable",
            Self::EmbeddingFailure(_) => "embedding_failure",
            Self::GenerationFailure(_) => "generation_failure",
            Self::Internal(_) => "internal",
        }
    }

    /// Stable text shown to end users in place of the error.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Validation(_) => {
                "I couldn't understand that request. Please rephrase your question and try again."
            }
            Self::BackendUnavailable(_) => {
                "The knowledge service is starting up or temporarily unavailable. Please try again in a minute."
            }
            Self::EmbeddingFailure(_) => {
                "I had trouble processing your question. Please try rephrasing it."
            }
            Self::GenerationFailure(_) => {
                "I found relevant information but couldn't generate an answer right now. Please try again shortly."
            }
            Self::Internal(_) => {
                "I'm experiencing technical difficulties right now. Please try again later."
            }
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::BackendUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::EmbeddingFailure(_) | Self::GenerationFailure(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<anyhow::Error> for RagError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(format!("{:#}", err))
    }
}

impl IntoResponse for RagError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            Self::Validation(details) => json!({ "error": "Invalid request", "details": details }),
            Self::Internal(details) => {
                tracing::error!(error = %details, "Internal error");
                json!({ "error": self.user_message() })
            }
            Self::BackendUnavailable(details)
            | Self::EmbeddingFailure(details)
            | Self::GenerationFailure(details) => {
                tracing::error!(kind = self.kind(), error = %details, "Request failed");
                json!({ "error": self.user_message(), "details": details })
            }
        };
        (status, Json(body)).into_response()
    }
}
