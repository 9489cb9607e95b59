use async_trait::async_trait;
use std::sync::Arc;

use crate::config::SearchMode;
use crate::error::{RagError, Result};
use crate::llm::{ChatMessage, GenerationOptions, LanguageModel};
use crate::search::SearchResult;

/// Capability set shared by every retrieval + generation strategy.
///
/// The orchestrator only talks to this trait, so a strategy is chosen by
/// configuration rather than by a dedicated pipeline per backend.
#[async_trait]
pub trait RagBackend: Send + Sync {
    /// Identifier used in logs, metrics and answers
    fn name(&self) -> &str;

    /// `Ok(())` when the backend can serve searches right now.
    async fn health_check(&self) -> Result<()>;

    async fn search(&self, query: &str, top_k: usize, mode: SearchMode) -> Result<Vec<SearchResult>>;

    /// Corpus statistics in the backend's own shape.
    async fn get_stats(&self) -> Result<serde_json::Value>;

    async fn generate(&self, messages: &[ChatMessage], options: GenerationOptions) -> Result<String>;
}

/// Run `messages` through `model`, mapping every failure to `GenerationFailure`.
pub(crate) async fn generate_with(
    model: Option<&Arc<dyn LanguageModel>>,
    messages: &[ChatMessage],
    options: GenerationOptions,
) -> Result<String> {
    let model = model.ok_or_else(|| RagError::generation("no language model API key configured"))?;

    let text = model
        .complete(messages, options)
        .await
        .map_err(|e| RagError::generation(format!("{}: {:#}", model.model_name(), e)))?;

    if text.trim().is_empty() {
        return Err(RagError::generation("language model returned empty content"));
    }
    Ok(text)
}

/// Map a transport error from `reqwest` to the error taxonomy.
pub(crate) fn transport_error(backend: &str, err: reqwest::Error) -> RagError {
    if err.is_timeout() {
        RagError::unavailable(format!("{} timed out: {}", backend, err))
    } else if err.is_decode() {
        RagError::internal(format!("{} returned an unreadable body: {}", backend, err))
    } else {
        RagError::unavailable(format!("{} unreachable: {}", backend, err))
    }
}

/// Map a non-success HTTP status from a backend.
pub(crate) fn status_error(backend: &str, status: reqwest::StatusCode, body: &str) -> RagError {
    if status.is_client_error() {
        RagError::validation(format!("{} rejected the request ({}): {}", backend, status, body))
    } else {
        RagError::unavailable(format!("{} answered {}: {}", backend, status, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    struct FixedModel(&'static str);

    #[async_trait]
    impl LanguageModel for FixedModel {
        async fn complete(&self, _: &[ChatMessage], _: GenerationOptions) -> anyhow::Result<String> {
            if self.0 == "fail" {
                Err(anyhow!("401 Authentication failed"))
            } else {
                Ok(self.0.to_string())
            }
        }

        fn model_name(&self) -> &str {
            "fixed"
        }
    }

    #[tokio::test]
    async fn test_generate_without_model() {
        let err = generate_with(None, &[ChatMessage::user("hi")], GenerationOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::GenerationFailure(_)));
    }

    #[tokio::test]
    async fn test_generate_maps_failures() {
        let failing: Arc<dyn LanguageModel> = Arc::new(FixedModel("fail"));
        let err = generate_with(Some(&failing), &[], GenerationOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::GenerationFailure(ref m) if m.contains("Authentication")));

        let blank: Arc<dyn LanguageModel> = Arc::new(FixedModel("   "));
        assert!(generate_with(Some(&blank), &[], GenerationOptions::default()).await.is_err());

        let ok: Arc<dyn LanguageModel> = Arc::new(FixedModel("answer"));
        assert_eq!(
            generate_with(Some(&ok), &[], GenerationOptions::default()).await.unwrap(),
            "answer"
        );
    }

    #[test]
    fn test_status_error_classification() {
        let client = status_error("remote", reqwest::StatusCode::BAD_REQUEST, "bad");
        assert!(matches!(client, RagError::Validation(_)));

        let server = status_error("remote", reqwest::StatusCode::SERVICE_UNAVAILABLE, "");
        assert!(matches!(server, RagError::BackendUnavailable(_)));
    }
}
