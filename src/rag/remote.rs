use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::backend::{generate_with, status_error, transport_error, RagBackend};
use crate::config::SearchMode;
use crate::error::{RagError, Result};
use crate::llm::{ChatMessage, GenerationOptions, LanguageModel};
use crate::search::{SearchResponse, SearchResult};

/// A ragtim search service reached over HTTP.
pub struct RemoteBackend {
    client: reqwest::Client,
    base_url: String,
    model: Option<Arc<dyn LanguageModel>>,
}

#[derive(Debug, Deserialize)]
struct HealthBody {
    status: String,
    #[serde(default)]
    services: HealthServices,
}

#[derive(Debug, Default, Deserialize)]
struct HealthServices {
    #[serde(default)]
    retrieval: bool,
    #[serde(default)]
    embedding: bool,
}

impl RemoteBackend {
    pub fn new(base_url: &str, timeout: Duration, model: Option<Arc<dyn LanguageModel>>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client for remote backend")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn read_json<T: serde::de::DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(self.name(), status, &body));
        }
        response.json().await.map_err(|e| transport_error(self.name(), e))
    }
}

#[async_trait]
impl RagBackend for RemoteBackend {
    fn name(&self) -> &str {
        "remote"
    }

    async fn health_check(&self) -> Result<()> {
        let response = self
            .client
            .get(self.url("/health"))
            .send()
            .await
            .map_err(|e| transport_error(self.name(), e))?;
        let health: HealthBody = self.read_json(response).await?;

        debug!(
            backend = self.name(),
            status = %health.status,
            retrieval = health.services.retrieval,
            embedding = health.services.embedding,
            "Remote health"
        );

        if health.status == "healthy" && health.services.retrieval && health.services.embedding {
            Ok(())
        } else {
            Err(RagError::unavailable(format!(
                "remote service reports status '{}'",
                health.status
            )))
        }
    }

    async fn search(&self, query: &str, top_k: usize, mode: SearchMode) -> Result<Vec<SearchResult>> {
        let response = self
            .client
            .post(self.url("/api/search"))
            .json(&json!({ "query": query, "topK": top_k, "searchType": mode }))
            .send()
            .await
            .map_err(|e| transport_error(self.name(), e))?;

        let body: SearchResponse = self.read_json(response).await?;
        Ok(body.results)
    }

    async fn get_stats(&self) -> Result<serde_json::Value> {
        let response = self
            .client
            .get(self.url("/api/knowledge-stats"))
            .send()
            .await
            .map_err(|e| transport_error(self.name(), e))?;
        let mut stats: serde_json::Value = self.read_json(response).await?;

        if let Some(object) = stats.as_object_mut() {
            object.insert("backendUrl".to_string(), json!(self.base_url));
        }
        Ok(stats)
    }

    async fn generate(&self, messages: &[ChatMessage], options: GenerationOptions) -> Result<String> {
        generate_with(self.model.as_ref(), messages, options).await
    }
}
