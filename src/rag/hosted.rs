//! Hosted inference endpoint (a Hugging Face style Space) with its own
//! snake_case search API.

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use super::backend::{generate_with, status_error, transport_error, RagBackend};
use crate::config::SearchMode;
use crate::error::Result;
use crate::knowledge::{Document, DocumentType};
use crate::llm::{ChatMessage, GenerationOptions, LanguageModel};
use crate::search::SearchResult;

const DEFAULT_PRIORITY: i32 = 5;

pub struct HostedBackend {
    client: reqwest::Client,
    base_url: String,
    vector_weight: f32,
    bm25_weight: f32,
    model: Option<Arc<dyn LanguageModel>>,
}

#[derive(Debug, Serialize)]
struct HostedSearchRequest<'a> {
    query: &'a str,
    top_k: usize,
    search_type: SearchMode,
    vector_weight: f32,
    bm25_weight: f32,
}

#[derive(Debug, Default, Deserialize)]
struct HostedSearchResponse {
    #[serde(default)]
    results: Vec<HostedResult>,
}

#[derive(Debug, Default, Deserialize)]
struct HostedResult {
    #[serde(default)]
    document: Option<HostedDocument>,
    /// Some deployments put the text at the top level
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    search_type: Option<String>,
    #[serde(default)]
    vector_score: Option<f32>,
    #[serde(default)]
    bm25_score: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
struct HostedDocument {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    metadata: HostedMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct HostedMetadata {
    #[serde(default, rename = "type")]
    doc_type: Option<String>,
    #[serde(default)]
    priority: Option<i32>,
    #[serde(default)]
    section: Option<String>,
    #[serde(default)]
    source: Option<String>,
}

impl HostedResult {
    fn into_search_result(self, index: usize) -> SearchResult {
        let document = self.document.unwrap_or_default();
        let content = document.content.or(self.content).unwrap_or_default();
        let metadata = document.metadata;

        let search_type = self
            .search_type
            .and_then(|s| s.parse::<SearchMode>().ok())
            .unwrap_or(SearchMode::Hybrid);

        SearchResult {
            document: Document::new(
                document.id.unwrap_or_else(|| format!("hosted#{}", index)),
                content,
                metadata.source.unwrap_or_else(|| "hosted".to_string()),
                metadata.section,
                metadata
                    .doc_type
                    .map(|t| DocumentType::from(t.as_str()))
                    .unwrap_or_else(|| DocumentType::Other("general".to_string())),
                metadata.priority.unwrap_or(DEFAULT_PRIORITY),
            ),
            score: self.score,
            search_type,
            vector_score: self.vector_score,
            bm25_score: self.bm25_score,
        }
    }
}

impl HostedBackend {
    pub fn new(
        base_url: &str,
        timeout: Duration,
        vector_weight: f32,
        bm25_weight: f32,
        model: Option<Arc<dyn LanguageModel>>,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client for hosted backend")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            vector_weight,
            bm25_weight,
            model,
        })
    }

    async fn ensure_success(&self, response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(status_error(self.name(), status, &body))
    }
}

#[async_trait]
impl RagBackend for HostedBackend {
    fn name(&self) -> &str {
        "hosted"
    }

    /// Sleeping Spaces answer the landing page only once they are awake.
    async fn health_check(&self) -> Result<()> {
        let response = self
            .client
            .get(format!("{}/", self.base_url))
            .send()
            .await
            .map_err(|e| transport_error(self.name(), e))?;
        self.ensure_success(response).await.map(|_| ())
    }

    async fn search(&self, query: &str, top_k: usize, mode: SearchMode) -> Result<Vec<SearchResult>> {
        let request = HostedSearchRequest {
            query,
            top_k,
            search_type: mode,
            vector_weight: self.vector_weight,
            bm25_weight: self.bm25_weight,
        };

        let response = self
            .client
            .post(format!("{}/api/search", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(self.name(), e))?;
        let body: HostedSearchResponse = self
            .ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| transport_error(self.name(), e))?;

        Ok(body
            .results
            .into_iter()
            .enumerate()
            .map(|(i, r)| r.into_search_result(i))
            .collect())
    }

    async fn get_stats(&self) -> Result<serde_json::Value> {
        let response = self
            .client
            .get(format!("{}/api/stats", self.base_url))
            .send()
            .await
            .map_err(|e| transport_error(self.name(), e))?;
        self.ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| transport_error(self.name(), e))
    }

    async fn generate(&self, messages: &[ChatMessage], options: GenerationOptions) -> Result<String> {
        generate_with(self.model.as_ref(), messages, options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape() {
        let value = serde_json::to_value(HostedSearchRequest {
            query: "phd",
            top_k: 8,
            search_type: SearchMode::Hybrid,
            vector_weight: 0.6,
            bm25_weight: 0.4,
        })
        .unwrap();

        assert_eq!(value["top_k"], 8);
        assert_eq!(value["search_type"], "hybrid");
        assert!(value.get("topK").is_none());
    }

    #[test]
    fn test_result_mapping() {
        let body: HostedSearchResponse = serde_json::from_str(
            r#"{"results":[
                {"document":{"id":"r1","content":"PhD on cancer","metadata":{"type":"research","priority":9,"section":"Thesis"}},
                 "score":0.71,"search_type":"hybrid","vector_score":0.8,"bm25_score":0.6},
                {"content":"loose text","score":0.2}
            ]}"#,
        )
        .unwrap();

        let results: Vec<SearchResult> = body
            .results
            .into_iter()
            .enumerate()
            .map(|(i, r)| r.into_search_result(i))
            .collect();

        assert_eq!(results[0].document.id, "r1");
        assert_eq!(results[0].document.metadata.doc_type, DocumentType::Research);
        assert_eq!(results[0].document.label(), "Thesis");
        assert_eq!(results[0].bm25_score, Some(0.6));

        assert_eq!(results[1].document.id, "hosted#1");
        assert_eq!(results[1].document.content, "loose text");
        assert_eq!(results[1].document.priority(), DEFAULT_PRIORITY);
        assert_eq!(results[1].search_type, SearchMode::Hybrid);
        assert_eq!(results[1].document.label(), "general");
    }

    #[test]
    fn test_missing_results_field() {
        let body: HostedSearchResponse = serde_json::from_str(r#"{"error":"warming up"}"#).unwrap();
        assert!(body.results.is_empty());
    }
}
