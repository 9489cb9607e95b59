use anyhow::{anyhow, Context, Result};
use async_openai::{config::OpenAIConfig as AsyncOpenAIConfig, types::CreateEmbeddingRequestArgs, Client};
use async_trait::async_trait;
use std::time::Instant;
use tracing::{debug, info};

use super::config::OpenAIConfig;
use super::provider::EmbeddingProvider;
use crate::metrics::{EMBEDDING_LATENCY, EMBEDDING_REQUESTS};
use crate::retry::retry_with_backoff;

/// Embeddings from an OpenAI-compatible `/embeddings` endpoint
pub struct OpenAIProvider {
    client: Client<AsyncOpenAIConfig>,
    config: OpenAIConfig,
}

impl OpenAIProvider {
    pub fn new(config: &OpenAIConfig) -> Result<Self> {
        let client_config = AsyncOpenAIConfig::new().with_api_key(config.load_api_key()?);
        let client_config = match &config.base_url {
            Some(url) => client_config.with_api_base(url),
            None => client_config,
        };

        info!(model = %config.model, "OpenAI embedding provider ready");
        Ok(Self {
            client: Client::with_config(client_config),
            config: config.clone(),
        })
    }

    fn dimension_of(model: &str) -> usize {
        if model.ends_with("3-large") {
            3072
        } else {
            1536
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        EMBEDDING_REQUESTS.inc();
        let start = Instant::now();

        let mut vectors = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.max_batch_size()) {
            let request = CreateEmbeddingRequestArgs::default()
                .model(&self.config.model)
                .input(batch.to_vec())
                .build()
                .context("invalid embeddings request")?;

            let response = retry_with_backoff(
                "OpenAI embeddings request",
                self.config.max_retries,
                self.config.initial_backoff_ms,
                || async {
                    self.client
                        .embeddings()
                        .create(request.clone())
                        .await
                        .context("embeddings request failed")
                },
            )
            .await?;

            if response.data.len() != batch.len() {
                return Err(anyhow!(
                    "endpoint returned {} embeddings for {} inputs",
                    response.data.len(),
                    batch.len()
                ));
            }

            let mut data = response.data;
            data.sort_by_key(|d| d.index);
            vectors.extend(data.into_iter().map(|d| d.embedding));
            debug!(batch = batch.len(), "Embedded batch");
        }

        EMBEDDING_LATENCY.observe(start.elapsed().as_secs_f64());

        Ok(vectors)
    }

    fn embedding_dimension(&self) -> usize {
        Self::dimension_of(&self.config.model)
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }

    fn max_batch_size(&self) -> usize {
        self.config.batch_size.clamp(1, 2048)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimension_of() {
        assert_eq!(OpenAIProvider::dimension_of("text-embedding-3-small"), 1536);
        assert_eq!(OpenAIProvider::dimension_of("text-embedding-3-large"), 3072);
        assert_eq!(OpenAIProvider::dimension_of("text-embedding-ada-002"), 1536);
    }

    #[test]
    fn test_new_with_explicit_key() {
        let config = OpenAIConfig {
            api_key: "sk-test".to_string(),
            batch_size: 0,
            ..Default::default()
        };
        let provider = OpenAIProvider::new(&config).unwrap();
        assert_eq!(provider.max_batch_size(), 1);
        assert_eq!(provider.provider_name(), "openai");
    }

    #[tokio::test]
    #[ignore] // Requires API key
    async fn test_live_embedding_dimension() {
        let config = OpenAIConfig {
            api_key: "${OPENAI_API_KEY}".to_string(),
            ..Default::default()
        };
        let provider = OpenAIProvider::new(&config).unwrap();
        let embedding = provider.embed_query("What is explainable AI?").await.unwrap();
        assert_eq!(embedding.len(), 1536);
    }
}
