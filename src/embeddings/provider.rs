use anyhow::Result;
use async_trait::async_trait;

/// Black-box text -> vector function.
///
/// Implementations must be deterministic for a given model and return
/// vectors of one fixed dimension.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embeddings for multiple texts, in input order
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Generate embedding for a single query
    async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        self.embed(&[query.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("No embedding generated for query"))
    }

    /// Get the dimension of embeddings produced by this provider
    fn embedding_dimension(&self) -> usize;

    /// Get provider name for logging and metrics
    fn provider_name(&self) -> &'static str;

    /// Get maximum batch size this provider supports
    fn max_batch_size(&self) -> usize;

    /// Check if provider is healthy and ready
    async fn health_check(&self) -> Result<HealthStatus> {
        match self.embed_query("health check").await {
            Ok(v) if !v.is_empty() => Ok(HealthStatus::Healthy),
            Ok(_) => Ok(HealthStatus::Degraded {
                reason: "empty embedding".to_string(),
            }),
            Err(e) => Ok(HealthStatus::Unhealthy { error: e.to_string() }),
        }
    }
}

/// Health status for provider monitoring
#[derive(Debug, Clone, PartialEq)]
pub enum HealthStatus {
    Healthy,
    Degraded { reason: String },
    Unhealthy { error: String },
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }
}
