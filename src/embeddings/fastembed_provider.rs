use anyhow::{Context, Result};
use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use super::config::EmbeddingsConfig;
use super::provider::EmbeddingProvider;
use crate::metrics::{EMBEDDING_LATENCY, EMBEDDING_REQUESTS};

/// Local sentence-transformer embeddings through fastembed.
pub struct FastEmbedProvider {
    model: Arc<TextEmbedding>,
    model_name: String,
    batch_size: usize,
}

impl FastEmbedProvider {
    /// Load (downloading on first use) the configured model
    pub fn new(config: &EmbeddingsConfig) -> Result<Self> {
        let model_type = Self::resolve_model(&config.model);

        let started = Instant::now();
        let model = TextEmbedding::try_new(InitOptions::new(model_type).with_show_download_progress(true))
            .with_context(|| format!("Could not load embedding model '{}'", config.model))?;
        info!(
            model = %config.model,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Embedding model ready"
        );

        Ok(Self {
            model: Arc::new(model),
            model_name: config.model.clone(),
            batch_size: config.batch_size.max(1),
        })
    }

    /// Accepts the short name or the hub id. Unknown names load MiniLM.
    fn resolve_model(name: &str) -> EmbeddingModel {
        match name {
            "all-MiniLM-L6-v2" | "all-minilm-l6-v2" | "Xenova/all-MiniLM-L6-v2" | "sentence-transformers/all-MiniLM-L6-v2" => {
                EmbeddingModel::AllMiniLML6V2
            }
            "bge-small-en-v1.5" | "bge-small" | "BAAI/bge-small-en-v1.5" => EmbeddingModel::BGESmallENV15,
            "bge-base-en-v1.5" | "bge-base" | "BAAI/bge-base-en-v1.5" => EmbeddingModel::BGEBaseENV15,
            "nomic-embed-text-v1.5" | "nomic-embed-text" => EmbeddingModel::NomicEmbedTextV15,
            _ => {
                warn!("Unknown model '{}', falling back to all-MiniLM-L6-v2", name);
                EmbeddingModel::AllMiniLML6V2
            }
        }
    }

    fn dimension_of(model_name: &str) -> usize {
        match model_name {
            name if name.contains("bge-base") => 768,
            name if name.contains("nomic") => 768,
            _ => 384,
        }
    }
}

#[async_trait]
impl EmbeddingProvider for FastEmbedProvider {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        EMBEDDING_REQUESTS.inc();
        let start = Instant::now();

        // CPU bound, keep it off the runtime threads
        let model = Arc::clone(&self.model);
        let owned = texts.to_vec();
        let batch_size = self.batch_size;

        let vectors = tokio::task::spawn_blocking(move || -> Result<Vec<Vec<f32>>> {
            let mut vectors = Vec::with_capacity(owned.len());
            for batch in owned.chunks(batch_size) {
                let refs: Vec<&str> = batch.iter().map(String::as_str).collect();
                vectors.extend(model.embed(refs, None).context("fastembed inference failed")?);
            }
            Ok(vectors)
        })
        .await
        .context("fastembed worker panicked")??;

        EMBEDDING_LATENCY.observe(start.elapsed().as_secs_f64());

        Ok(vectors)
    }

    fn embedding_dimension(&self) -> usize {
        Self::dimension_of(&self.model_name)
    }

    fn provider_name(&self) -> &'static str {
        "fastembed"
    }

    fn max_batch_size(&self) -> usize {
        self.batch_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimension_by_model_family() {
        assert_eq!(FastEmbedProvider::dimension_of("Xenova/all-MiniLM-L6-v2"), 384);
        assert_eq!(FastEmbedProvider::dimension_of("BAAI/bge-base-en-v1.5"), 768);
        assert_eq!(FastEmbedProvider::dimension_of("nomic-embed-text"), 768);
    }

    #[test]
    fn test_unknown_model_falls_back() {
        assert!(matches!(
            FastEmbedProvider::resolve_model("mystery-model"),
            EmbeddingModel::AllMiniLML6V2
        ));
    }

    #[tokio::test]
    #[ignore] // Downloads the model
    async fn test_fastembed_dimension() {
        let provider = FastEmbedProvider::new(&EmbeddingsConfig::default()).unwrap();
        let embedding = provider.embed_query("PhD candidate").await.unwrap();
        assert_eq!(embedding.len(), 384);
    }
}
