use async_trait::async_trait;
use std::sync::Arc;

use super::backend::{generate_with, RagBackend};
use crate::config::SearchMode;
use crate::error::{RagError, Result};
use crate::llm::{ChatMessage, GenerationOptions, LanguageModel};
use crate::search::{KnowledgeEngine, SearchResult};

/// In-process engine plus an optional chat model.
pub struct LocalBackend {
    engine: Arc<KnowledgeEngine>,
    model: Option<Arc<dyn LanguageModel>>,
}

impl LocalBackend {
    pub fn new(engine: Arc<KnowledgeEngine>, model: Option<Arc<dyn LanguageModel>>) -> Self {
        Self { engine, model }
    }

    pub fn engine(&self) -> &Arc<KnowledgeEngine> {
        &self.engine
    }
}

#[async_trait]
impl RagBackend for LocalBackend {
    fn name(&self) -> &str {
        "local"
    }

    /// Healthy once a snapshot with at least one document is installed.
    async fn health_check(&self) -> Result<()> {
        let snapshot = self.engine.snapshot();
        if snapshot.documents().is_empty() {
            return Err(RagError::unavailable("knowledge index is empty"));
        }
        Ok(())
    }

    async fn search(&self, query: &str, top_k: usize, mode: SearchMode) -> Result<Vec<SearchResult>> {
        Ok(self.engine.search(query, top_k, mode).await?.results)
    }

    async fn get_stats(&self) -> Result<serde_json::Value> {
        serde_json::to_value(self.engine.stats()).map_err(|e| RagError::internal(e.to_string()))
    }

    async fn generate(&self, messages: &[ChatMessage], options: GenerationOptions) -> Result<String> {
        generate_with(self.model.as_ref(), messages, options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CacheConfig, SearchConfig};
    use crate::embeddings::{EmbeddingService, HashingEmbedder};
    use crate::knowledge::{Document, DocumentType};

    async fn engine(documents: Vec<Document>) -> Arc<KnowledgeEngine> {
        let embeddings = Arc::new(EmbeddingService::new(Arc::new(HashingEmbedder::new(64)), 512));
        Arc::new(KnowledgeEngine::build(documents, embeddings, SearchConfig::default(), &CacheConfig::default()).await)
    }

    #[tokio::test]
    async fn test_empty_engine_is_unhealthy() {
        let backend = LocalBackend::new(engine(Vec::new()).await, None);
        assert!(matches!(backend.health_check().await, Err(RagError::BackendUnavailable(_))));
    }

    #[tokio::test]
    async fn test_search_and_stats() {
        let docs = vec![
            Document::new("a", "Deep learning for histopathology images", "x.md", None, DocumentType::Research, 8),
            Document::new("b", "Teaching assistant for statistics courses", "x.md", None, DocumentType::Experience, 5),
            Document::new("c", "Award for best thesis presentation", "x.md", None, DocumentType::Awards, 4),
        ];
        let backend = LocalBackend::new(engine(docs).await, None);

        backend.health_check().await.unwrap();
        let results = backend.search("histopathology", 3, SearchMode::Bm25).await.unwrap();
        assert_eq!(results[0].document.id, "a");

        let stats = backend.get_stats().await.unwrap();
        assert_eq!(stats["totalDocuments"], 3);

        let generated = backend.generate(&[ChatMessage::user("hi")], GenerationOptions::default()).await;
        assert!(matches!(generated, Err(RagError::GenerationFailure(_))));
    }
}
