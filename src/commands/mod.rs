pub mod ask;
pub mod search;
pub mod serve;
pub mod stats;

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use crate::config::Config;
use crate::embeddings::{create_provider, EmbeddingService};
use crate::knowledge::CorpusLoader;
use crate::search::KnowledgeEngine;

/// Load the corpus and build the in-process engine.
pub async fn build_engine(config: &Config) -> Result<Arc<KnowledgeEngine>> {
    let documents = CorpusLoader::new(&config.knowledge)
        .load()
        .context("Failed to load knowledge base")?;
    info!(
        documents = documents.len(),
        content_dir = %config.knowledge.content_dir.display(),
        "Knowledge base loaded"
    );

    let provider = create_provider(&config.embeddings).context("Failed to initialize embeddings")?;
    let embeddings = Arc::new(
        EmbeddingService::new(provider, config.embeddings.max_input_chars).with_cache(&config.cache),
    );

    let engine = KnowledgeEngine::build(documents, embeddings, config.search.clone(), &config.cache).await;
    Ok(Arc::new(engine))
}
