use anyhow::Result;
use axum::Router;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

use ragtim::config::{Config, SearchConfig};
use ragtim::embeddings::{EmbeddingProvider, EmbeddingService, HashingEmbedder, ProviderType};
use ragtim::knowledge::{CorpusLoader, Document};
use ragtim::llm::{GenerationOptions, LanguageModel};
use ragtim::rag::{LocalBackend, RagBackend, RagOrchestrator};
use ragtim::search::KnowledgeEngine;
use ragtim::web::{create_router, AppState};

pub const EMBEDDING_DIMENSION: usize = 64;

const ABOUT_MD: &str = "# About\n\
Raktim Mondol is a PhD candidate in computer science whose thesis applies deep learning to breast cancer prognosis.\n\n\
# Contact\n\
Reach out by email for research collaborations, reviewing requests and speaking invitations.\n";

const RESEARCH_MD: &str = "# Multimodal Survival Analysis\n\
Combining histopathology images with gene expression profiles to predict patient survival outcomes.\n\n\
# Retrieval Augmented Generation\n\
Building assistants that ground language model answers in curated document collections.\n";

const SKILLS_MD: &str = "# Programming\n\
Python, PyTorch, R and Rust for statistical learning, data pipelines and reproducible experiments.\n\n\
# Tools\n\
Docker, Git, high performance computing clusters and workflow managers for bioinformatics.\n";

/// A temporary content directory loaded into a real engine.
pub struct TestHarness {
    pub temp_dir: TempDir,
    pub config: Config,
    pub engine: Arc<KnowledgeEngine>,
}

impl TestHarness {
    /// Engine over a small markdown corpus, embedded with the hashing provider.
    pub async fn new() -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let content_dir = temp_dir.path().join("content");
        std::fs::create_dir_all(&content_dir)?;
        std::fs::write(content_dir.join("about.md"), ABOUT_MD)?;
        std::fs::write(content_dir.join("research.md"), RESEARCH_MD)?;
        std::fs::write(content_dir.join("skills.md"), SKILLS_MD)?;

        let config = test_config(content_dir);
        let documents = CorpusLoader::new(&config.knowledge).load()?;
        let engine = build_engine(documents, Arc::new(HashingEmbedder::new(EMBEDDING_DIMENSION)), &config).await;

        Ok(Self {
            temp_dir,
            config,
            engine,
        })
    }

    /// Engine over explicit documents with a chosen embedding provider.
    pub async fn with_documents(documents: Vec<Document>, provider: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let config = test_config(temp_dir.path().join("content"));
        let engine = build_engine(documents, provider, &config).await;

        Ok(Self {
            temp_dir,
            config,
            engine,
        })
    }

    pub fn local_backend(&self, model: Option<Arc<dyn LanguageModel>>) -> Arc<dyn RagBackend> {
        Arc::new(LocalBackend::new(self.engine.clone(), model))
    }

    pub fn orchestrator(&self, backends: Vec<Arc<dyn RagBackend>>) -> RagOrchestrator {
        RagOrchestrator::new(backends, &self.config.rag, GenerationOptions::from(&self.config.llm))
    }

    /// Router whose chat endpoint answers through the local backend.
    pub fn router(&self, model: Option<Arc<dyn LanguageModel>>) -> Router {
        let orchestrator = Arc::new(self.orchestrator(vec![self.local_backend(model)]));
        create_router(AppState::new(self.engine.clone(), orchestrator, self.config.clone()))
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }
}

fn test_config(content_dir: PathBuf) -> Config {
    let mut config = Config::default();
    config.knowledge.content_dir = content_dir;
    config.embeddings.provider = ProviderType::Hashing;
    config.embeddings.dimension = EMBEDDING_DIMENSION;
    config
}

async fn build_engine(
    documents: Vec<Document>,
    provider: Arc<dyn EmbeddingProvider>,
    config: &Config,
) -> Arc<KnowledgeEngine> {
    let embeddings = Arc::new(EmbeddingService::new(provider, config.embeddings.max_input_chars).with_cache(&config.cache));
    Arc::new(KnowledgeEngine::build(documents, embeddings, SearchConfig::default(), &config.cache).await)
}
