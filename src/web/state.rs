//! Shared state handed to every request handler.

use std::sync::Arc;

use crate::config::Config;
use crate::rag::RagOrchestrator;
use crate::search::KnowledgeEngine;

/// Cloned per request; the inner `Arc`s keep the real data shared.
#[derive(Clone)]
pub struct AppState {
    /// In-process retrieval engine behind the search endpoints
    pub engine: Arc<KnowledgeEngine>,
    /// Answer pipeline behind `/api/chat`
    pub orchestrator: Arc<RagOrchestrator>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(engine: Arc<KnowledgeEngine>, orchestrator: Arc<RagOrchestrator>, config: Config) -> Self {
        Self {
            engine,
            orchestrator,
            config: Arc::new(config),
        }
    }
}
