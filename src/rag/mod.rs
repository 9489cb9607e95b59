//! Retrieval-augmented answering.
//!
//! - `backend` - capability set every strategy implements
//! - `local`, `remote`, `hosted` - the three strategies
//! - `context` - bounded context block from ranked results
//! - `prompt` - system prompt, history trimming, markdown stripping
//! - `orchestrator` - the answer state machine with backend fallback
//! - `typewriter` - lazy word-by-word reveal

pub mod backend;
pub mod context;
pub mod hosted;
pub mod local;
pub mod orchestrator;
pub mod prompt;
pub mod remote;
pub mod typewriter;

pub use backend::RagBackend;
pub use context::{estimate_tokens, AssembledContext, ContextAssembler, NO_CONTEXT_SENTINEL};
pub use hosted::HostedBackend;
pub use local::LocalBackend;
pub use orchestrator::{AnswerOutcome, PipelineState, RagAnswer, RagOrchestrator, SourceRef};
pub use prompt::{build_messages, strip_markdown, system_prompt, trim_history, NO_INFORMATION_ANSWER};
pub use remote::RemoteBackend;
pub use typewriter::Typewriter;

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::{BackendKind, Config};
use crate::llm::{GenerationOptions, LanguageModel, OpenAiCompatibleModel};
use crate::search::KnowledgeEngine;

/// Instantiate the configured backends in fallback order.
///
/// `local` needs an engine and `hosted` needs a URL; a backend whose
/// prerequisite is missing is skipped with a warning.
pub fn build_backends(
    config: &Config,
    engine: Option<Arc<KnowledgeEngine>>,
    model: Option<Arc<dyn LanguageModel>>,
) -> Result<Vec<Arc<dyn RagBackend>>> {
    let timeout = Duration::from_secs(config.rag.timeout_secs.max(1));
    let mut backends: Vec<Arc<dyn RagBackend>> = Vec::new();

    for kind in &config.rag.backends {
        match kind {
            BackendKind::Local => match &engine {
                Some(engine) => backends.push(Arc::new(LocalBackend::new(engine.clone(), model.clone()))),
                None => warn!("Skipping local backend: no in-process engine"),
            },
            BackendKind::Remote => {
                backends.push(Arc::new(RemoteBackend::new(&config.rag.remote_url, timeout, model.clone())?));
            }
            BackendKind::Hosted => match &config.rag.hosted_url {
                Some(url) => backends.push(Arc::new(HostedBackend::new(
                    url,
                    timeout,
                    config.rag.hosted_vector_weight,
                    config.rag.hosted_bm25_weight,
                    model.clone(),
                )?)),
                None => warn!("Skipping hosted backend: rag.hosted_url is not set"),
            },
        }
    }

    info!(
        backends = ?backends.iter().map(|b| b.name().to_string()).collect::<Vec<_>>(),
        generation = model.is_some(),
        "Answer backends ready"
    );
    Ok(backends)
}

/// Chat model from `[llm]`, or `None` when no API key is configured.
pub fn build_model(config: &Config) -> Option<Arc<dyn LanguageModel>> {
    match OpenAiCompatibleModel::from_config(&config.llm) {
        Some(model) => Some(Arc::new(model)),
        None => {
            warn!("No language model API key configured; answers will fall back to a fixed message");
            None
        }
    }
}

/// Orchestrator over the configured backends.
pub fn build_orchestrator(config: &Config, engine: Option<Arc<KnowledgeEngine>>) -> Result<RagOrchestrator> {
    let model = build_model(config);
    let backends = build_backends(config, engine, model)?;
    Ok(RagOrchestrator::new(
        backends,
        &config.rag,
        GenerationOptions::from(&config.llm),
    ))
}
