//! End-to-end answer pipeline.
//!
//! One pass per backend, in configured order:
//! `CheckingBackend -> Retrieving -> AssemblingContext -> GeneratingAnswer -> PostProcessing -> Done`.
//! A failure in checking, retrieval or generation moves to `ErrorFallback`,
//! which either tries the next backend or ends with a stable message.

use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::backend::RagBackend;
use super::context::ContextAssembler;
use super::prompt::{build_messages, strip_markdown, NO_INFORMATION_ANSWER};
use super::typewriter::Typewriter;
use crate::config::{RagConfig, SearchMode};
use crate::error::{RagError, Result};
use crate::llm::{ChatMessage, GenerationOptions};
use crate::metrics::{RAG_ANSWERS, RAG_FALLBACKS, RAG_LATENCY};
use crate::search::SearchResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Idle,
    CheckingBackend,
    Retrieving,
    AssemblingContext,
    GeneratingAnswer,
    PostProcessing,
    Done,
    ErrorFallback,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::CheckingBackend => "checking_backend",
            Self::Retrieving => "retrieving",
            Self::AssemblingContext => "assembling_context",
            Self::GeneratingAnswer => "generating_answer",
            Self::PostProcessing => "post_processing",
            Self::Done => "done",
            Self::ErrorFallback => "error_fallback",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerOutcome {
    /// The model produced a grounded answer
    Answered,
    /// Retrieval found nothing; canned reply, no model call
    NoInformation,
    /// Every backend was unreachable or unhealthy
    Unavailable,
    /// Every backend failed for another reason
    Failed,
}

impl AnswerOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Answered => "answered",
            Self::NoInformation => "no_information",
            Self::Unavailable => "unavailable",
            Self::Failed => "failed",
        }
    }
}

/// A document the answer was grounded on.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceRef {
    pub id: String,
    pub label: String,
    pub score: f32,
    pub search_type: SearchMode,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RagAnswer {
    pub answer: String,
    pub outcome: AnswerOutcome,
    /// Backend that produced the answer, if any did
    pub backend: Option<String>,
    pub sources: Vec<SourceRef>,
    pub states: Vec<PipelineState>,
    pub request_id: String,
    pub processing_time_ms: u64,
}

impl RagAnswer {
    /// Word-by-word reveal of the answer.
    pub fn typewriter(&self) -> Typewriter {
        Typewriter::new(&self.answer)
    }
}

/// Successful end of one backend pass.
enum Attempt {
    Answered { answer: String, sources: Vec<SourceRef> },
    NoInformation,
}

pub struct RagOrchestrator {
    backends: Vec<Arc<dyn RagBackend>>,
    assembler: ContextAssembler,
    options: GenerationOptions,
    mode: SearchMode,
    retrieval_top_k: usize,
    history_turns: usize,
    timeout: Duration,
}

impl RagOrchestrator {
    pub fn new(backends: Vec<Arc<dyn RagBackend>>, config: &RagConfig, options: GenerationOptions) -> Self {
        Self {
            backends,
            assembler: ContextAssembler::from(config),
            options,
            mode: SearchMode::Hybrid,
            retrieval_top_k: config.retrieval_top_k.max(1),
            history_turns: config.history_turns,
            timeout: Duration::from_secs(config.timeout_secs.max(1)),
        }
    }

    pub fn with_mode(mut self, mode: SearchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn backend_names(&self) -> Vec<String> {
        self.backends.iter().map(|b| b.name().to_string()).collect()
    }

    /// Answer `query`. Only an empty query is an error; every other failure
    /// becomes a stable message in the returned answer.
    pub async fn answer(&self, query: &str, history: &[ChatMessage]) -> Result<RagAnswer> {
        let query = query.trim();
        if query.is_empty() {
            return Err(RagError::validation("message must be a non-empty string"));
        }

        let start = Instant::now();
        let request_id = Uuid::new_v4().to_string();
        let mut states = vec![PipelineState::Idle];
        let mut last_error: Option<RagError> = None;

        for backend in &self.backends {
            match self.attempt(backend.as_ref(), query, history, &request_id, &mut states).await {
                Ok(attempt) => {
                    transition(&mut states, PipelineState::Done, &request_id);
                    let (answer, outcome, sources) = match attempt {
                        Attempt::Answered { answer, sources } => (answer, AnswerOutcome::Answered, sources),
                        Attempt::NoInformation => {
                            (NO_INFORMATION_ANSWER.to_string(), AnswerOutcome::NoInformation, Vec::new())
                        }
                    };
                    return Ok(self.finish(answer, outcome, Some(backend.name()), sources, states, request_id, start));
                }
                Err(e) => {
                    transition(&mut states, PipelineState::ErrorFallback, &request_id);
                    RAG_FALLBACKS.with_label_values(&[backend.name(), e.kind()]).inc();
                    warn!(
                        request_id = %request_id,
                        backend = backend.name(),
                        kind = e.kind(),
                        "Backend failed, falling back: {}",
                        e
                    );
                    last_error = Some(e);
                }
            }
        }

        let error = last_error.unwrap_or_else(|| RagError::unavailable("no retrieval backends configured"));
        let outcome = match error {
            RagError::BackendUnavailable(_) => AnswerOutcome::Unavailable,
            _ => AnswerOutcome::Failed,
        };
        Ok(self.finish(
            error.user_message().to_string(),
            outcome,
            None,
            Vec::new(),
            states,
            request_id,
            start,
        ))
    }

    async fn attempt(
        &self,
        backend: &dyn RagBackend,
        query: &str,
        history: &[ChatMessage],
        request_id: &str,
        states: &mut Vec<PipelineState>,
    ) -> Result<Attempt> {
        let name = backend.name();

        transition(states, PipelineState::CheckingBackend, request_id);
        self.bounded(name, "health check", backend.health_check()).await?;

        transition(states, PipelineState::Retrieving, request_id);
        let results = self
            .bounded(name, "search", backend.search(query, self.retrieval_top_k, self.mode))
            .await?;
        if results.is_empty() {
            debug!(request_id = request_id, backend = name, "No results, skipping generation");
            return Ok(Attempt::NoInformation);
        }

        transition(states, PipelineState::AssemblingContext, request_id);
        let context = self.assembler.assemble(&results);
        debug!(
            request_id = request_id,
            included = context.included.len(),
            truncated = context.truncated,
            tokens = context.estimated_tokens,
            "Context assembled"
        );
        let sources = source_refs(&results, &context.included);

        transition(states, PipelineState::GeneratingAnswer, request_id);
        let messages = build_messages(&context.text, history, query, self.history_turns);
        let raw = self
            .bounded(name, "generation", backend.generate(&messages, self.options))
            .await?;

        transition(states, PipelineState::PostProcessing, request_id);
        let answer = strip_markdown(&raw);
        if answer.is_empty() {
            return Err(RagError::generation("answer was empty after removing formatting"));
        }

        Ok(Attempt::Answered { answer, sources })
    }

    /// Apply the per-call timeout; a timeout counts as an unavailable backend.
    async fn bounded<T, F>(&self, backend: &str, stage: &str, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::time::timeout(self.timeout, call).await.map_err(|_| {
            RagError::unavailable(format!("{} {} timed out after {:?}", backend, stage, self.timeout))
        })?
    }

    #[allow(clippy::too_many_arguments)]
    fn finish(
        &self,
        answer: String,
        outcome: AnswerOutcome,
        backend: Option<&str>,
        sources: Vec<SourceRef>,
        states: Vec<PipelineState>,
        request_id: String,
        start: Instant,
    ) -> RagAnswer {
        let elapsed = start.elapsed();
        RAG_ANSWERS.with_label_values(&[outcome.as_str()]).inc();
        RAG_LATENCY.observe(elapsed.as_secs_f64());

        info!(
            request_id = %request_id,
            outcome = outcome.as_str(),
            backend = backend.unwrap_or("none"),
            sources = sources.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Answer ready"
        );

        RagAnswer {
            answer,
            outcome,
            backend: backend.map(String::from),
            sources,
            states,
            request_id,
            processing_time_ms: elapsed.as_millis() as u64,
        }
    }

    /// Corpus statistics from the first backend that can provide them.
    pub async fn stats(&self) -> Result<serde_json::Value> {
        let mut last_error = None;
        for backend in &self.backends {
            match self.bounded(backend.name(), "stats", backend.get_stats()).await {
                Ok(stats) => return Ok(stats),
                Err(e) => {
                    warn!(backend = backend.name(), "Stats unavailable: {}", e);
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| RagError::unavailable("no retrieval backends configured")))
    }
}

fn transition(states: &mut Vec<PipelineState>, next: PipelineState, request_id: &str) {
    if let Some(previous) = states.last() {
        debug!(request_id = request_id, from = %previous, to = %next, "State transition");
    }
    states.push(next);
}

fn source_refs(results: &[SearchResult], included: &[String]) -> Vec<SourceRef> {
    included
        .iter()
        .filter_map(|id| results.iter().find(|r| &r.document.id == id))
        .map(|r| SourceRef {
            id: r.document.id.clone(),
            label: r.document.label().to_string(),
            score: r.score,
            search_type: r.search_type,
        })
        .collect()
}
