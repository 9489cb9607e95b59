//! Prometheus metrics for ragtim
//!
//! Search, cache, embedding and answer-pipeline counters exposed at `/metrics`.

use lazy_static::lazy_static;
use prometheus::core::Collector;
use prometheus::{Counter, CounterVec, Encoder, Gauge, Histogram, HistogramOpts, Opts, Registry, TextEncoder};
use std::sync::Once;

lazy_static! {
    /// Every ragtim collector lives here, not in the prometheus default registry
    pub static ref REGISTRY: Registry = Registry::new();

    // search metrics

    /// Uncached rankings of the active snapshot
    pub static ref SEARCH_REQUESTS: Counter = Counter::with_opts(
        Opts::new("ragtim_search_requests_total", "Searches ranked against the index snapshot")
    ).expect("Failed to create SEARCH_REQUESTS counter");

    pub static ref SEARCH_LATENCY: Histogram = Histogram::with_opts(
        HistogramOpts::new("ragtim_search_latency_seconds", "Search request latency in seconds")
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0])
    ).expect("Failed to create SEARCH_LATENCY histogram");

    pub static ref SEARCH_RESULTS: Histogram = Histogram::with_opts(
        HistogramOpts::new("ragtim_search_results_count", "Number of search results returned per request")
            .buckets(vec![0.0, 1.0, 5.0, 10.0, 20.0, 50.0])
    ).expect("Failed to create SEARCH_RESULTS histogram");

    /// Documents in the active index snapshot
    pub static ref INDEXED_DOCUMENTS: Gauge = Gauge::with_opts(
        Opts::new("ragtim_indexed_documents", "Documents in the active index snapshot")
    ).expect("Failed to create INDEXED_DOCUMENTS gauge");

    /// Documents in the active snapshot that carry an embedding
    pub static ref EMBEDDED_DOCUMENTS: Gauge = Gauge::with_opts(
        Opts::new("ragtim_embedded_documents", "Documents in the active snapshot that carry an embedding")
    ).expect("Failed to create EMBEDDED_DOCUMENTS gauge");

    // cache metrics

    pub static ref CACHE_HITS: Counter = Counter::with_opts(
        Opts::new("ragtim_cache_hits_total", "Cache lookups that found a live entry")
    ).expect("Failed to create CACHE_HITS counter");

    pub static ref CACHE_MISSES: Counter = Counter::with_opts(
        Opts::new("ragtim_cache_misses_total", "Cache lookups that found nothing or an expired entry")
    ).expect("Failed to create CACHE_MISSES counter");

    // embedding metrics

    /// Provider calls, one per batch
    pub static ref EMBEDDING_REQUESTS: Counter = Counter::with_opts(
        Opts::new("ragtim_embedding_requests_total", "Embedding provider calls")
    ).expect("Failed to create EMBEDDING_REQUESTS counter");

    pub static ref EMBEDDING_LATENCY: Histogram = Histogram::with_opts(
        HistogramOpts::new("ragtim_embedding_latency_seconds", "Embedding generation latency in seconds")
            .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.0])
    ).expect("Failed to create EMBEDDING_LATENCY histogram");

    // answer pipeline metrics

    /// Answers produced, labelled by outcome
    pub static ref RAG_ANSWERS: CounterVec = CounterVec::new(
        Opts::new("ragtim_rag_answers_total", "Answers produced by the pipeline"),
        &["outcome"]
    ).expect("Failed to create RAG_ANSWERS counter");

    /// Backend attempts that fell through to the next strategy
    pub static ref RAG_FALLBACKS: CounterVec = CounterVec::new(
        Opts::new("ragtim_rag_fallbacks_total", "Backend attempts that failed and triggered a fallback"),
        &["backend", "kind"]
    ).expect("Failed to create RAG_FALLBACKS counter");

    /// Language model call latency in seconds
    pub static ref GENERATION_LATENCY: Histogram = Histogram::with_opts(
        HistogramOpts::new("ragtim_generation_latency_seconds", "Language model call latency in seconds")
            .buckets(vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0])
    ).expect("Failed to create GENERATION_LATENCY histogram");

    /// End-to-end answer latency in seconds
    pub static ref RAG_LATENCY: Histogram = Histogram::with_opts(
        HistogramOpts::new("ragtim_rag_latency_seconds", "End-to-end answer latency in seconds")
            .buckets(vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0])
    ).expect("Failed to create RAG_LATENCY histogram");
}

static REGISTER: Once = Once::new();

/// Register all metrics with the global registry. Safe to call repeatedly.
pub fn register_metrics() {
    REGISTER.call_once(|| {
        let collectors: Vec<(&str, Box<dyn Collector>)> = vec![
            ("SEARCH_REQUESTS", Box::new(SEARCH_REQUESTS.clone())),
            ("SEARCH_LATENCY", Box::new(SEARCH_LATENCY.clone())),
            ("SEARCH_RESULTS", Box::new(SEARCH_RESULTS.clone())),
            ("INDEXED_DOCUMENTS", Box::new(INDEXED_DOCUMENTS.clone())),
            ("EMBEDDED_DOCUMENTS", Box::new(EMBEDDED_DOCUMENTS.clone())),
            ("CACHE_HITS", Box::new(CACHE_HITS.clone())),
            ("CACHE_MISSES", Box::new(CACHE_MISSES.clone())),
            ("EMBEDDING_REQUESTS", Box::new(EMBEDDING_REQUESTS.clone())),
            ("EMBEDDING_LATENCY", Box::new(EMBEDDING_LATENCY.clone())),
            ("RAG_ANSWERS", Box::new(RAG_ANSWERS.clone())),
            ("RAG_FALLBACKS", Box::new(RAG_FALLBACKS.clone())),
            ("GENERATION_LATENCY", Box::new(GENERATION_LATENCY.clone())),
            ("RAG_LATENCY", Box::new(RAG_LATENCY.clone())),
        ];

        for (name, collector) in collectors {
            if let Err(e) = REGISTRY.register(collector) {
                tracing::error!("Failed to register {}: {}", name, e);
            }
        }
    });
}

/// Encode every registered metric in the Prometheus text exposition format.
///
/// Encoding failures are logged and yield an empty body.
pub fn gather_metrics() -> String {
    let mut buffer = Vec::new();
    if let Err(e) = TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer) {
        tracing::error!("Metric encoding failed: {}", e);
        return String::new();
    }

    match String::from_utf8(buffer) {
        Ok(text) => text,
        Err(e) => {
            tracing::error!("Encoded metrics are not UTF-8: {}", e);
            String::new()
        }
    }
}

/// Process-local metric values shown by `ragtim stats`
pub struct MetricSnapshot {
    pub searches: f64,
    pub search_latency_mean: f64,
    pub cache_hits: f64,
    pub cache_misses: f64,
    pub embedding_calls: f64,
    pub embedding_latency_mean: f64,
}

impl MetricSnapshot {
    pub fn capture() -> Self {
        Self {
            searches: SEARCH_REQUESTS.get(),
            search_latency_mean: histogram_mean(&SEARCH_LATENCY),
            cache_hits: CACHE_HITS.get(),
            cache_misses: CACHE_MISSES.get(),
            embedding_calls: EMBEDDING_REQUESTS.get(),
            embedding_latency_mean: histogram_mean(&EMBEDDING_LATENCY),
        }
    }

    pub fn cache_hit_rate(&self) -> f64 {
        let lookups = self.cache_hits + self.cache_misses;
        if lookups == 0.0 {
            0.0
        } else {
            self.cache_hits / lookups
        }
    }
}

fn histogram_mean(histogram: &Histogram) -> f64 {
    match histogram.get_sample_count() {
        0 => 0.0,
        n => histogram.get_sample_sum() / n as f64,
    }
}
