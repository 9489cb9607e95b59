//! The knowledge engine: index build, mode dispatch, response caching and stats.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::bm25::Bm25Params;
use super::hybrid::{fuse, FusionConfig, SearchResult};
use super::snapshot::{IndexSnapshot, SnapshotHandle};
use crate::cache::{search_key, CacheStats, TtlCache};
use crate::config::{CacheConfig, SearchConfig, SearchMode};
use crate::embeddings::EmbeddingService;
use crate::error::{RagError, Result};
use crate::knowledge::Document;
use crate::metrics::{EMBEDDED_DOCUMENTS, INDEXED_DOCUMENTS, SEARCH_LATENCY, SEARCH_REQUESTS, SEARCH_RESULTS};

/// Response of one search request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub query: String,
    pub top_k: usize,
    pub search_type: SearchMode,
    pub processing_time_ms: u64,
    pub cached: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bm25Parameters {
    pub k1: f32,
    pub b: f32,
}

/// Corpus statistics for `/api/knowledge-stats`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeStats {
    pub total_documents: usize,
    pub documents_by_type: BTreeMap<String, usize>,
    pub unique_terms: usize,
    pub has_embeddings: bool,
    pub embedded_documents: usize,
    pub search_capabilities: Vec<String>,
    pub average_doc_length: u64,
    pub bm25_parameters: Bm25Parameters,
    pub is_vector_search_enabled: bool,
    #[serde(default)]
    pub snapshot_version: u64,
    #[serde(default)]
    pub built_at: Option<DateTime<Utc>>,
}

pub struct KnowledgeEngine {
    snapshot: SnapshotHandle,
    embeddings: Arc<EmbeddingService>,
    search_cache: TtlCache<SearchResponse>,
    search_ttl: Duration,
    cache_enabled: bool,
    config: SearchConfig,
}

impl KnowledgeEngine {
    /// Build the engine and its first snapshot from `documents`.
    pub async fn build(
        documents: Vec<Document>,
        embeddings: Arc<EmbeddingService>,
        config: SearchConfig,
        cache: &CacheConfig,
    ) -> Self {
        let engine = Self {
            snapshot: SnapshotHandle::new(IndexSnapshot::empty()),
            embeddings,
            search_cache: TtlCache::new(cache.max_entries),
            search_ttl: Duration::from_secs(cache.search_ttl_secs),
            cache_enabled: cache.enabled,
            config,
        };
        engine.rebuild(documents).await;
        engine
    }

    /// Build a new snapshot from `documents` and swap it in.
    ///
    /// In-flight queries finish on the previous snapshot. Documents whose
    /// embedding fails are indexed lexically only. Cached search responses
    /// are dropped since they describe the old corpus. If a rebuild started
    /// later has already installed its snapshot, this one is discarded.
    ///
    /// Returns the version of the snapshot active afterwards.
    pub async fn rebuild(&self, mut documents: Vec<Document>) -> u64 {
        let start = Instant::now();

        let inputs: Vec<(String, String)> = documents
            .iter()
            .map(|d| (d.id.clone(), d.content.clone()))
            .collect();
        let vectors = self.embeddings.embed_documents(&inputs).await;
        for (doc, vector) in documents.iter_mut().zip(vectors) {
            doc.embedding = vector;
        }

        let version = self.snapshot.allocate_version();
        let snapshot = IndexSnapshot::build(documents, version);

        let total = snapshot.documents().len();
        let embedded = snapshot.vector().len();

        if self.snapshot.swap(snapshot).is_none() {
            let active = self.snapshot.load().version();
            warn!(version = version, active = active, "Newer snapshot already active, discarding build");
            return active;
        }
        INDEXED_DOCUMENTS.set(total as f64);
        EMBEDDED_DOCUMENTS.set(embedded as f64);
        self.search_cache.clear();

        info!(
            version = version,
            documents = total,
            embedded = embedded,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Index snapshot built"
        );
        version
    }

    pub fn snapshot(&self) -> Arc<IndexSnapshot> {
        self.snapshot.load()
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn embeddings(&self) -> &Arc<EmbeddingService> {
        &self.embeddings
    }

    fn bm25_params(&self) -> Bm25Params {
        Bm25Params {
            k1: self.config.k1,
            b: self.config.b,
        }
    }

    /// Reject an empty query or a `top_k` outside `1..=max_top_k`.
    pub fn validate(&self, query: &str, top_k: usize) -> Result<()> {
        if query.trim().is_empty() {
            return Err(RagError::validation("query must be a non-empty string"));
        }
        if top_k == 0 || top_k > self.config.max_top_k {
            return Err(RagError::validation(format!(
                "topK must be between 1 and {}",
                self.config.max_top_k
            )));
        }
        Ok(())
    }

    /// Search with response caching.
    ///
    /// A cache hit returns the stored results with `cached: true` and a zero
    /// processing time. Responses are keyed by snapshot version, and a
    /// response whose vector ranking was skipped because the query could not
    /// be embedded is not stored.
    pub async fn search(&self, query: &str, top_k: usize, mode: SearchMode) -> Result<SearchResponse> {
        self.validate(query, top_k)?;

        let snapshot = self.snapshot.load();
        let key = search_key(snapshot.version(), mode, top_k, query);
        if self.cache_enabled {
            if let Some(mut hit) = self.search_cache.get(&key) {
                debug!(search_type = %mode, query = query, "Search cache hit");
                hit.cached = true;
                hit.processing_time_ms = 0;
                return Ok(hit);
            }
        }

        let start = Instant::now();
        let (results, degraded) = self.rank(&snapshot, query, top_k, mode).await;

        let response = SearchResponse {
            results,
            query: query.to_string(),
            top_k,
            search_type: mode,
            processing_time_ms: start.elapsed().as_millis() as u64,
            cached: false,
        };

        if self.cache_enabled && !degraded {
            self.search_cache.set(key, response.clone(), Some(self.search_ttl));
        }
        Ok(response)
    }

    /// Rank the current snapshot for `query`. No caching, no validation.
    pub async fn search_uncached(&self, query: &str, top_k: usize, mode: SearchMode) -> Vec<SearchResult> {
        let snapshot = self.snapshot.load();
        self.rank(&snapshot, query, top_k, mode).await.0
    }

    /// Results and whether vector ranking was skipped for an embedding failure.
    async fn rank(
        &self,
        snapshot: &IndexSnapshot,
        query: &str,
        top_k: usize,
        mode: SearchMode,
    ) -> (Vec<SearchResult>, bool) {
        SEARCH_REQUESTS.inc();
        let start = Instant::now();

        let (results, degraded) = match mode {
            SearchMode::Bm25 => (self.bm25(snapshot, query, top_k), false),
            SearchMode::Vector => self.vector(snapshot, query, top_k).await,
            SearchMode::Hybrid => {
                let (vector, degraded) = self.vector(snapshot, query, top_k).await;
                let bm25 = self.bm25(snapshot, query, top_k);
                (fuse(vector, bm25, top_k, FusionConfig::from(&self.config)), degraded)
            }
        };

        let elapsed = start.elapsed();
        SEARCH_LATENCY.observe(elapsed.as_secs_f64());
        SEARCH_RESULTS.observe(results.len() as f64);

        info!(
            search_type = %mode,
            query = query,
            results = results.len(),
            snapshot = snapshot.version(),
            degraded = degraded,
            elapsed_ms = elapsed.as_millis() as u64,
            "Search completed"
        );

        (results, degraded)
    }

    fn bm25(&self, snapshot: &IndexSnapshot, query: &str, top_k: usize) -> Vec<SearchResult> {
        snapshot.bm25_search(query, top_k, self.bm25_params(), self.config.priority_boost_divisor)
    }

    /// Vector ranking; an unembeddable query degrades to no vector results
    /// and is flagged so the response is not cached.
    async fn vector(&self, snapshot: &IndexSnapshot, query: &str, top_k: usize) -> (Vec<SearchResult>, bool) {
        if snapshot.vector().is_empty() {
            return (Vec::new(), false);
        }
        match self.embeddings.embed_text(query, true).await {
            Ok((query_vector, _)) => (
                snapshot.vector_search(&query_vector, top_k, self.config.tie_epsilon),
                false,
            ),
            Err(e) => {
                warn!(query = query, "Query embedding failed, skipping vector ranking: {}", e);
                (Vec::new(), true)
            }
        }
    }

    pub fn stats(&self) -> KnowledgeStats {
        let snapshot = self.snapshot.load();

        let mut documents_by_type = BTreeMap::new();
        for doc in snapshot.documents() {
            *documents_by_type
                .entry(doc.metadata.doc_type.to_string())
                .or_insert(0) += 1;
        }

        let embedded = snapshot.vector().len();
        let has_embeddings = embedded > 0;
        let mut capabilities = Vec::new();
        if has_embeddings {
            capabilities.push("Vector Search".to_string());
        }
        if snapshot.lexical().unique_terms() > 0 {
            capabilities.push("BM25 Search".to_string());
        }
        if has_embeddings {
            capabilities.push("Hybrid Search".to_string());
        }

        KnowledgeStats {
            total_documents: snapshot.documents().len(),
            documents_by_type,
            unique_terms: snapshot.lexical().unique_terms(),
            has_embeddings,
            embedded_documents: embedded,
            search_capabilities: capabilities,
            average_doc_length: snapshot.lexical().avg_doc_length().round() as u64,
            bm25_parameters: Bm25Parameters {
                k1: self.config.k1,
                b: self.config.b,
            },
            is_vector_search_enabled: has_embeddings,
            snapshot_version: snapshot.version(),
            built_at: Some(snapshot.built_at()),
        }
    }

    pub fn search_cache_stats(&self) -> CacheStats {
        self.search_cache.stats()
    }

    pub fn clear_search_cache(&self) {
        self.search_cache.clear();
    }
}
