use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::provider::EmbeddingProvider;
use crate::cache::{document_key, embedding_key, CacheStats, TtlCache};
use crate::config::CacheConfig;
use crate::error::{RagError, Result};

/// Embedding provider wrapped with input preparation, output validation and
/// two caches.
///
/// Ad-hoc text embeddings expire after the configured TTL. Corpus document
/// embeddings are keyed by id and content and never expire, and live in
/// their own cache so query traffic cannot evict them.
pub struct EmbeddingService {
    provider: Arc<dyn EmbeddingProvider>,
    query_cache: TtlCache<Vec<f32>>,
    document_cache: TtlCache<Vec<f32>>,
    text_ttl: Option<Duration>,
    max_input_chars: usize,
    cache_enabled: bool,
}

impl EmbeddingService {
    /// Service with the default `[cache]` settings.
    pub fn new(provider: Arc<dyn EmbeddingProvider>, max_input_chars: usize) -> Self {
        let defaults = CacheConfig::default();
        Self {
            provider,
            query_cache: TtlCache::new(defaults.max_entries),
            document_cache: TtlCache::new(defaults.max_entries),
            text_ttl: Some(Duration::from_secs(defaults.embedding_ttl_secs)),
            max_input_chars,
            cache_enabled: defaults.enabled,
        }
    }

    /// Size both caches and set the query TTL from `[cache]`.
    pub fn with_cache(mut self, config: &CacheConfig) -> Self {
        self.query_cache = TtlCache::new(config.max_entries);
        self.document_cache = TtlCache::new(config.max_entries);
        self.text_ttl = Some(Duration::from_secs(config.embedding_ttl_secs));
        self.cache_enabled = config.enabled;
        self
    }

    pub fn provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.provider
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.provider_name()
    }

    pub fn dimension(&self) -> usize {
        self.provider.embedding_dimension()
    }

    /// Trim, reject empty text and cut to `max_input_chars` characters.
    pub fn prepare(&self, text: &str) -> Result<String> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(RagError::embedding("text must not be empty"));
        }
        Ok(trimmed.chars().take(self.max_input_chars).collect())
    }

    /// Embed one ad-hoc text. Returns the vector and whether it came from cache.
    pub async fn embed_text(&self, text: &str, use_cache: bool) -> Result<(Vec<f32>, bool)> {
        let use_cache = use_cache && self.cache_enabled;
        let key = embedding_key(text);

        if use_cache {
            if let Some(hit) = self.query_cache.get(&key) {
                debug!("Embedding cache hit");
                return Ok((hit, true));
            }
        }

        let prepared = self.prepare(text)?;
        let vector = self
            .provider
            .embed_query(&prepared)
            .await
            .map_err(|e| RagError::embedding(format!("{:#}", e)))?;
        validate(&vector)?;

        if use_cache {
            self.query_cache.set(key, vector.clone(), self.text_ttl);
        }
        Ok((vector, false))
    }

    /// Embed corpus documents given as `(id, content)`.
    ///
    /// Documents whose id and prepared content are cached are served from
    /// cache. The rest go to the provider in one batch; if the batch fails
    /// each text is retried alone. A document whose embedding cannot be
    /// produced maps to `None`.
    pub async fn embed_documents(&self, docs: &[(String, String)]) -> Vec<Option<Vec<f32>>> {
        let mut out: Vec<Option<Vec<f32>>> = vec![None; docs.len()];
        let mut pending: Vec<(usize, String, String)> = Vec::new();

        for (i, (id, content)) in docs.iter().enumerate() {
            let text = match self.prepare(content) {
                Ok(text) => text,
                Err(e) => {
                    warn!(document = %id, "Skipping embedding: {}", e);
                    continue;
                }
            };
            let key = document_key(id, &text);
            if self.cache_enabled {
                if let Some(hit) = self.document_cache.get(&key) {
                    out[i] = Some(hit);
                    continue;
                }
            }
            pending.push((i, key, text));
        }

        if pending.is_empty() {
            return out;
        }

        let texts: Vec<String> = pending.iter().map(|(_, _, t)| t.clone()).collect();
        let batch = match self.provider.embed(&texts).await {
            Ok(vectors) if vectors.len() == texts.len() => vectors.into_iter().map(Some).collect(),
            Ok(vectors) => {
                warn!(
                    "Provider returned {} embeddings for {} documents, embedding individually",
                    vectors.len(),
                    texts.len()
                );
                self.embed_one_by_one(&texts).await
            }
            Err(e) => {
                warn!("Batch embedding failed, embedding individually: {:#}", e);
                self.embed_one_by_one(&texts).await
            }
        };

        for ((i, key, _), vector) in pending.into_iter().zip(batch) {
            match vector.filter(|v| validate(v).is_ok()) {
                Some(v) => {
                    if self.cache_enabled {
                        self.document_cache.set(key, v.clone(), None);
                    }
                    out[i] = Some(v);
                }
                None => warn!(document = %docs[i].0, "No usable embedding, document stays lexical-only"),
            }
        }

        out
    }

    async fn embed_one_by_one(&self, texts: &[String]) -> Vec<Option<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.provider.embed_query(text).await.ok());
        }
        out
    }

    pub fn cache_stats(&self) -> CacheStats {
        CacheStats::combine(&[self.query_cache.stats(), self.document_cache.stats()])
    }

    pub fn clear_cache(&self) {
        self.query_cache.clear();
        self.document_cache.clear();
    }
}

fn validate(vector: &[f32]) -> Result<()> {
    if vector.is_empty() {
        return Err(RagError::embedding("provider returned an empty vector"));
    }
    if vector.iter().any(|v| !v.is_finite()) {
        return Err(RagError::embedding("provider returned a non-finite value"));
    }
    Ok(())
}
