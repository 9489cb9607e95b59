//! Immutable index snapshots and the handle that swaps them.
//!
//! Queries clone the current `Arc` and work on that snapshot for their whole
//! lifetime. A rebuild constructs a complete new snapshot off to the side and
//! replaces the reference in one write, so no query sees a partial index.

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tracing::warn;

use super::bm25::{Bm25Params, Bm25Scorer, LexicalIndex};
use super::hybrid::SearchResult;
use super::vector::{VectorIndex, VectorScorer};
use crate::knowledge::Document;

pub struct IndexSnapshot {
    documents: Vec<Document>,
    lexical: LexicalIndex,
    vector: VectorIndex,
    version: u64,
    built_at: DateTime<Utc>,
}

impl IndexSnapshot {
    /// Index `documents`. Duplicate ids keep their first occurrence and
    /// embeddings of the wrong dimension are dropped.
    pub fn build(documents: Vec<Document>, version: u64) -> Self {
        let mut seen = HashSet::new();
        let mut documents: Vec<Document> = documents
            .into_iter()
            .filter(|doc| {
                let fresh = seen.insert(doc.id.clone());
                if !fresh {
                    warn!(document = %doc.id, "Duplicate document id, keeping first occurrence");
                }
                fresh
            })
            .collect();

        let lexical = LexicalIndex::build(&documents);
        let (vector, rejected) = VectorIndex::build(&documents);
        if !rejected.is_empty() {
            warn!(
                rejected = rejected.len(),
                dimension = ?vector.dimension(),
                "Embeddings with a mismatched dimension were dropped"
            );
            let rejected: HashSet<String> = rejected.into_iter().collect();
            for doc in documents.iter_mut().filter(|d| rejected.contains(&d.id)) {
                doc.embedding = None;
            }
        }

        Self {
            documents,
            lexical,
            vector,
            version,
            built_at: Utc::now(),
        }
    }

    pub fn empty() -> Self {
        Self::build(Vec::new(), 0)
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn lexical(&self) -> &LexicalIndex {
        &self.lexical
    }

    pub fn vector(&self) -> &VectorIndex {
        &self.vector
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    pub fn bm25_search(&self, query: &str, top_k: usize, params: Bm25Params, boost_divisor: f32) -> Vec<SearchResult> {
        Bm25Scorer::new(&self.lexical, params, boost_divisor)
            .rank(query, &self.documents, top_k)
            .into_iter()
            .map(|(doc, score)| SearchResult::bm25(doc.clone(), score))
            .collect()
    }

    pub fn vector_search(&self, query_vector: &[f32], top_k: usize, tie_epsilon: f32) -> Vec<SearchResult> {
        VectorScorer::new(&self.vector, tie_epsilon)
            .rank(query_vector, &self.documents, top_k)
            .into_iter()
            .map(|(doc, score)| SearchResult::vector(doc.clone(), score))
            .collect()
    }
}

/// Shared pointer to the current snapshot.
pub struct SnapshotHandle {
    current: RwLock<Arc<IndexSnapshot>>,
    next_version: AtomicU64,
}

impl SnapshotHandle {
    pub fn new(snapshot: IndexSnapshot) -> Self {
        let next = snapshot.version() + 1;
        Self {
            current: RwLock::new(Arc::new(snapshot)),
            next_version: AtomicU64::new(next),
        }
    }

    /// The snapshot queries should use right now.
    pub fn load(&self) -> Arc<IndexSnapshot> {
        self.current.read().unwrap_or_else(|p| p.into_inner()).clone()
    }

    /// Version number for the next snapshot to be built.
    pub fn allocate_version(&self) -> u64 {
        self.next_version.fetch_add(1, Ordering::SeqCst)
    }

    /// Install `snapshot` if it is newer than the current one, returning the
    /// snapshot it replaced. An older snapshot is dropped and `None` returned.
    pub fn swap(&self, snapshot: IndexSnapshot) -> Option<Arc<IndexSnapshot>> {
        let mut current = self.current.write().unwrap_or_else(|p| p.into_inner());
        if snapshot.version() <= current.version() {
            return None;
        }
        Some(std::mem::replace(&mut *current, Arc::new(snapshot)))
    }
}
