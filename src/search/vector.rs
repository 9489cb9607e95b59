//! Cosine-similarity search over precomputed document embeddings.

use std::collections::HashMap;

use crate::knowledge::Document;

/// Cosine similarity of two vectors.
///
/// Returns 0 when the lengths differ or either vector has zero magnitude.
/// The result is clamped to `[-1, 1]` to absorb rounding.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0)
}

/// Document embeddings keyed by document id. All vectors share one dimension.
#[derive(Debug, Clone, Default)]
pub struct VectorIndex {
    vectors: HashMap<String, Vec<f32>>,
    dimension: Option<usize>,
}

impl VectorIndex {
    /// Collect the embeddings attached to `documents`.
    ///
    /// The first embedding fixes the dimension; embeddings of any other
    /// length are skipped and returned as rejected ids.
    pub fn build(documents: &[Document]) -> (Self, Vec<String>) {
        let mut index = Self::default();
        let mut rejected = Vec::new();

        for doc in documents {
            let Some(embedding) = &doc.embedding else {
                continue;
            };
            let dimension = *index.dimension.get_or_insert(embedding.len());
            if embedding.len() == dimension && !embedding.is_empty() {
                index.vectors.insert(doc.id.clone(), embedding.clone());
            } else {
                rejected.push(doc.id.clone());
            }
        }

        (index, rejected)
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    pub fn contains(&self, doc_id: &str) -> bool {
        self.vectors.contains_key(doc_id)
    }

    pub fn get(&self, doc_id: &str) -> Option<&[f32]> {
        self.vectors.get(doc_id).map(Vec::as_slice)
    }
}

/// Ranks embedded documents against a query vector.
pub struct VectorScorer<'a> {
    index: &'a VectorIndex,
    tie_epsilon: f32,
}

impl<'a> VectorScorer<'a> {
    pub fn new(index: &'a VectorIndex, tie_epsilon: f32) -> Self {
        Self { index, tie_epsilon }
    }

    /// Top `top_k` embedded documents by cosine similarity, with near-ties
    /// ordered by priority.
    pub fn rank<'d>(&self, query: &[f32], documents: &'d [Document], top_k: usize) -> Vec<(&'d Document, f32)> {
        if query.is_empty() || self.index.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(&Document, f32)> = documents
            .iter()
            .filter_map(|doc| {
                self.index
                    .get(&doc.id)
                    .map(|embedding| (doc, cosine_similarity(query, embedding)))
            })
            .collect();

        order_with_priority_ties(&mut scored, self.tie_epsilon);
        scored.truncate(top_k);
        scored
    }
}

/// Sort by score descending, then reorder runs of near-equal scores by
/// priority descending.
///
/// A run starts at its highest score and takes every following result
/// within `epsilon` of that anchor. Anchoring keeps the ordering total, so a
/// long chain of small gaps cannot pull a low score ahead of a high one.
pub fn order_with_priority_ties(scored: &mut [(&Document, f32)], epsilon: f32) {
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));

    let mut start = 0;
    while start < scored.len() {
        let anchor = scored[start].1;
        let mut end = start + 1;
        while end < scored.len() && anchor - scored[end].1 < epsilon {
            end += 1;
        }
        scored[start..end].sort_by(|a, b| b.0.priority().cmp(&a.0.priority()));
        start = end;
    }
}
