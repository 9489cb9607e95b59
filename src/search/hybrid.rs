//! Fusion of vector and BM25 rankings.
//!
//! Documents found by both signals get the arithmetic mean of their two
//! scores and the `hybrid` type. Documents found by one signal keep that
//! score and type. The merged list is sorted and truncated to `top_k`.
//!
//! BM25 scores are unbounded while cosine scores lie in `[-1, 1]`, so the
//! plain mean favours lexical matches. `FusionConfig::normalize` divides each
//! signal by its list maximum and applies a weight before averaging.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::{SearchConfig, SearchMode};
use crate::knowledge::Document;

/// One ranked document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub document: Document,
    pub score: f32,
    pub search_type: SearchMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector_score: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bm25_score: Option<f32>,
}

impl SearchResult {
    pub fn vector(document: Document, score: f32) -> Self {
        Self {
            document,
            score,
            search_type: SearchMode::Vector,
            vector_score: Some(score),
            bm25_score: None,
        }
    }

    pub fn bm25(document: Document, score: f32) -> Self {
        Self {
            document,
            score,
            search_type: SearchMode::Bm25,
            vector_score: None,
            bm25_score: Some(score),
        }
    }
}

/// Optional rescaling applied before averaging.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionConfig {
    pub normalize: bool,
    pub vector_weight: f32,
    pub bm25_weight: f32,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            normalize: false,
            vector_weight: 1.0,
            bm25_weight: 1.0,
        }
    }
}

impl From<&SearchConfig> for FusionConfig {
    fn from(config: &SearchConfig) -> Self {
        Self {
            normalize: config.normalize_scores,
            vector_weight: config.vector_weight,
            bm25_weight: config.bm25_weight,
        }
    }
}

/// Merge the two single-signal lists by document id.
///
/// Both inputs are expected best-first; ties in the output keep the order in
/// which documents were first seen (vector list first).
pub fn fuse(
    vector_results: Vec<SearchResult>,
    bm25_results: Vec<SearchResult>,
    top_k: usize,
    config: FusionConfig,
) -> Vec<SearchResult> {
    let (vector_results, bm25_results) = if config.normalize {
        (
            rescale(vector_results, config.vector_weight),
            rescale(bm25_results, config.bm25_weight),
        )
    } else {
        (vector_results, bm25_results)
    };

    let mut merged: Vec<SearchResult> = Vec::with_capacity(vector_results.len() + bm25_results.len());
    let mut positions: HashMap<String, usize> = HashMap::new();

    for result in vector_results {
        positions.insert(result.document.id.clone(), merged.len());
        merged.push(result);
    }

    for result in bm25_results {
        match positions.get(&result.document.id) {
            Some(&pos) => {
                let existing = &mut merged[pos];
                existing.score = (existing.score + result.score) / 2.0;
                existing.search_type = SearchMode::Hybrid;
                existing.bm25_score = result.bm25_score;
            }
            None => {
                positions.insert(result.document.id.clone(), merged.len());
                merged.push(result);
            }
        }
    }

    merged.sort_by(|a, b| b.score.total_cmp(&a.score));
    merged.truncate(top_k);
    merged
}

/// Divide every score by the list maximum, then multiply by `weight`.
///
/// Component scores are rescaled too so they stay consistent with `score`.
fn rescale(mut results: Vec<SearchResult>, weight: f32) -> Vec<SearchResult> {
    let max = results.iter().map(|r| r.score).fold(f32::NEG_INFINITY, f32::max);
    if !max.is_finite() || max <= 0.0 {
        return results;
    }

    for result in &mut results {
        result.score = result.score / max * weight;
        if let Some(v) = result.vector_score.as_mut() {
            *v = *v / max * weight;
        }
        if let Some(b) = result.bm25_score.as_mut() {
            *b = *b / max * weight;
        }
    }
    results
}
