//! BM25 keyword scoring over an in-memory lexical index.
//!
//! The index holds per-document term frequencies, global document
//! frequencies, per-document lengths and the corpus average length. It is
//! built once from the full document set and never mutated.

use serde::Serialize;
use std::collections::HashMap;

use super::tokenizer::tokenize;
use crate::knowledge::Document;

/// Tunable BM25 parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bm25Params {
    pub k1: f32,
    pub b: f32,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.5, b: 0.75 }
    }
}

/// Score contribution of a single term in a single document.
///
/// `df` of zero is treated as one. A term absent from the document (`tf == 0`)
/// contributes nothing.
pub fn term_score(tf: u32, df: usize, n: usize, doc_len: usize, avg_len: f32, params: Bm25Params) -> f32 {
    if tf == 0 || avg_len <= 0.0 {
        return 0.0;
    }

    let n = n as f32;
    let df = df.max(1) as f32;
    let tf = tf as f32;

    let idf = ((n - df + 0.5) / (df + 0.5)).ln();
    let numerator = tf * (params.k1 + 1.0);
    let denominator = tf + params.k1 * (1.0 - params.b + params.b * (doc_len as f32 / avg_len));

    idf * numerator / denominator
}

/// Term statistics for one indexed document.
#[derive(Debug, Clone, Default)]
struct DocTerms {
    frequencies: HashMap<String, u32>,
    length: usize,
}

/// Immutable lexical index.
#[derive(Debug, Clone, Default)]
pub struct LexicalIndex {
    /// Document id -> term statistics
    docs: HashMap<String, DocTerms>,
    /// Term -> number of documents containing it
    document_frequency: HashMap<String, usize>,
    avg_doc_length: f32,
}

impl LexicalIndex {
    pub fn build(documents: &[Document]) -> Self {
        let mut docs = HashMap::with_capacity(documents.len());
        let mut document_frequency: HashMap<String, usize> = HashMap::new();
        let mut total_length = 0usize;

        for doc in documents {
            let tokens = tokenize(&doc.content);
            let mut frequencies: HashMap<String, u32> = HashMap::new();
            for token in &tokens {
                *frequencies.entry(token.clone()).or_insert(0) += 1;
            }
            for term in frequencies.keys() {
                *document_frequency.entry(term.clone()).or_insert(0) += 1;
            }

            total_length += tokens.len();
            docs.insert(
                doc.id.clone(),
                DocTerms {
                    frequencies,
                    length: tokens.len(),
                },
            );
        }

        let avg_doc_length = if docs.is_empty() {
            0.0
        } else {
            total_length as f32 / docs.len() as f32
        };

        Self {
            docs,
            document_frequency,
            avg_doc_length,
        }
    }

    pub fn document_count(&self) -> usize {
        self.docs.len()
    }

    pub fn unique_terms(&self) -> usize {
        self.document_frequency.len()
    }

    pub fn avg_doc_length(&self) -> f32 {
        self.avg_doc_length
    }

    pub fn document_frequency(&self, term: &str) -> usize {
        self.document_frequency.get(term).copied().unwrap_or(0)
    }

    pub fn term_frequency(&self, doc_id: &str, term: &str) -> u32 {
        self.docs
            .get(doc_id)
            .and_then(|d| d.frequencies.get(term))
            .copied()
            .unwrap_or(0)
    }

    /// BM25 score of `term` for `doc_id`.
    pub fn score_term(&self, term: &str, doc_id: &str, params: Bm25Params) -> f32 {
        let Some(doc) = self.docs.get(doc_id) else {
            return 0.0;
        };
        term_score(
            doc.frequencies.get(term).copied().unwrap_or(0),
            self.document_frequency(term),
            self.docs.len(),
            doc.length,
            self.avg_doc_length,
            params,
        )
    }

    /// Sum of per-term scores for already tokenized query terms.
    pub fn score_document(&self, query_terms: &[String], doc_id: &str, params: Bm25Params) -> f32 {
        query_terms
            .iter()
            .map(|term| self.score_term(term, doc_id, params))
            .sum()
    }
}

/// Ranks documents by BM25 with a priority boost.
pub struct Bm25Scorer<'a> {
    index: &'a LexicalIndex,
    params: Bm25Params,
    boost_divisor: f32,
}

impl<'a> Bm25Scorer<'a> {
    pub fn new(index: &'a LexicalIndex, params: Bm25Params, boost_divisor: f32) -> Self {
        Self {
            index,
            params,
            boost_divisor,
        }
    }

    fn boost(&self, priority: i32) -> f32 {
        if self.boost_divisor == 0.0 {
            1.0
        } else {
            1.0 + priority as f32 / self.boost_divisor
        }
    }

    /// Top `top_k` documents with a strictly positive boosted score,
    /// best first. Ties keep corpus order.
    pub fn rank<'d>(&self, query: &str, documents: &'d [Document], top_k: usize) -> Vec<(&'d Document, f32)> {
        if self.index.document_count() == 0 || self.index.avg_doc_length() <= 0.0 {
            return Vec::new();
        }

        let terms = tokenize(query);
        if terms.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(&Document, f32)> = documents
            .iter()
            .filter_map(|doc| {
                let raw = self.index.score_document(&terms, &doc.id, self.params);
                (raw > 0.0).then(|| (doc, raw * self.boost(doc.priority())))
            })
            .filter(|(_, score)| *score > 0.0)
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(top_k);
        scored
    }
}
