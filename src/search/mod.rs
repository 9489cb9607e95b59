//! Hybrid retrieval over the knowledge base.
//!
//! This module contains:
//! - `tokenizer` - Text normalisation shared by indexing and queries
//! - `bm25` - Lexical index and BM25 scoring with a priority boost
//! - `vector` - Embedding index and cosine scoring with priority tie-breaks
//! - `hybrid` - Fusion of the two rankings
//! - `snapshot` - Immutable index snapshots swapped atomically on rebuild
//! - `engine` - Mode dispatch, response caching and corpus statistics

pub mod bm25;
pub mod engine;
pub mod hybrid;
pub mod snapshot;
pub mod tokenizer;
pub mod vector;

pub use bm25::{Bm25Params, LexicalIndex};
pub use engine::{KnowledgeEngine, KnowledgeStats, SearchResponse};
pub use hybrid::{fuse, FusionConfig, SearchResult};
pub use snapshot::{IndexSnapshot, SnapshotHandle};
pub use tokenizer::tokenize;
pub use vector::{cosine_similarity, VectorIndex};
