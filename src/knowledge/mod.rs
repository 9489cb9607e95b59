//! Knowledge-base documents and the corpus loader.

mod document;
pub mod loader;

pub use document::{Document, DocumentMetadata, DocumentType};
pub use loader::{split_into_sections, CorpusLoader};
