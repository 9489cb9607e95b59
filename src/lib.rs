pub mod cache;
pub mod cli;
pub mod commands;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod knowledge;
pub mod llm;
pub mod logging;
pub mod metrics;
pub mod rag;
pub mod retry;
pub mod search;
pub mod web;

pub use config::Config;
pub use error::{RagError, Result};
