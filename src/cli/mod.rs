use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::SearchMode;

#[derive(Parser)]
#[command(name = "ragtim")]
#[command(author, version, about = "Hybrid knowledge-base search and RAG answer service")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file (default: ./ragtim.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load the knowledge base and start the HTTP server
    Serve {
        /// Port to listen on (overrides [server].port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Search the knowledge base once and print the ranked results
    Search {
        /// Search query
        query: String,

        /// Maximum number of results
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Ranking mode: vector, bm25 or hybrid
        #[arg(short, long)]
        mode: Option<SearchMode>,
    },

    /// Answer a question through the full RAG pipeline
    Ask {
        /// The question
        question: String,

        /// Delay between revealed words in milliseconds (0 prints at once)
        #[arg(long, default_value = "0")]
        reveal_ms: u64,
    },

    /// Show knowledge-base statistics and metrics
    Stats {
        /// Output in Prometheus format
        #[arg(long)]
        prometheus: bool,
    },
}
