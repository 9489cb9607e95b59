use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use ragtim::cli::{Cli, Commands};
use ragtim::config::Config;
use ragtim::logging::{init_early_logging, init_logging};
use ragtim::metrics;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let root = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let config = match Config::load(&root, cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            init_early_logging();
            tracing::error!("Failed to load configuration: {:#}", e);
            return Err(e);
        }
    };

    // The guard must live until exit so buffered log lines are flushed
    let _logging_guard = init_logging(&config.logging, &root)?;

    tracing::info!("ragtim starting up");
    tracing::debug!("Working directory: {}", root.display());

    metrics::register_metrics();

    match cli.command {
        Commands::Serve { port } => {
            ragtim::commands::serve::run(config, port).await?;
        }
        Commands::Search { query, top_k, mode } => {
            ragtim::commands::search::run(config, &query, top_k, mode).await?;
        }
        Commands::Ask { question, reveal_ms } => {
            ragtim::commands::ask::run(config, &question, reveal_ms).await?;
        }
        Commands::Stats { prometheus } => {
            ragtim::commands::stats::run(config, prometheus).await?;
        }
    }

    Ok(())
}
