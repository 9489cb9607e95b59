//! HTTP server command.

use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use super::build_engine;
use crate::config::Config;
use crate::rag::build_orchestrator;
use crate::web::{AppState, WebServer};

/// Build the engine and answer pipeline, then serve until stopped.
pub async fn run(mut config: Config, port: Option<u16>) -> Result<()> {
    if let Some(port) = port {
        config.server.port = port;
    }

    let engine = build_engine(&config).await?;
    let orchestrator = Arc::new(build_orchestrator(&config, Some(engine.clone()))?);
    info!(backends = ?orchestrator.backend_names(), "Answer pipeline ready");

    let server_config = config.server.clone();
    let state = AppState::new(engine, orchestrator, config);
    WebServer::new(state).start(&server_config).await
}
