//! # Charts MCP
//!
//! Scaffolds chart workspaces and previews them with live reload.
//!
//! ## Features
//! - MCP tools over stdio for listing libraries and creating workspaces
//! - Static serving of the active workspace on one fixed port
//! - Server-sent reload events when workspace files settle after an edit
//! - Environment-based configuration loading (`CHARTS_*`)
//!
//! ## Dependencies
//! - `tokio` for asynchronous runtime
//! - `axum` and `tower-http` for the HTTP surface
//! - `notify` for file watching
//! - `dotenv` for environment configuration
//! - `tracing` for logging (stderr; stdout carries the protocol)

use std::sync::Arc;

use charts_mcp::{
    config::ServerConfig,
    control::{CommandDispatcher, StdioTransport},
    server::PreviewServer,
    workspace::WorkspaceProvisioner,
};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Entry point for the charts MCP server.
///
/// Initializes logging, loads configuration from the environment, and serves
/// tool calls on stdio until input closes or Ctrl+C arrives.
///
/// # Errors
/// Returns an error if configuration validation fails.
#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let _ = dotenv::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let config = ServerConfig::from_env()?;
    config.validate()?;

    let url = format!("http://localhost:{}", config.port);
    let provisioner = WorkspaceProvisioner::new(config.workspaces_root.clone(), url);
    let server = Arc::new(PreviewServer::new(config)?);
    let dispatcher = CommandDispatcher::new(server.clone(), provisioner);

    info!("Charts MCP Server running on stdio");

    // Serve until stdin closes or a shutdown signal arrives
    tokio::select! {
        result = StdioTransport::run(&dispatcher) => {
            if let Err(e) = result {
                error!("Transport error: {}", e);
            }
        },
        _ = shutdown_signal() => {
            info!("Shutting down gracefully");
        }
    }

    server.stop().await;
    Ok(())
}

/// Listens for a shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
