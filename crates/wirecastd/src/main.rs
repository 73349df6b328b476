//! # wirecastd
//!
//! Wirecast server binary: loads configuration, initializes logging,
//! and serves until ctrl-c.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use wirecast_codec::compress::DeflateCompressor;
use wirecast_server::config;
use wirecast_server::handshake::StaticHandshakeState;
use wirecast_server::server::WirecastServer;

/// Wirecast WebSocket server.
#[derive(Parser, Debug)]
#[command(name = "wirecastd", about = "Wirecast WebSocket server")]
struct Cli {
    /// Path to a JSON configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Host to bind (overrides config).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (overrides config; 0 for auto-assign).
    #[arg(long)]
    port: Option<u16>,

    /// Chunk size in bytes for binary transfer (overrides config).
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Inline JSON handed to new connections as handshake state.
    #[arg(long)]
    handshake_state: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut config =
        config::load_config(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(chunk_size) = args.chunk_size {
        config.chunk_size = chunk_size;
    }
    config.validate().context("Invalid configuration")?;

    let state = match args.handshake_state.as_deref() {
        Some(raw) => serde_json::from_str(raw).context("Invalid handshake state JSON")?,
        None => serde_json::Value::Null,
    };

    let server = WirecastServer::new(
        config,
        Arc::new(DeflateCompressor::new()),
        Arc::new(StaticHandshakeState::new(state)),
    );

    let (addr, handle) = server.listen().await.context("Failed to bind")?;
    tracing::info!(%addr, "wirecastd ready");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;
    tracing::info!("shutting down");
    server.shutdown().drain(server.manager()).await;
    handle.await.context("Server task panicked")?;

    Ok(())
}
