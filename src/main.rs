//! Media inference gateway.
//!
//! Forwards image and audio uploads to an external inference backend and
//! keeps callers responsive while that backend misbehaves.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌──────────────────────────────────────────────────────┐
//!                      │                    MEDIA GATEWAY                       │
//!                      │                                                        │
//!   multipart upload   │  ┌─────────┐    ┌─────────┐    ┌──────────────────┐   │
//!   ───────────────────┼─▶│  http   │───▶│ gateway │───▶│ circuit breaker  │   │
//!                      │  │ server  │    │         │    │  (per group)     │   │
//!                      │  └─────────┘    └────┬────┘    └────────┬─────────┘   │
//!                      │                      │                  │ admitted     │
//!                      │                      │ refused          ▼              │
//!                      │                      │         ┌──────────────────┐    │
//!                      │                      │         │   retry policy   │    │
//!                      │                      │         └────────┬─────────┘    │
//!                      │                      ▼                  ▼              │
//!   JSON response      │               ┌──────────┐     ┌──────────────────┐   │
//!   ◀──────────────────┼───────────────│ fallback │     │ upstream client  │───┼──▶ Inference
//!                      │               └──────────┘     └──────────────────┘   │    backend
//!                      │                                                        │
//!                      │  config · observability · health · lifecycle           │
//!                      └──────────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use tokio::net::TcpListener;

use media_gateway::config::loader;
use media_gateway::http::HttpServer;
use media_gateway::lifecycle::{shutdown_signal, Shutdown};
use media_gateway::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "media-gateway", version, about = "Resilient gateway for media inference")]
struct Args {
    /// Path to a TOML configuration file.
    #[arg(short, long, env = "GATEWAY_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = loader::load(args.config.as_deref())?;

    logging::init(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "media-gateway starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.base_url,
        failure_threshold = config.breaker.failure_threshold,
        cool_down_ms = config.breaker.cool_down_ms,
        retry_max_attempts = config.retries.max_attempts,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config)?;
    let server_task = tokio::spawn(server.run(listener, shutdown.clone()));

    shutdown_signal().await?;
    shutdown.trigger();
    server_task.await??;

    tracing::info!("Shutdown complete");
    Ok(())
}
