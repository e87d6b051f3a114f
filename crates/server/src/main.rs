// crates/server/src/main.rs
//! toolhost server binary.
//!
//! Builds one runner (registry + admission gate) at startup, serves the
//! HTTP API, and on ctrl-c cancels any still-running jobs before exiting.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use toolhost_core::{JobRunner, RunnerConfig};
use toolhost_server::{create_app, AppState};
use tracing_subscriber::EnvFilter;

/// Default port for the server.
const DEFAULT_PORT: u16 = 47811;

fn get_port() -> u16 {
    std::env::var("TOOLHOST_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_PORT)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("toolhost=info,tower_http=warn")),
        )
        .init();

    let config = RunnerConfig::from_env();
    tracing::info!(
        max_concurrent = config.max_concurrent,
        default_timeout_secs = config.default_timeout.as_secs(),
        max_text_output = config.max_text_output,
        output_dir = ?config.output_dir,
        "starting toolhost"
    );
    if let Some(dir) = &config.output_dir {
        tokio::fs::create_dir_all(dir).await?;
    }

    let runner = Arc::new(JobRunner::new(config));
    let state = Arc::new(AppState::new(Arc::clone(&runner)));
    let app = create_app(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], get_port()));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(runner))
        .await?;

    Ok(())
}

/// Wait for ctrl-c, then cancel all running jobs (terminating their
/// processes) before letting the server stop.
async fn shutdown_signal(runner: Arc<JobRunner>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        return;
    }
    tracing::info!("shutdown requested, cancelling running jobs");
    runner.shutdown().await;
}
