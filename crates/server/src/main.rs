// crates/server/src/main.rs
//! Bioflow server binary.
//!
//! Reads its configuration from the environment, prepares the on-disk
//! layout, and serves the analysis API until killed. Tasks submitted
//! through the API live only as long as the process.

use std::net::SocketAddr;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use bioflow_core::AppConfig;
use bioflow_server::{create_app, AppState};

/// Default port for the server.
const DEFAULT_PORT: u16 = 47710;

/// Get the server port from environment or use default.
fn get_port() -> u16 {
    std::env::var("BIOFLOW_PORT")
        .ok()
        .or_else(|| std::env::var("PORT").ok())
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_PORT)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .compact()
        .init();

    let config = AppConfig::from_env();
    config.ensure_dirs()?;
    tracing::info!(data_root = %config.data_root.display(), "Data directories ready");

    let state = AppState::new(config);
    let app = create_app(state);

    let port = get_port();
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), %addr, "bioflow server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
