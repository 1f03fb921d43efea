//! HTTP server bootstrap.
//!
//! Builds the shared [`AppState`] (filesystem store, optional upstream
//! client), installs the catch-all router and request tracing, binds the
//! listener and serves until shutdown.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::Config;
use crate::proxy::{HttpOrigin, ProxyCache};
use crate::routes;
use crate::state::AppState;
use crate::storage::FsStorage;

/// Build the application router over the given state.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .fallback(routes::dispatch)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Build state from configuration and serve until the process is stopped.
pub async fn run_server(config: Config) -> Result<()> {
    info!("Starting pypi-depot");

    let data_dir = config.storage.data_dir.clone();
    std::fs::create_dir_all(&data_dir)?;
    let abs_data_dir = std::fs::canonicalize(&data_dir)?;
    info!(data_dir = %abs_data_dir.display(), "Using data directory");
    println!("📂 Using data directory: {}", abs_data_dir.display());

    let proxy = if config.upstream.enabled {
        info!(upstream = %config.upstream.url, stale_read_through = config.upstream.stale_read_through, "Pull-through mode enabled");
        println!("🔁 Mirroring upstream index: {}", config.upstream.url);
        let origin = Arc::new(HttpOrigin::new(&config.upstream)?);
        Some(ProxyCache::new(origin, config.upstream.stale_read_through))
    } else {
        None
    };

    let host = config.server.host.clone();
    let port = config.server.port;
    let state = Arc::new(AppState {
        store: Arc::new(FsStorage::new(abs_data_dir)),
        config: Arc::new(config),
        proxy,
    });

    let addr: SocketAddr = format!("{}:{}", host, port).parse().map_err(|e| {
        error!(host = %host, port = %port, error = %e, "Invalid socket address");
        anyhow::anyhow!("Invalid socket address {}:{}: {}", host, port, e)
    })?;

    let listener = TcpListener::bind(&addr).await.map_err(|e| {
        error!(addr = %addr, error = %e, "Failed to bind to address");
        anyhow::anyhow!("Failed to bind to {}:{}: {}", host, port, e)
    })?;

    println!("✅ Server is running on http://{}:{}", host, port);
    info!("Server listening on {}", addr);

    axum::serve(listener, app(state)).await.map_err(|e| {
        error!(error = %e, "Server error");
        anyhow::anyhow!("Server error: {}", e)
    })?;

    Ok(())
}
