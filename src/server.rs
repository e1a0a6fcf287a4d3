//! HTTP surface for liveness and ingestion status.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Liveness; always `{"status":"ok","version":…}` while the process serves |
//! | `GET`  | `/status` | Ingestion counters and whether the listener task is still running |
//!
//! `/health` deliberately says nothing about ingestion: a stalled listener
//! shows up in `/status` instead.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::config::ServerConfig;
use crate::listener::{IngestStats, StatsSnapshot};

/// Shared application state passed to route handlers via Axum's `State` extractor.
#[derive(Clone)]
struct AppState {
    stats: Arc<IngestStats>,
}

/// Build the router without binding, so it can be served or tested in-process.
pub fn router(stats: Arc<IngestStats>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/status", get(handle_status))
        .layer(cors)
        .with_state(AppState { stats })
}

/// Bind to `[server].bind` and serve until the process is terminated.
pub async fn run_server(config: &ServerConfig, stats: Arc<IngestStats>) -> anyhow::Result<()> {
    let app = router(stats);
    let listener = tokio::net::TcpListener::bind(&config.bind).await?;
    info!(bind = %config.bind, "HTTP server listening");
    axum::serve(listener, app).await?;
    Ok(())
}

// ============ GET /health ============

/// JSON response body for `GET /health`.
#[derive(Serialize)]
struct HealthResponse {
    /// Always `"ok"` when the server is running.
    status: String,
    /// The crate version from `Cargo.toml`.
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET /status ============

async fn handle_status(State(state): State<AppState>) -> Json<StatsSnapshot> {
    Json(state.stats.snapshot())
}
