//! Web server setup and routing

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::api;
use crate::state::AppState;
use crate::ws;

/// Run the web server
pub async fn run(state: Arc<AppState>, bind: &str) -> Result<()> {
    let app = Router::new()
        .route("/", get(api::service_info))
        .route("/api/network", get(api::get_network))
        .route("/api/devices", get(api::list_devices))
        .route("/api/devices/{ip}", get(api::get_device))
        .route("/api/devices/{ip}/scan-ports", post(api::rescan_ports))
        .route("/api/scan", post(api::start_scan))
        .route("/api/scan/status", get(api::get_scan_status))
        // WebSocket for real-time updates
        .route("/ws", get(ws::websocket_handler))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(address = %bind, "Starting web server");
    axum::serve(listener, app).await?;

    Ok(())
}
