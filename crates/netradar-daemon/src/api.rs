//! REST API handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use netradar_discovery::ScanError;
use serde::Serialize;
use std::net::Ipv4Addr;
use std::sync::Arc;
use tracing::info;

use crate::state::AppState;

/// API error response
#[derive(Serialize)]
struct ApiError {
    error: String,
}

impl ApiError {
    fn new(msg: impl Into<String>) -> Self {
        Self { error: msg.into() }
    }
}

/// Service info for the root endpoint
pub async fn service_info() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": "netradar",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
    }))
}

/// Report the subnet and gateway a scan would run against
pub async fn get_network(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.scanner.network_info() {
        Ok((network, gateway)) => Json(serde_json::json!({
            "network_cidr": network.to_string(),
            "gateway_ip": gateway,
        }))
        .into_response(),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiError::new(format!("Network detection failed: {e}"))),
        )
            .into_response(),
    }
}

/// List all known devices, online and offline
pub async fn list_devices(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.devices().await)
}

/// Get one device by its current IP
pub async fn get_device(
    State(state): State<Arc<AppState>>,
    Path(ip): Path<Ipv4Addr>,
) -> impl IntoResponse {
    match state.get_device(ip).await {
        Some(device) => Json(device).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ApiError::new("Device not found")),
        )
            .into_response(),
    }
}

/// Deep-probe one device's ports with the full profile
pub async fn rescan_ports(
    State(state): State<Arc<AppState>>,
    Path(ip): Path<Ipv4Addr>,
) -> impl IntoResponse {
    match state.scanner.rescan_ports(ip).await {
        Ok(device) => Json(device).into_response(),
        Err(ScanError::DeviceNotFound) => (
            StatusCode::NOT_FOUND,
            Json(ApiError::new("Device not found")),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiError::new(e.to_string())),
        )
            .into_response(),
    }
}

/// Current scan progress
pub async fn get_scan_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.scanner.scan_status())
}

/// Start a discovery scan; 409 when one is already running
pub async fn start_scan(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.scanner.start_scan() {
        Ok(()) => {
            info!("Scan started via API");
            Json(serde_json::json!({ "message": "Scan started" })).into_response()
        }
        Err(ScanError::ScanInProgress) => (
            StatusCode::CONFLICT,
            Json(ApiError::new("Scan already in progress")),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiError::new(e.to_string())),
        )
            .into_response(),
    }
}
