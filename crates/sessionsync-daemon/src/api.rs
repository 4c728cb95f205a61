//! REST API handlers

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use sessionsync_core::Family;
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

/// List all discovered consoles
pub async fn list_devices(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.session.snapshot().await)
}

#[derive(Serialize)]
pub struct Status {
    pub active: bool,
    pub passive_available: bool,
    pub device_count: usize,
}

/// Session status
pub async fn get_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(Status {
        active: state.session.is_active(),
        passive_available: state.session.passive_available(),
        device_count: state.session.snapshot().await.len(),
    })
}

pub async fn start_discovery(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.session.start().await;
    Json(serde_json::json!({ "status": "started" }))
}

pub async fn stop_discovery(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.session.stop().await;
    Json(serde_json::json!({ "status": "stopped" }))
}

/// Manual probe request body
#[derive(Debug, Deserialize)]
pub struct ProbeRequest {
    pub ip: String,
    /// Defaults to the family's configured port
    pub port: Option<u16>,
    pub family: Family,
}

/// Probe one address in the background; results arrive as events
pub async fn probe_device(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ProbeRequest>,
) -> impl IntoResponse {
    let ip: Ipv4Addr = match req.ip.parse() {
        Ok(ip) => ip,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ApiError::new("Invalid IPv4 address")),
            )
                .into_response();
        }
    };
    let port = req.port.unwrap_or_else(|| probe_port(&state, req.family));

    info!(ip = %ip, port, family = %req.family, "Manual probe requested");

    let session = state.session.clone();
    tokio::spawn(async move {
        session.probe_one(ip, port, req.family).await;
    });

    (
        StatusCode::ACCEPTED,
        Json(serde_json::json!({
            "status": "probing",
            "ip": ip.to_string(),
            "port": port,
        })),
    )
        .into_response()
}

fn probe_port(state: &AppState, family: Family) -> u16 {
    state
        .config
        .discovery
        .probe_ports()
        .iter()
        .find(|(f, _)| *f == family)
        .map(|(_, port)| *port)
        .unwrap_or_else(|| family.default_port())
}

/// List local interfaces eligible for scanning
pub async fn list_interfaces() -> impl IntoResponse {
    match sessionsync_discovery::list_interfaces() {
        Ok(interfaces) => Json(interfaces).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiError::new(e.to_string())),
        )
            .into_response(),
    }
}
