//! Web server setup and routing

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::api;
use crate::state::AppState;
use crate::ws;

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/devices", get(api::list_devices))
        .route("/api/status", get(api::get_status))
        .route("/api/discovery/start", post(api::start_discovery))
        .route("/api/discovery/stop", post(api::stop_discovery))
        .route("/api/probe", post(api::probe_device))
        .route("/api/interfaces", get(api::list_interfaces))
        .route("/ws", get(ws::websocket_handler))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Start discovery and serve until Ctrl-C
pub async fn run(state: Arc<AppState>, bind: &str) -> Result<()> {
    let app = router(state.clone());

    let listener = tokio::net::TcpListener::bind(bind).await?;
    state.session.start().await;

    info!(address = %bind, "Starting web server");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.session.stop().await;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
