//! HTTP download bridge.
//!
//! Exposes a single GET endpoint that resolves a reference, pulls the
//! artifact through the coalescing coordinator, and streams the binary
//! payload back. The bridge itself holds no state beyond the coordinator.

use std::collections::HashMap;
use std::sync::Arc;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use uuid::Uuid;

use crate::config::GlobalSettings;
use crate::download::DownloadCoordinator;
use crate::error::Result;

/// Path where an extension binary can be downloaded.
pub const WASM_DOWNLOAD_PATH: &str = "/api/v1/wasm/download";

#[derive(Clone)]
struct AppState {
    coordinator: Arc<DownloadCoordinator>,
}

/// Build the bridge router over a download coordinator.
pub fn router(coordinator: Arc<DownloadCoordinator>) -> Router {
    Router::new()
        .route(WASM_DOWNLOAD_PATH, get(download_extension))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(AppState { coordinator })
}

async fn download_extension(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let Some(reference) = params.get("ref") else {
        error!("no 'ref' found in request");
        return StatusCode::BAD_REQUEST.into_response();
    };
    info!(reference = %reference, "received request to download extension");

    // Per-request scratch directory; coalesced requests all receive the
    // leading request's path.
    // TODO: remove per-request temp directories once the payload has been
    // read back.
    let temp_dir = std::env::temp_dir().join(format!("wod-download-{}", Uuid::new_v4()));
    if let Err(err) = tokio::fs::create_dir_all(&temp_dir).await {
        error!(%err, "could not create temporary directory");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    let path = match state.coordinator.download(reference, &temp_dir).await {
        Ok(path) => path,
        Err(err) => {
            error!(reference = %reference, %err, "error downloading extension");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    match tokio::fs::read(&path).await {
        Ok(data) => ([(header::CONTENT_TYPE, "application/wasm")], data).into_response(),
        Err(err) => {
            error!(path = %path.display(), %err, "could not read downloaded artifact");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Serve the download bridge until ctrl-c.
pub async fn serve(settings: &GlobalSettings, coordinator: Arc<DownloadCoordinator>) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", settings.listen_port)).await?;
    info!(port = settings.listen_port, "download bridge listening");
    axum::serve(listener, router(coordinator))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutting down download bridge");
}
