//! API request handlers

use super::models::HealthResponse;
use super::routes::AppState;
use crate::download::{DownloadStatus, WatcherState};
use crate::status::HostSnapshot;
use axum::{Json, extract::State};
use std::sync::Arc;

/// GET /health - Liveness, independent of snapshot freshness
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// GET / and GET /status - Latest host snapshot
pub async fn host_status(State(state): State<AppState>) -> Json<HostSnapshot> {
    let snapshot = state.snapshots.get().await;
    Json(HostSnapshot::clone(&snapshot))
}

/// GET / and GET /status - Latest download status
pub async fn download_status(State(state): State<Arc<WatcherState>>) -> Json<DownloadStatus> {
    Json(state.current().await)
}
