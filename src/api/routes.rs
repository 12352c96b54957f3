//! API route definitions

use crate::download::WatcherState;
use crate::status::SnapshotCache;
use axum::{Router, routing::get};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::handlers;

/// Application state of the host status API
#[derive(Clone)]
pub struct AppState {
    pub snapshots: Arc<SnapshotCache>,
}

/// Create the host status router
///
/// Unknown paths fall through to axum's empty 404.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::host_status))
        .route("/status", get(handlers::host_status))
        .route("/health", get(handlers::health))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}

/// Create the download progress router served by the watcher
pub fn create_download_router(state: Arc<WatcherState>) -> Router {
    Router::new()
        .route("/", get(handlers::download_status))
        .route("/status", get(handlers::download_status))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}
