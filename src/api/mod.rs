//! HTTP API module

pub mod handlers;
pub mod models;
pub mod routes;

pub use routes::{AppState, create_download_router, create_router};
