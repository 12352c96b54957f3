//! Model Sidecar - utilities supporting a local model-serving host
//!
//! - a download watcher that fetches model files from the HuggingFace Hub on
//!   request and reports progress through a status file
//! - a status publisher serving cached host telemetry (GPU, memory, disk,
//!   installed models) over HTTP
//! - a GGUF metadata reader extracting a model's context length

pub mod api;
pub mod command;
pub mod config;
pub mod download;
pub mod error;
pub mod gpu;
pub mod host;
pub mod logging;
pub mod models;
pub mod status;

pub use config::SidecarConfig;
pub use download::{DownloadOutcome, DownloadStatus, DownloadWatcher, WatcherState};
pub use error::{DownloadError, GgufError};
pub use models::{HfHub, ModelHub};
pub use status::{HostSnapshot, SnapshotCache, SnapshotRefresher};
