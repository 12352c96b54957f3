//! Model download watcher
//!
//! Polls a request file, streams the requested file from the hub into the
//! models directory and reports progress through a status file.

pub mod progress;
pub mod request;
pub mod status;
pub mod transfer;
pub mod watcher;

pub use progress::{ProgressSnapshot, ProgressTracker, format_eta, format_size, format_speed};
pub use request::{DownloadRequest, RequestKind};
pub use status::{DownloadState, DownloadStatus, StatusSink, WatcherState};
pub use transfer::{
    CANCEL_CHECK_INTERVAL, CANCELLED_MESSAGE, DownloadOutcome, PARTIAL_SUFFIX, Transfer,
    TransferOptions, partial_path,
};
pub use watcher::{DownloadWatcher, PollAction};

const BYTES_PER_GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Download a file unless it is already present in the models directory
///
/// An existing file is reported as completed without contacting the hub.
pub async fn fetch_if_missing(
    transfer: &Transfer<'_>,
    repo_id: &str,
    filename: &str,
) -> DownloadOutcome {
    let existing = match transfer::destination_path(transfer.models_dir, filename) {
        Ok(path) => tokio::fs::metadata(&path)
            .await
            .ok()
            .filter(|m| m.is_file())
            .map(|m| (path, m.len())),
        Err(_) => None,
    };

    let Some((path, bytes)) = existing else {
        return transfer.run(repo_id, filename).await;
    };

    tracing::info!(path = ?path, bytes, "Model already present, skipping download");
    transfer
        .sink
        .publish(DownloadStatus::completed(
            repo_id,
            filename,
            format!("Model ready ({:.1}GB)", bytes as f64 / BYTES_PER_GIB),
        ))
        .await;

    DownloadOutcome::Completed { path, bytes }
}
