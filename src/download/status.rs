//! Download status record and its publication

use super::progress::ProgressSnapshot;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

/// Phase of the watcher as reported to consumers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadState {
    Idle,
    Downloading,
    Completed,
    Error,
}

/// Status record written to the status file
///
/// Every update replaces the whole record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadStatus {
    pub status: DownloadState,
    pub repo_id: String,
    pub filename: String,
    /// Percentage in `0..=100`
    pub progress: f64,
    pub speed: String,
    pub eta: String,
    pub message: String,
    /// Epoch seconds of this update
    pub timestamp: i64,
}

impl DownloadStatus {
    fn new(status: DownloadState, repo_id: &str, filename: &str, message: String) -> Self {
        Self {
            status,
            repo_id: repo_id.to_string(),
            filename: filename.to_string(),
            progress: 0.0,
            speed: String::new(),
            eta: String::new(),
            message,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }

    pub fn idle() -> Self {
        Self::new(DownloadState::Idle, "", "", "Ready".to_string())
    }

    pub fn starting(repo_id: &str, filename: &str) -> Self {
        Self::new(
            DownloadState::Downloading,
            repo_id,
            filename,
            "Starting download...".to_string(),
        )
    }

    pub fn downloading(repo_id: &str, filename: &str, snapshot: &ProgressSnapshot) -> Self {
        Self {
            progress: snapshot.percent,
            speed: snapshot.speed.clone(),
            eta: snapshot.eta.clone(),
            ..Self::new(
                DownloadState::Downloading,
                repo_id,
                filename,
                snapshot.message.clone(),
            )
        }
    }

    pub fn completed(repo_id: &str, filename: &str, message: String) -> Self {
        Self {
            progress: 100.0,
            ..Self::new(DownloadState::Completed, repo_id, filename, message)
        }
    }

    pub fn failed(repo_id: &str, filename: &str, message: String) -> Self {
        Self::new(DownloadState::Error, repo_id, filename, message)
    }
}

impl Default for DownloadStatus {
    fn default() -> Self {
        Self::idle()
    }
}

/// Receiver of status updates
#[async_trait]
pub trait StatusSink: Send + Sync {
    async fn publish(&self, status: DownloadStatus);
}

/// State owned by one watcher process
///
/// Holds the latest status (mirrored to the status file when one is
/// configured) and the cancellation flag of the in-flight download.
pub struct WatcherState {
    status_file: Option<PathBuf>,
    current: RwLock<DownloadStatus>,
    cancel_requested: AtomicBool,
}

impl WatcherState {
    pub fn new(status_file: Option<PathBuf>) -> Self {
        Self {
            status_file,
            current: RwLock::new(DownloadStatus::idle()),
            cancel_requested: AtomicBool::new(false),
        }
    }

    /// Latest published status
    pub async fn current(&self) -> DownloadStatus {
        self.current.read().await.clone()
    }

    pub fn request_cancel(&self) {
        self.cancel_requested.store(true, Ordering::SeqCst);
    }

    pub fn reset_cancel(&self) {
        self.cancel_requested.store(false, Ordering::SeqCst);
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.cancel_requested.load(Ordering::SeqCst)
    }

    pub fn cancel_flag(&self) -> &AtomicBool {
        &self.cancel_requested
    }

    async fn write_file(&self, status: &DownloadStatus) -> std::io::Result<()> {
        let Some(path) = &self.status_file else {
            return Ok(());
        };

        // Atomic write: write to temp file, then rename
        let temp_file = path.with_extension("tmp");
        let content = serde_json::to_vec(status).map_err(std::io::Error::other)?;
        tokio::fs::write(&temp_file, content).await?;
        tokio::fs::rename(&temp_file, path).await
    }
}

#[async_trait]
impl StatusSink for WatcherState {
    async fn publish(&self, status: DownloadStatus) {
        if let Err(e) = self.write_file(&status).await {
            tracing::error!(
                status_file = ?self.status_file,
                error = %e,
                "Failed to write download status"
            );
        }
        *self.current.write().await = status;
    }
}
