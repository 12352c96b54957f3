//! Request file polling loop

use super::request::{DownloadRequest, RequestKind};
use super::status::{DownloadStatus, StatusSink, WatcherState};
use super::transfer::{DownloadOutcome, Transfer, TransferOptions};
use crate::models::ModelHub;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior, interval};

/// Result of one poll tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollAction {
    NoRequest,
    Started { repo_id: String, filename: String },
    CancelRequested,
    /// A start request arrived while a download was in flight and was dropped
    Busy,
    /// The request file was consumed but held nothing actionable
    Ignored,
}

/// Watches the request file and runs one download at a time
pub struct DownloadWatcher {
    hub: Arc<dyn ModelHub>,
    state: Arc<WatcherState>,
    request_file: PathBuf,
    models_dir: PathBuf,
    poll_interval: Duration,
    options: TransferOptions,
    active: Mutex<Option<JoinHandle<DownloadOutcome>>>,
}

impl DownloadWatcher {
    pub fn new(
        hub: Arc<dyn ModelHub>,
        state: Arc<WatcherState>,
        request_file: PathBuf,
        models_dir: PathBuf,
        poll_interval: Duration,
    ) -> Self {
        Self {
            hub,
            state,
            request_file,
            models_dir,
            poll_interval,
            options: TransferOptions::default(),
            active: Mutex::new(None),
        }
    }

    pub fn with_options(mut self, options: TransferOptions) -> Self {
        self.options = options;
        self
    }

    pub fn state(&self) -> &Arc<WatcherState> {
        &self.state
    }

    /// Drop a stale request file and publish the idle status
    pub async fn prepare(&self) {
        match tokio::fs::remove_file(&self.request_file).await {
            Ok(()) => tracing::info!(request_file = ?self.request_file, "Removed stale request file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(error = %e, "Failed to remove stale request file"),
        }
        self.state.publish(DownloadStatus::idle()).await;
    }

    /// Poll forever
    pub async fn run(self: Arc<Self>) {
        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            request_file = ?self.request_file,
            interval_ms = self.poll_interval.as_millis() as u64,
            "Download watcher started"
        );

        loop {
            ticker.tick().await;
            self.poll_once().await;
        }
    }

    /// Check the request file once and act on it
    pub async fn poll_once(&self) -> PollAction {
        let content = match tokio::fs::read_to_string(&self.request_file).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return PollAction::NoRequest,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read request file");
                String::new()
            }
        };

        // Consume before parsing so a bad request is never seen twice
        if let Err(e) = tokio::fs::remove_file(&self.request_file).await {
            tracing::warn!(error = %e, "Failed to remove request file");
        }

        let request = match DownloadRequest::parse(&content) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(error = %e, "Invalid request file");
                return PollAction::Ignored;
            }
        };

        match request.kind() {
            RequestKind::Cancel => {
                if self.is_busy().await {
                    tracing::info!("Cancel requested");
                } else {
                    tracing::info!("Cancel requested with no download in progress");
                }
                self.state.request_cancel();
                PollAction::CancelRequested
            }
            RequestKind::Start { repo_id, filename } => {
                if self.is_busy().await {
                    tracing::warn!(
                        repo_id = %repo_id,
                        filename = %filename,
                        "Download already in progress, request rejected"
                    );
                    return PollAction::Busy;
                }
                self.start(repo_id.clone(), filename.clone()).await;
                PollAction::Started { repo_id, filename }
            }
            RequestKind::Incomplete => {
                tracing::warn!(request = ?request, "Request missing repoId or filename");
                PollAction::Ignored
            }
        }
    }

    async fn start(&self, repo_id: String, filename: String) {
        self.state.reset_cancel();

        let hub = self.hub.clone();
        let state = self.state.clone();
        let models_dir = self.models_dir.clone();
        let options = self.options;

        let handle = tokio::spawn(async move {
            let transfer = Transfer {
                hub: hub.as_ref(),
                sink: state.as_ref(),
                cancel: state.cancel_flag(),
                models_dir: &models_dir,
                options,
            };
            transfer.run(&repo_id, &filename).await
        });

        *self.active.lock().await = Some(handle);
    }

    /// Whether a download task is still running
    pub async fn is_busy(&self) -> bool {
        self.active
            .lock()
            .await
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Wait for the current download, if any, and return its outcome
    pub async fn wait_for_download(&self) -> Option<DownloadOutcome> {
        let handle = self.active.lock().await.take()?;
        match handle.await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                tracing::error!(error = %e, "Download task failed");
                None
            }
        }
    }

    /// Cancel the in-flight download and wait for it to stop
    pub async fn shutdown(&self) {
        if self.is_busy().await {
            tracing::info!("Cancelling in-flight download for shutdown");
            self.state.request_cancel();
        }
        self.wait_for_download().await;
    }
}
