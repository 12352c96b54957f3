//! Streaming a single file from the hub into the models directory

use super::progress::{CHUNK_SIZE, PUBLISH_INTERVAL, ProgressTracker};
use super::status::{DownloadStatus, StatusSink};
use crate::error::DownloadError;
use crate::models::ModelHub;
use futures::StreamExt;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;

/// Message reported when a download is cancelled
pub const CANCELLED_MESSAGE: &str = "Download cancelled";

/// How often the cancel flag is checked while waiting for payload bytes
pub const CANCEL_CHECK_INTERVAL: Duration = Duration::from_millis(200);

/// Suffix of the file a transfer writes before it is complete
pub const PARTIAL_SUFFIX: &str = ".part";

/// Tunables of a transfer
#[derive(Debug, Clone, Copy)]
pub struct TransferOptions {
    pub chunk_size: usize,
    pub publish_interval: Duration,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            chunk_size: CHUNK_SIZE,
            publish_interval: PUBLISH_INTERVAL,
        }
    }
}

/// Terminal result of one download attempt
#[derive(Debug)]
pub enum DownloadOutcome {
    Completed { path: PathBuf, bytes: u64 },
    /// `path` is the partial file, left on disk
    Cancelled { path: PathBuf, bytes: u64 },
    Failed(DownloadError),
}

impl DownloadOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, DownloadOutcome::Completed { .. })
    }
}

/// Everything a transfer needs besides the file identity
pub struct Transfer<'a> {
    pub hub: &'a dyn ModelHub,
    pub sink: &'a dyn StatusSink,
    pub cancel: &'a AtomicBool,
    pub models_dir: &'a Path,
    pub options: TransferOptions,
}

impl Transfer<'_> {
    /// Download `repo_id/filename` into the models directory
    ///
    /// Publishes a starting status, rate-limited progress, and exactly one
    /// terminal status (completed or error).
    pub async fn run(&self, repo_id: &str, filename: &str) -> DownloadOutcome {
        tracing::info!(repo_id = %repo_id, filename = %filename, "Starting download");
        self.sink
            .publish(DownloadStatus::starting(repo_id, filename))
            .await;

        let outcome = match self.stream_to_file(repo_id, filename).await {
            Ok(outcome) => outcome,
            Err(e) => DownloadOutcome::Failed(e),
        };

        let status = match &outcome {
            DownloadOutcome::Completed { path, bytes } => {
                tracing::info!(path = ?path, bytes, "Download complete");
                DownloadStatus::completed(
                    repo_id,
                    filename,
                    format!("Download complete: {}", filename),
                )
            }
            DownloadOutcome::Cancelled { path, bytes } => {
                tracing::info!(path = ?path, bytes, "Download cancelled");
                DownloadStatus::failed(repo_id, filename, CANCELLED_MESSAGE.to_string())
            }
            DownloadOutcome::Failed(e) => {
                tracing::error!(repo_id = %repo_id, filename = %filename, error = %e, "Download failed");
                DownloadStatus::failed(repo_id, filename, e.status_message())
            }
        };
        self.sink.publish(status).await;

        outcome
    }

    async fn stream_to_file(
        &self,
        repo_id: &str,
        filename: &str,
    ) -> Result<DownloadOutcome, DownloadError> {
        let dest = destination_path(self.models_dir, filename)?;

        let declared = match self.hub.file_size(repo_id, filename).await {
            Ok(size) => size,
            Err(e) => {
                tracing::warn!(repo_id = %repo_id, filename = %filename, error = %e, "Failed to get file size");
                0
            }
        };
        tracing::info!(size_gb = declared as f64 / 1e9, "Declared file size");

        let download = self.hub.open(repo_id, filename).await?;
        let total = if declared > 0 {
            declared
        } else {
            download.content_length.unwrap_or(0)
        };

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let partial = partial_path(&dest);
        let mut file = tokio::fs::File::create(&partial).await?;

        let chunk_size = self.options.chunk_size.max(1);
        let mut tracker = ProgressTracker::new(total, self.options.publish_interval, Instant::now());
        let mut pending: Vec<u8> = Vec::with_capacity(chunk_size);
        let mut stream = download.stream;
        let mut finished = false;

        loop {
            // A stalled stream must not keep a cancel request waiting
            let piece = loop {
                if self.cancel.load(Ordering::SeqCst) {
                    file.flush().await?;
                    return Ok(DownloadOutcome::Cancelled {
                        path: partial,
                        bytes: tracker.downloaded(),
                    });
                }
                let next = tokio::time::timeout(CANCEL_CHECK_INTERVAL, stream.next());
                if let Ok(piece) = next.await {
                    break piece;
                }
            };
            match piece {
                Some(piece) => pending.extend_from_slice(&piece?),
                None => finished = true,
            }

            let mut offset = 0;
            while pending.len() - offset >= chunk_size || (finished && offset < pending.len()) {
                if self.cancel.load(Ordering::SeqCst) {
                    file.flush().await?;
                    return Ok(DownloadOutcome::Cancelled {
                        path: partial,
                        bytes: tracker.downloaded(),
                    });
                }

                let end = (offset + chunk_size).min(pending.len());
                file.write_all(&pending[offset..end]).await?;
                let written = (end - offset) as u64;
                offset = end;

                if let Some(snapshot) = tracker.record(written, Instant::now()) {
                    self.sink
                        .publish(DownloadStatus::downloading(repo_id, filename, &snapshot))
                        .await;
                }
            }
            pending.drain(..offset);

            if finished {
                break;
            }
        }

        file.flush().await?;
        drop(file);

        let bytes = tracker.downloaded();
        if total > 0 && bytes != total {
            return Err(DownloadError::Transport {
                message: format!("incomplete download: {} of {} bytes", bytes, total),
            });
        }

        tokio::fs::rename(&partial, &dest).await?;
        Ok(DownloadOutcome::Completed { path: dest, bytes })
    }
}

/// Path written while a transfer is in progress, renamed on completion
pub fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_owned();
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}

/// Resolve `filename` under `models_dir`, rejecting anything that escapes it
pub fn destination_path(models_dir: &Path, filename: &str) -> Result<PathBuf, DownloadError> {
    let relative = Path::new(filename);
    let escapes = filename.is_empty()
        || relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));

    if escapes {
        return Err(DownloadError::InvalidFilename {
            filename: filename.to_string(),
        });
    }
    Ok(models_dir.join(relative))
}
