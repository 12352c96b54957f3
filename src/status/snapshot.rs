//! Host telemetry snapshot and its single-slot cache

use crate::config::SidecarConfig;
use crate::gpu::{GpuStats, query_gpu};
use crate::host::{DiskStats, MemoryStats, query_disk, read_memory};
use crate::models::{InstalledModel, list_installed_models, resolve_active_model};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Latest fully computed host telemetry
///
/// Absent sub-queries serialize as `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostSnapshot {
    /// Epoch seconds when the snapshot was taken
    pub timestamp: f64,
    pub gpu: Option<GpuStats>,
    pub memory: Option<MemoryStats>,
    pub disk: Option<DiskStats>,
    pub models: Vec<InstalledModel>,
    pub active_model: Option<String>,
}

/// Sources queried for each snapshot
#[derive(Debug, Clone)]
pub struct HostSampler {
    pub gpu_command: String,
    pub disk_command: String,
    pub meminfo_path: PathBuf,
    pub models_dir: PathBuf,
    pub model_path: Option<PathBuf>,
    pub server_process_name: String,
    /// Per external call
    pub timeout: Duration,
}

impl HostSampler {
    pub fn from_config(config: &SidecarConfig) -> Self {
        Self {
            gpu_command: config.gpu_query_command.clone(),
            disk_command: config.disk_query_command.clone(),
            meminfo_path: config.meminfo_path.clone(),
            models_dir: config.models_dir.clone(),
            model_path: config.model_path.clone(),
            server_process_name: config.server_process_name.clone(),
            timeout: config.query_timeout(),
        }
    }

    /// Gather every field independently; failed queries yield `None`
    pub async fn collect(&self) -> HostSnapshot {
        let (gpu, memory, disk, models, active_model) = tokio::join!(
            query_gpu(&self.gpu_command, self.timeout),
            read_memory(&self.meminfo_path),
            query_disk(&self.disk_command, &self.models_dir, self.timeout),
            list_installed_models(&self.models_dir),
            resolve_active_model(
                self.model_path.as_deref(),
                &self.server_process_name,
                self.timeout
            ),
        );

        HostSnapshot {
            timestamp: chrono::Utc::now().timestamp_micros() as f64 / 1e6,
            gpu,
            memory,
            disk,
            models,
            active_model,
        }
    }
}

/// Single-slot cache shared by the refresher and the HTTP handlers
#[derive(Debug, Default)]
pub struct SnapshotCache {
    slot: Mutex<Arc<HostSnapshot>>,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recently stored snapshot
    pub async fn get(&self) -> Arc<HostSnapshot> {
        self.slot.lock().await.clone()
    }

    /// Replace the stored snapshot
    pub async fn replace(&self, snapshot: HostSnapshot) {
        let snapshot = Arc::new(snapshot);
        *self.slot.lock().await = snapshot;
    }
}
