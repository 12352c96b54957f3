//! Periodic snapshot refresh

use super::snapshot::{HostSampler, SnapshotCache};
use std::sync::Arc;
use tokio::time::{Duration, Instant, MissedTickBehavior, interval_at};

/// Rebuilds the host snapshot on a fixed interval
pub struct SnapshotRefresher {
    sampler: HostSampler,
    cache: Arc<SnapshotCache>,
    refresh_interval: Duration,
}

impl SnapshotRefresher {
    pub fn new(
        sampler: HostSampler,
        cache: Arc<SnapshotCache>,
        refresh_interval: Duration,
    ) -> Self {
        Self {
            sampler,
            cache,
            refresh_interval,
        }
    }

    /// Collect a fresh snapshot and swap it into the cache
    pub async fn refresh(&self) {
        let snapshot = self.sampler.collect().await;

        tracing::debug!(
            gpu = snapshot.gpu.is_some(),
            memory = snapshot.memory.is_some(),
            disk = snapshot.disk.is_some(),
            models = snapshot.models.len(),
            active_model = ?snapshot.active_model,
            "Host snapshot refreshed"
        );

        self.cache.replace(snapshot).await;
    }

    /// Refresh forever, starting one interval from now
    pub async fn run(self: Arc<Self>) {
        let mut ticker = interval_at(
            Instant::now() + self.refresh_interval,
            self.refresh_interval,
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            interval_secs = self.refresh_interval.as_secs(),
            "Snapshot refresher started"
        );

        loop {
            ticker.tick().await;
            self.refresh().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn sampler(dir: &std::path::Path) -> HostSampler {
        HostSampler {
            gpu_command: "no-such-gpu-tool-xyz".to_string(),
            disk_command: "no-such-df-xyz".to_string(),
            meminfo_path: dir.join("meminfo"),
            models_dir: dir.to_path_buf(),
            model_path: Some(PathBuf::from("/models/active.gguf")),
            server_process_name: "no-such-process".to_string(),
            timeout: Duration::from_secs(1),
        }
    }

    #[tokio::test]
    async fn test_refresh_replaces_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("meminfo"), "MemTotal: 2048 kB\nMemAvailable: 1024 kB\n")
            .unwrap();
        std::fs::write(dir.path().join("a.gguf"), b"GGUF").unwrap();

        let cache = Arc::new(SnapshotCache::new());
        let refresher = SnapshotRefresher::new(sampler(dir.path()), cache.clone(), Duration::from_secs(5));

        refresher.refresh().await;
        let snapshot = cache.get().await;

        assert!(snapshot.timestamp > 0.0);
        assert!(snapshot.gpu.is_none());
        assert!(snapshot.disk.is_none());
        assert_eq!(snapshot.memory.as_ref().map(|m| m.total_mb), Some(2));
        assert_eq!(snapshot.models.len(), 1);
        assert_eq!(snapshot.active_model.as_deref(), Some("active.gguf"));
    }

    #[tokio::test]
    async fn test_run_refreshes_on_interval() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(SnapshotCache::new());
        let refresher = Arc::new(SnapshotRefresher::new(
            sampler(dir.path()),
            cache.clone(),
            Duration::from_millis(50),
        ));

        let handle = tokio::spawn(refresher.run());
        assert_eq!(cache.get().await.timestamp, 0.0);

        let mut refreshed = false;
        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(50)).await;
            if cache.get().await.timestamp > 0.0 {
                refreshed = true;
                break;
            }
        }
        assert!(refreshed);

        handle.abort();
    }
}
