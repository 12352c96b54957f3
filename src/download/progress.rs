//! Transfer progress tracking and human-readable formatting

use std::time::{Duration, Instant};

/// Bytes written per chunk
pub const CHUNK_SIZE: usize = 1024 * 1024;

/// Minimum spacing between published progress snapshots
pub const PUBLISH_INTERVAL: Duration = Duration::from_millis(500);

/// Format a byte count with decimal GB/MB/KB units
pub fn format_size(bytes: u64) -> String {
    let b = bytes as f64;
    if b >= 1e9 {
        format!("{:.2} GB", b / 1e9)
    } else if b >= 1e6 {
        format!("{:.1} MB", b / 1e6)
    } else if b >= 1e3 {
        format!("{:.1} KB", b / 1e3)
    } else {
        format!("{} B", bytes)
    }
}

/// Format a throughput in bytes per second
pub fn format_speed(bytes_per_sec: f64) -> String {
    if bytes_per_sec >= 1e6 {
        format!("{:.1} MB/s", bytes_per_sec / 1e6)
    } else {
        format!("{:.1} KB/s", bytes_per_sec / 1e3)
    }
}

/// Format a remaining time as `Ns`, `Nm Ns` or `Nh Nm`
pub fn format_eta(seconds: f64) -> String {
    let secs = seconds.max(0.0) as u64;
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    }
}

/// Derived view of a transfer at one instant
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    pub downloaded: u64,
    pub total: u64,
    pub percent: f64,
    pub speed: String,
    pub eta: String,
    pub message: String,
}

/// Accumulates written bytes and rate-limits snapshots
#[derive(Debug)]
pub struct ProgressTracker {
    total: u64,
    downloaded: u64,
    started: Instant,
    last_publish: Option<Instant>,
    interval: Duration,
}

impl ProgressTracker {
    /// `total` of 0 means the size is unknown
    pub fn new(total: u64, interval: Duration, started: Instant) -> Self {
        Self {
            total,
            downloaded: 0,
            started,
            last_publish: None,
            interval,
        }
    }

    pub fn downloaded(&self) -> u64 {
        self.downloaded
    }

    /// Account for `bytes` written at `now`
    ///
    /// Returns a snapshot when the publish interval has elapsed since the
    /// previous one (the first call always publishes).
    pub fn record(&mut self, bytes: u64, now: Instant) -> Option<ProgressSnapshot> {
        self.downloaded += bytes;

        let due = self
            .last_publish
            .is_none_or(|last| now.saturating_duration_since(last) >= self.interval);
        if !due {
            return None;
        }

        self.last_publish = Some(now);
        Some(self.snapshot(now))
    }

    pub fn snapshot(&self, now: Instant) -> ProgressSnapshot {
        let elapsed = now.saturating_duration_since(self.started).as_secs_f64();

        let percent = if self.total > 0 {
            (self.downloaded as f64 / self.total as f64 * 100.0).min(100.0)
        } else {
            0.0
        };

        let rate = if elapsed > 0.0 {
            self.downloaded as f64 / elapsed
        } else {
            0.0
        };

        let eta = if rate > 0.0 && self.total > 0 {
            format_eta(self.total.saturating_sub(self.downloaded) as f64 / rate)
        } else {
            "calculating...".to_string()
        };

        let message = if self.total > 0 {
            format!(
                "Downloading: {} / {}",
                format_size(self.downloaded),
                format_size(self.total)
            )
        } else {
            format!("Downloading: {}", format_size(self.downloaded))
        };

        ProgressSnapshot {
            downloaded: self.downloaded,
            total: self.total,
            percent,
            speed: format_speed(rate),
            eta,
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size_thresholds() {
        assert_eq!(format_size(2_500_000_000), "2.50 GB");
        assert_eq!(format_size(5_000_000_000), "5.00 GB");
        assert_eq!(format_size(1_000_000_000), "1.00 GB");
        assert_eq!(format_size(999_999_999), "1000.0 MB");
        assert_eq!(format_size(4_200_000), "4.2 MB");
        assert_eq!(format_size(1_500), "1.5 KB");
        assert_eq!(format_size(12), "12 B");
    }

    #[test]
    fn test_format_speed() {
        assert_eq!(format_speed(68_100_000.0), "68.1 MB/s");
        assert_eq!(format_speed(512_000.0), "512.0 KB/s");
        assert_eq!(format_speed(0.0), "0.0 KB/s");
    }

    #[test]
    fn test_format_eta() {
        assert_eq!(format_eta(42.9), "42s");
        assert_eq!(format_eta(323.0), "5m 23s");
        assert_eq!(format_eta(3600.0), "1h 0m");
        assert_eq!(format_eta(7_392.0), "2h 3m");
        assert_eq!(format_eta(-3.0), "0s");
    }

    #[test]
    fn test_snapshot_halfway() {
        let start = Instant::now();
        let mut tracker = ProgressTracker::new(5_000_000_000, PUBLISH_INTERVAL, start);

        let snapshot = tracker
            .record(2_500_000_000, start + Duration::from_secs(50))
            .unwrap();

        assert_eq!(snapshot.percent, 50.0);
        assert_eq!(snapshot.speed, "50.0 MB/s");
        assert_eq!(snapshot.eta, "50s");
        assert_eq!(snapshot.message, "Downloading: 2.50 GB / 5.00 GB");
    }

    #[test]
    fn test_unknown_total() {
        let start = Instant::now();
        let mut tracker = ProgressTracker::new(0, PUBLISH_INTERVAL, start);
        let snapshot = tracker.record(3_000_000, start + Duration::from_secs(1)).unwrap();

        assert_eq!(snapshot.percent, 0.0);
        assert_eq!(snapshot.eta, "calculating...");
        assert_eq!(snapshot.message, "Downloading: 3.0 MB");
    }

    #[test]
    fn test_percent_is_capped() {
        let start = Instant::now();
        let mut tracker = ProgressTracker::new(100, Duration::ZERO, start);
        let snapshot = tracker.record(150, start + Duration::from_secs(1)).unwrap();
        assert_eq!(snapshot.percent, 100.0);
        assert_eq!(snapshot.eta, "0s");
    }

    #[test]
    fn test_publish_rate_limited() {
        let start = Instant::now();
        let mut tracker = ProgressTracker::new(10 * CHUNK_SIZE as u64, PUBLISH_INTERVAL, start);
        let chunk = CHUNK_SIZE as u64;

        assert!(tracker.record(chunk, start).is_some());
        assert!(tracker.record(chunk, start + Duration::from_millis(100)).is_none());
        assert!(tracker.record(chunk, start + Duration::from_millis(499)).is_none());
        let snapshot = tracker.record(chunk, start + Duration::from_millis(500)).unwrap();

        assert_eq!(snapshot.downloaded, 4 * chunk);
        assert_eq!(tracker.downloaded(), 4 * chunk);
    }
}
