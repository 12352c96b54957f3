//! Property-based tests using proptest
//!
//! These tests verify invariants across randomized inputs, helping catch
//! edge cases that might be missed by example-based testing.

use model_sidecar::download::{
    DownloadRequest, ProgressTracker, RequestKind, format_eta, format_size,
};
use model_sidecar::host::{parse_df, parse_meminfo};
use model_sidecar::models::metadata::GgufReader;
use proptest::prelude::*;
use std::time::{Duration, Instant};

// =============================================================================
// Formatting Properties
// =============================================================================

proptest! {
    /// The unit follows the magnitude of the byte count
    #[test]
    fn format_size_picks_unit_by_magnitude(bytes in any::<u64>()) {
        let formatted = format_size(bytes);
        let expected_unit = match bytes {
            0..1_000 => " B",
            1_000..1_000_000 => " KB",
            1_000_000..1_000_000_000 => " MB",
            _ => " GB",
        };
        prop_assert!(formatted.ends_with(expected_unit), "{} -> {}", bytes, formatted);
    }

    /// Sub-KB sizes are printed as exact integers
    #[test]
    fn format_size_small_is_exact(bytes in 0u64..1000) {
        prop_assert_eq!(format_size(bytes), format!("{} B", bytes));
    }

    /// ETA components stay within their unit ranges
    #[test]
    fn format_eta_components_in_range(seconds in 0.0f64..1e7) {
        let formatted = format_eta(seconds);
        for part in formatted.split(' ') {
            let (value, unit) = part.split_at(part.len() - 1);
            let value: u64 = value.parse().unwrap();
            match unit {
                "s" | "m" => prop_assert!(value < 60, "{} -> {}", seconds, formatted),
                "h" => prop_assert!(seconds >= 3600.0),
                other => prop_assert!(false, "unexpected unit {}", other),
            }
        }
    }
}

// =============================================================================
// Progress Tracker Properties
// =============================================================================

/// Chunk sizes and the gaps between them in milliseconds
fn arb_transfer() -> impl Strategy<Value = (u64, Vec<(u64, u64)>)> {
    (
        0u64..10_000_000,
        prop::collection::vec((1u64..1_000_000, 0u64..1_000), 1..50),
    )
}

proptest! {
    /// Published percentages never decrease and never exceed 100
    #[test]
    fn tracker_percent_is_monotonic_and_bounded(
        (total, steps) in arb_transfer(),
        interval_ms in 0u64..600,
    ) {
        let started = Instant::now();
        let mut tracker = ProgressTracker::new(total, Duration::from_millis(interval_ms), started);
        let mut now = started;
        let mut last_percent = 0.0f64;
        let mut published = 0usize;

        for (bytes, gap_ms) in steps {
            now += Duration::from_millis(gap_ms);
            if let Some(snapshot) = tracker.record(bytes, now) {
                published += 1;
                prop_assert!(snapshot.percent >= last_percent);
                prop_assert!((0.0..=100.0).contains(&snapshot.percent));
                if total == 0 {
                    prop_assert_eq!(snapshot.percent, 0.0);
                }
                last_percent = snapshot.percent;
            }
        }

        prop_assert!(published >= 1, "the first record always publishes");
    }

    /// Consecutive snapshots are at least one interval apart
    #[test]
    fn tracker_respects_publish_interval(
        (total, steps) in arb_transfer(),
        interval_ms in 1u64..600,
    ) {
        let interval = Duration::from_millis(interval_ms);
        let started = Instant::now();
        let mut tracker = ProgressTracker::new(total, interval, started);
        let mut now = started;
        let mut last: Option<Instant> = None;

        for (bytes, gap_ms) in steps {
            now += Duration::from_millis(gap_ms);
            if tracker.record(bytes, now).is_some() {
                if let Some(previous) = last {
                    prop_assert!(now - previous >= interval);
                }
                last = Some(now);
            }
        }
    }

    /// The tracker accounts for every byte regardless of publication
    #[test]
    fn tracker_counts_all_bytes((total, steps) in arb_transfer()) {
        let started = Instant::now();
        let mut tracker = ProgressTracker::new(total, Duration::from_secs(1), started);
        let expected: u64 = steps.iter().map(|(bytes, _)| bytes).sum();

        for (bytes, _) in steps {
            tracker.record(bytes, started);
        }

        prop_assert_eq!(tracker.downloaded(), expected);
    }
}

// =============================================================================
// Parser Robustness
// =============================================================================

proptest! {
    /// A cancel flag wins over any start fields
    #[test]
    fn cancel_request_takes_precedence(
        repo_id in "[a-z]{0,10}/[a-z]{0,10}",
        filename in "[a-z0-9.]{0,20}",
    ) {
        let body = serde_json::json!({
            "repoId": repo_id,
            "filename": filename,
            "cancel": true,
        });
        let request = DownloadRequest::parse(&body.to_string()).unwrap();
        prop_assert_eq!(request.kind(), RequestKind::Cancel);
    }

    /// Arbitrary bytes never panic the GGUF reader
    #[test]
    fn gguf_reader_never_panics(
        body in prop::collection::vec(any::<u8>(), 0..512),
        version in 0u32..5,
    ) {
        let mut data = b"GGUF".to_vec();
        data.extend_from_slice(&version.to_le_bytes());
        data.extend_from_slice(&body);

        if let Ok(mut reader) = GgufReader::new(data.as_slice()) {
            while let Ok(Some(_)) = reader.next_entry() {}
        }
    }

    /// Arbitrary text never panics the host parsers
    #[test]
    fn host_parsers_never_panic(text in "(?s).{0,400}") {
        let _ = parse_meminfo(&text);
        let _ = parse_df(&text, "/models");
    }
}
