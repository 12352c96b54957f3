//! System memory and disk telemetry

use crate::command::query_tool;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

const BYTES_PER_GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// System memory in megabytes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryStats {
    pub total_mb: u64,
    pub free_mb: u64,
    pub available_mb: u64,
    /// `total - available`
    pub used_mb: u64,
}

/// Usage of the filesystem holding the models directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiskStats {
    pub total_gb: f64,
    pub used_gb: f64,
    pub available_gb: f64,
    pub mount_point: String,
}

/// Read memory statistics from a meminfo-formatted file
pub async fn read_memory(meminfo_path: &Path) -> Option<MemoryStats> {
    match tokio::fs::read_to_string(meminfo_path).await {
        Ok(content) => parse_meminfo(&content),
        Err(e) => {
            tracing::warn!(path = ?meminfo_path, error = %e, "Failed to read memory info");
            None
        }
    }
}

/// Parse `Key:   value kB` lines, converting kB to MB
pub fn parse_meminfo(content: &str) -> Option<MemoryStats> {
    let values: HashMap<&str, u64> = content
        .lines()
        .filter_map(|line| {
            let (key, rest) = line.split_once(':')?;
            let value = rest.split_whitespace().next()?.parse::<u64>().ok()?;
            Some((key.trim(), value / 1024))
        })
        .collect();

    let total_mb = *values.get("MemTotal")?;
    let available_mb = values.get("MemAvailable").copied().unwrap_or(0);

    Some(MemoryStats {
        total_mb,
        free_mb: values.get("MemFree").copied().unwrap_or(0),
        available_mb,
        used_mb: total_mb.saturating_sub(available_mb),
    })
}

/// Query disk usage of `dir` with a df-compatible tool
pub async fn query_disk(program: &str, dir: &Path, timeout: Duration) -> Option<DiskStats> {
    let dir_arg = dir.to_string_lossy();
    let stdout = query_tool(program, &["-P", "-B1", dir_arg.as_ref()], timeout).await?;
    let stats = parse_df(&stdout, &dir_arg);
    if stats.is_none() {
        tracing::warn!(output = %stdout.trim(), "Unrecognized disk query output");
    }
    stats
}

/// Parse `df -P -B1` output (header line followed by one data line)
pub fn parse_df(output: &str, fallback_mount: &str) -> Option<DiskStats> {
    let line = output.lines().nth(1)?;
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 4 {
        return None;
    }

    let total: u64 = parts[1].parse().ok()?;
    let used: u64 = parts[2].parse().ok()?;
    let available: u64 = parts[3].parse().ok()?;

    Some(DiskStats {
        total_gb: total as f64 / BYTES_PER_GIB,
        used_gb: used as f64 / BYTES_PER_GIB,
        available_gb: available as f64 / BYTES_PER_GIB,
        mount_point: parts
            .get(5)
            .map(|s| s.to_string())
            .unwrap_or_else(|| fallback_mount.to_string()),
    })
}
