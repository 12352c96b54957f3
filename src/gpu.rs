//! GPU telemetry
//!
//! Queries the first visible GPU via nvidia-smi. Hosts without the tool (or
//! without a GPU) simply report no GPU.

use crate::command::query_tool;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const GPU_QUERY_FIELDS: &str =
    "--query-gpu=name,memory.total,memory.used,memory.free,utilization.gpu,temperature.gpu";

/// Point-in-time statistics of one GPU
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpuStats {
    pub name: String,
    pub memory_total_mb: u64,
    pub memory_used_mb: u64,
    pub memory_free_mb: u64,
    pub utilization_percent: u32,
    pub temperature_c: i32,
}

/// Query GPU statistics with the configured vendor tool
pub async fn query_gpu(program: &str, timeout: Duration) -> Option<GpuStats> {
    let stdout = query_tool(
        program,
        &[GPU_QUERY_FIELDS, "--format=csv,noheader,nounits"],
        timeout,
    )
    .await?;

    let stats = parse_gpu_csv(&stdout);
    if stats.is_none() {
        tracing::warn!(output = %stdout.trim(), "Unrecognized GPU query output");
    }
    stats
}

/// Parse the first line of `nvidia-smi --format=csv,noheader,nounits` output
pub fn parse_gpu_csv(output: &str) -> Option<GpuStats> {
    let line = output.lines().map(str::trim).find(|l| !l.is_empty())?;
    let parts: Vec<&str> = line.split(',').map(str::trim).collect();
    if parts.len() < 6 {
        return None;
    }

    Some(GpuStats {
        name: parts[0].to_string(),
        memory_total_mb: parts[1].parse().ok()?,
        memory_used_mb: parts[2].parse().ok()?,
        memory_free_mb: parts[3].parse().ok()?,
        utilization_percent: parts[4].parse().ok()?,
        temperature_c: parts[5].parse().ok()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_gpu() {
        let stats = parse_gpu_csv("NVIDIA GeForce RTX 4090, 24564, 1023, 23541, 7, 41\n").unwrap();

        assert_eq!(stats.name, "NVIDIA GeForce RTX 4090");
        assert_eq!(stats.memory_total_mb, 24564);
        assert_eq!(stats.memory_used_mb, 1023);
        assert_eq!(stats.memory_free_mb, 23541);
        assert_eq!(stats.utilization_percent, 7);
        assert_eq!(stats.temperature_c, 41);
    }

    #[test]
    fn test_parse_uses_first_gpu() {
        let output = "GPU A, 100, 10, 90, 1, 30\nGPU B, 200, 20, 180, 2, 40\n";
        let stats = parse_gpu_csv(output).unwrap();
        assert_eq!(stats.name, "GPU A");
        assert_eq!(stats.memory_total_mb, 100);
    }

    #[test]
    fn test_parse_rejects_short_or_non_numeric() {
        assert!(parse_gpu_csv("").is_none());
        assert!(parse_gpu_csv("GPU, 100, 10").is_none());
        assert!(parse_gpu_csv("GPU, 100, 10, 90, [N/A], 30").is_none());
    }

    #[tokio::test]
    async fn test_missing_tool_reports_no_gpu() {
        let stats = query_gpu("no-such-gpu-tool-xyz", Duration::from_secs(1)).await;
        assert!(stats.is_none());
    }
}
