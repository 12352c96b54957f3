//! Installed model inventory and active model detection

use crate::command::query_tool;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::{Duration, UNIX_EPOCH};

const BYTES_PER_GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Extension of model artifacts served by the host
pub const MODEL_EXTENSION: &str = "gguf";

/// A model file present in the models directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstalledModel {
    pub name: String,
    pub size_gb: f64,
    /// Modification time in epoch seconds
    pub modified: f64,
}

/// List `*.gguf` files in `dir`, most recently modified first
///
/// A missing or unreadable directory yields an empty list.
pub async fn list_installed_models(dir: &Path) -> Vec<InstalledModel> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            tracing::debug!(dir = ?dir, error = %e, "Models directory not readable");
            return Vec::new();
        }
    };

    let mut models = Vec::new();
    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(dir = ?dir, error = %e, "Failed to list models directory");
                break;
            }
        };

        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(MODEL_EXTENSION) {
            continue;
        }

        let Ok(metadata) = entry.metadata().await else {
            continue;
        };
        if !metadata.is_file() {
            continue;
        }

        let modified = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);

        models.push(InstalledModel {
            name: entry.file_name().to_string_lossy().into_owned(),
            size_gb: metadata.len() as f64 / BYTES_PER_GIB,
            modified,
        });
    }

    models.sort_by(|a, b| b.modified.total_cmp(&a.modified));
    models
}

/// Resolve the name of the model the host is serving
///
/// An explicit model path wins. Otherwise the command lines of processes
/// named `process_name` are searched for a model file argument.
pub async fn resolve_active_model(
    model_path: Option<&Path>,
    process_name: &str,
    timeout: Duration,
) -> Option<String> {
    if let Some(path) = model_path {
        return path.file_name().map(|n| n.to_string_lossy().into_owned());
    }

    let stdout = query_tool("pgrep", &["-a", process_name], timeout).await?;
    find_model_argument(&stdout)
}

/// Find the first argument that names a model file and return its file name
pub fn find_model_argument(command_lines: &str) -> Option<String> {
    command_lines
        .split_whitespace()
        .find(|arg| arg.ends_with(".gguf"))
        .and_then(|arg| Path::new(arg).file_name())
        .map(|n| n.to_string_lossy().into_owned())
}
