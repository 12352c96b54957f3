//! Configuration structures and loading logic

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// File name of the download request dropped by the host
pub const REQUEST_FILE_NAME: &str = "download-model.request";

/// File name of the download status read by the UI
pub const STATUS_FILE_NAME: &str = "download-model.status";

/// File name of the status kept by a one-shot fetch inside the models directory
pub const FETCH_STATUS_FILE_NAME: &str = ".download-status.json";

/// Sidecar configuration shared by every subcommand
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SidecarConfig {
    /// Directory holding the request and status files
    pub config_dir: PathBuf,
    /// Directory holding downloaded model artifacts
    pub models_dir: PathBuf,

    /// Port of the host status API
    pub status_port: u16,
    /// Port of the download progress API (watcher serves it only when set)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_status_port: Option<u16>,

    pub poll_interval_ms: u64,
    pub refresh_interval_secs: u64,
    pub query_timeout_secs: u64,

    /// Explicit path of the model currently served by the host
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_path: Option<PathBuf>,
    /// Process name searched for a `.gguf` argument when `model_path` is unset
    pub server_process_name: String,

    #[serde(default = "default_gpu_query_command")]
    pub gpu_query_command: String,
    #[serde(default = "default_disk_query_command")]
    pub disk_query_command: String,
    #[serde(default = "default_meminfo_path")]
    pub meminfo_path: PathBuf,

    pub hub_endpoint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hub_token: Option<String>,
}

impl Default for SidecarConfig {
    fn default() -> Self {
        Self {
            config_dir: default_config_dir(),
            models_dir: default_models_dir(),
            status_port: default_status_port(),
            download_status_port: None,
            poll_interval_ms: default_poll_interval_ms(),
            refresh_interval_secs: default_refresh_interval(),
            query_timeout_secs: default_query_timeout(),
            model_path: None,
            server_process_name: default_server_process_name(),
            gpu_query_command: default_gpu_query_command(),
            disk_query_command: default_disk_query_command(),
            meminfo_path: default_meminfo_path(),
            hub_endpoint: default_hub_endpoint(),
            hub_token: None,
        }
    }
}

impl SidecarConfig {
    /// Load configuration from file with environment variable overrides
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let mut config = if let Some(path) = path {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content).context("Failed to parse TOML config")?
        } else {
            Self::default()
        };

        config.apply_env()?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(dir) = std::env::var("CONFIG_DIR") {
            self.config_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var("MODELS_DIR") {
            self.models_dir = PathBuf::from(dir);
        }
        if let Ok(port) = std::env::var("STATUS_PORT") {
            self.status_port = port.parse().context("Invalid STATUS_PORT value")?;
        }
        if let Ok(port) = std::env::var("DOWNLOAD_STATUS_PORT") {
            self.download_status_port =
                Some(port.parse().context("Invalid DOWNLOAD_STATUS_PORT value")?);
        }
        if let Ok(model_path) = std::env::var("MODEL_PATH")
            && !model_path.is_empty()
        {
            self.model_path = Some(PathBuf::from(model_path));
        }
        if let Ok(endpoint) = std::env::var("HF_ENDPOINT") {
            self.hub_endpoint = endpoint;
        }
        if let Ok(token) = std::env::var("HF_TOKEN")
            && !token.is_empty()
        {
            self.hub_token = Some(token);
        }
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.status_port < 1024 {
            anyhow::bail!("Status port must be >= 1024 (got {})", self.status_port);
        }
        if let Some(port) = self.download_status_port {
            if port < 1024 {
                anyhow::bail!("Download status port must be >= 1024 (got {})", port);
            }
            if port == self.status_port {
                anyhow::bail!("Download status port {} conflicts with status port", port);
            }
        }
        if self.poll_interval_ms == 0 {
            anyhow::bail!("poll_interval_ms must be greater than zero");
        }
        if self.refresh_interval_secs == 0 {
            anyhow::bail!("refresh_interval_secs must be greater than zero");
        }
        if self.query_timeout_secs == 0 {
            anyhow::bail!("query_timeout_secs must be greater than zero");
        }
        if self.hub_endpoint.is_empty() {
            anyhow::bail!("hub_endpoint cannot be empty");
        }
        Ok(())
    }

    /// Create the config and models directories if they are missing
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [&self.config_dir, &self.models_dir] {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Cannot create directory: {:?}", dir))?;
        }
        Ok(())
    }

    pub fn request_file(&self) -> PathBuf {
        self.config_dir.join(REQUEST_FILE_NAME)
    }

    pub fn status_file(&self) -> PathBuf {
        self.config_dir.join(STATUS_FILE_NAME)
    }

    pub fn fetch_status_file(&self) -> PathBuf {
        self.models_dir.join(FETCH_STATUS_FILE_NAME)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }
}

// Default functions
fn default_config_dir() -> PathBuf {
    PathBuf::from("/config")
}
fn default_models_dir() -> PathBuf {
    PathBuf::from("/models")
}
fn default_status_port() -> u16 {
    8082
}
fn default_poll_interval_ms() -> u64 {
    1000
}
fn default_refresh_interval() -> u64 {
    5
}
fn default_query_timeout() -> u64 {
    5
}
fn default_server_process_name() -> String {
    "llama-agent-server".to_string()
}
fn default_gpu_query_command() -> String {
    "nvidia-smi".to_string()
}
fn default_disk_query_command() -> String {
    "df".to_string()
}
fn default_meminfo_path() -> PathBuf {
    PathBuf::from("/proc/meminfo")
}
fn default_hub_endpoint() -> String {
    "https://huggingface.co".to_string()
}
