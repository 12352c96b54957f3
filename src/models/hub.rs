//! Model hub access
//!
//! The watcher talks to the hub through [`ModelHub`] so transfers can be
//! exercised without network access. [`HfHub`] is the HuggingFace
//! implementation: hf-hub resolves file URLs, reqwest streams the payload.

use crate::error::DownloadError;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt};
use hf_hub::api::tokio::{Api, ApiBuilder};
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use serde::Deserialize;
use std::time::Duration;

/// Longest wait for a connection, and for each read once connected
const NETWORK_TIMEOUT: Duration = Duration::from_secs(30);

/// Stream of payload chunks as delivered by the transport
pub type ByteStream = BoxStream<'static, Result<Bytes, DownloadError>>;

/// An opened transfer
pub struct HubDownload {
    /// Size announced by the transfer itself, if any
    pub content_length: Option<u64>,
    pub stream: ByteStream,
}

/// Remote source of model artifacts
#[async_trait]
pub trait ModelHub: Send + Sync {
    /// Declared size of a file in bytes
    async fn file_size(&self, repo_id: &str, filename: &str) -> Result<u64, DownloadError>;

    /// Start streaming a file
    async fn open(&self, repo_id: &str, filename: &str) -> Result<HubDownload, DownloadError>;
}

// ============================================================================
// HuggingFace Implementation
// ============================================================================

/// HuggingFace Hub client
pub struct HfHub {
    api: Api,
    client: reqwest::Client,
    endpoint: String,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RepoInfo {
    #[serde(default)]
    siblings: Vec<Sibling>,
}

#[derive(Debug, Deserialize)]
struct Sibling {
    rfilename: String,
    #[serde(default)]
    size: Option<u64>,
}

impl HfHub {
    pub fn new(endpoint: &str, token: Option<String>) -> Result<Self, DownloadError> {
        let endpoint = endpoint.trim_end_matches('/').to_string();

        let api = ApiBuilder::new()
            .with_endpoint(endpoint.clone())
            .with_token(token.clone())
            .with_progress(false)
            .build()
            .map_err(|e| DownloadError::Hub {
                message: format!("Failed to create HF API client: {}", e),
            })?;

        let client = reqwest::Client::builder()
            .user_agent(concat!("model-sidecar/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(NETWORK_TIMEOUT)
            .read_timeout(NETWORK_TIMEOUT)
            .build()?;

        Ok(Self {
            api,
            client,
            endpoint,
            token,
        })
    }

    /// Direct transfer URL of a file on the main revision
    pub fn file_url(&self, repo_id: &str, filename: &str) -> String {
        self.api.model(repo_id.to_string()).url(filename)
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        let request = self.client.get(url);
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl ModelHub for HfHub {
    async fn file_size(&self, repo_id: &str, filename: &str) -> Result<u64, DownloadError> {
        let url = format!("{}/api/models/{}", self.endpoint, repo_id);
        let response = self.get(&url).query(&[("blobs", "true")]).send().await?;

        if !response.status().is_success() {
            return Err(classify_failure(
                response.status(),
                response.headers(),
                repo_id,
                filename,
            ));
        }

        let info: RepoInfo = response.json().await?;
        size_from_siblings(&info, filename).ok_or_else(|| DownloadError::EntryNotFound {
            filename: filename.to_string(),
        })
    }

    async fn open(&self, repo_id: &str, filename: &str) -> Result<HubDownload, DownloadError> {
        let url = self.file_url(repo_id, filename);
        tracing::debug!(url = %url, "Resolved download URL");

        let response = self.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(classify_failure(
                response.status(),
                response.headers(),
                repo_id,
                filename,
            ));
        }

        let content_length = response.content_length();
        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(DownloadError::from))
            .boxed();

        Ok(HubDownload {
            content_length,
            stream,
        })
    }
}

fn size_from_siblings(info: &RepoInfo, filename: &str) -> Option<u64> {
    info.siblings
        .iter()
        .find(|s| s.rfilename == filename)
        .map(|s| s.size.unwrap_or(0))
}

/// Map a failed hub response onto the download error taxonomy
///
/// The hub reports missing repositories and files through `X-Error-Code`;
/// anonymous requests for missing repositories come back as 401.
fn classify_failure(
    status: StatusCode,
    headers: &HeaderMap,
    repo_id: &str,
    filename: &str,
) -> DownloadError {
    let error_code = headers
        .get("x-error-code")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    let unlabeled = error_code.is_empty();

    if error_code == "RepoNotFound" || (unlabeled && status == StatusCode::UNAUTHORIZED) {
        DownloadError::RepositoryNotFound {
            repo_id: repo_id.to_string(),
        }
    } else if error_code == "EntryNotFound" || (unlabeled && status == StatusCode::NOT_FOUND) {
        DownloadError::EntryNotFound {
            filename: filename.to_string(),
        }
    } else {
        DownloadError::Transport {
            message: format!("HTTP {} from hub", status),
        }
    }
}
