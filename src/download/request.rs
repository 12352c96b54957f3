//! Download request file parsing

use serde::{Deserialize, Serialize};

/// Contents of the request file dropped by the host
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DownloadRequest {
    pub repo_id: String,
    pub filename: String,
    pub cancel: bool,
}

/// What a request asks the watcher to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestKind {
    Cancel,
    Start { repo_id: String, filename: String },
    /// Neither a cancel nor a complete start request
    Incomplete,
}

impl DownloadRequest {
    pub fn parse(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    /// Cancel takes precedence over a start request in the same file
    pub fn kind(&self) -> RequestKind {
        if self.cancel {
            return RequestKind::Cancel;
        }

        let repo_id = self.repo_id.trim();
        let filename = self.filename.trim();
        if repo_id.is_empty() || filename.is_empty() {
            return RequestKind::Incomplete;
        }

        RequestKind::Start {
            repo_id: repo_id.to_string(),
            filename: filename.to_string(),
        }
    }
}
