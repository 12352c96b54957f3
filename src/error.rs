//! Error types for hub transfers and model header parsing

use thiserror::Error;

/// Longest diagnostic carried into the status file
pub const MAX_DIAGNOSTIC_LEN: usize = 100;

/// Failures of a single download attempt
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("Repository not found: {repo_id}")]
    RepositoryNotFound { repo_id: String },

    #[error("File not found: {filename}")]
    EntryNotFound { filename: String },

    #[error("Invalid filename: {filename}")]
    InvalidFilename { filename: String },

    #[error("Transport error: {message}")]
    Transport { message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Hub error: {message}")]
    Hub { message: String },
}

impl DownloadError {
    /// Human-readable message written to the status file
    ///
    /// Not-found cases keep their distinguished wording, everything else is
    /// reported as a truncated diagnostic.
    pub fn status_message(&self) -> String {
        match self {
            DownloadError::RepositoryNotFound { .. }
            | DownloadError::EntryNotFound { .. }
            | DownloadError::InvalidFilename { .. } => self.to_string(),
            other => format!(
                "Download failed: {}",
                truncate(&other.to_string(), MAX_DIAGNOSTIC_LEN)
            ),
        }
    }
}

impl From<reqwest::Error> for DownloadError {
    fn from(err: reqwest::Error) -> Self {
        DownloadError::Transport {
            message: err.to_string(),
        }
    }
}

/// Failures while reading a GGUF header
#[derive(Debug, Error)]
pub enum GgufError {
    #[error("Failed to read model file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not a GGUF file (magic {0:?})")]
    BadMagic([u8; 4]),

    #[error("Unsupported GGUF version {0}")]
    UnsupportedVersion(u32),

    #[error("Unknown metadata value type {0}")]
    UnknownValueType(u32),

    #[error("Metadata string is not valid UTF-8")]
    InvalidString,

    #[error("Metadata entry too large ({0} bytes)")]
    TooLarge(u64),

    #[error("Metadata arrays nested deeper than {0} levels")]
    TooDeep(usize),
}

/// Truncate to at most `max` characters on a char boundary
pub fn truncate(message: &str, max: usize) -> String {
    match message.char_indices().nth(max) {
        Some((idx, _)) => message[..idx].to_string(),
        None => message.to_string(),
    }
}
