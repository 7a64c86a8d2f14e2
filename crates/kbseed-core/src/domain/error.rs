//! Error taxonomy for kbseed.
//!
//! Per-input problems never surface as errors of the run: fetchers convert
//! [`FetchError`] into skipped/failed artifacts at their boundary. Only
//! [`KbseedError`] aborts a run.

use std::path::PathBuf;

/// Errors raised inside a fetcher. Always converted to a `failed` artifact.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("HTTP {status}")]
    Status { status: u16, url: String },

    #[error("text extraction failed: {0}")]
    Extraction(String),

    #[error("unsupported origin: {0}")]
    InvalidOrigin(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache error: {0}")]
    Cache(#[from] crate::cache::CacheError),

    #[error("unexpected response: {0}")]
    Decode(String),
}

impl FetchError {
    pub fn transport(url: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Transport {
            url: url.into(),
            message: err.to_string(),
        }
    }
}

/// Run-level fatal errors.
#[derive(Debug, thiserror::Error)]
pub enum KbseedError {
    #[error("cannot create run directory {path:?}: {source}")]
    RunDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("solidity cache unusable: {0}")]
    CacheUnwritable(#[from] crate::cache::CacheError),

    #[error("failed to persist {what}: {source}")]
    Persist {
        what: String,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for run-level operations.
pub type Result<T> = std::result::Result<T, KbseedError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_error_display_preserves_message() {
        let err = FetchError::transport("https://x.test", "connection refused");
        let msg = err.to_string();
        assert!(msg.contains("https://x.test"));
        assert!(msg.contains("connection refused"));

        let err = FetchError::Status {
            status: 503,
            url: "https://x.test".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 503");
    }

    #[test]
    fn config_error_display() {
        let err = KbseedError::Config("ingest_concurrency must be > 0".to_string());
        assert!(err.to_string().contains("invalid configuration"));
    }
}
