//! Error types for the worker, the probe and thumbnail fetching.
//!
//! None of these are fatal: each one ends up as a single error or warning
//! line in the log panel.

use std::path::PathBuf;

use thiserror::Error;

/// Failures while running a download.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// The yt-dlp process could not be started.
    #[error("failed to start {}: {source}", binary.display())]
    Spawn {
        binary: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Reading the process output or waiting for it failed.
    #[error("I/O error while downloading: {0}")]
    Io(#[from] std::io::Error),

    /// The child was spawned without a piped stream.
    #[error("yt-dlp {0} was not captured")]
    MissingPipe(&'static str),

    /// yt-dlp exited unsuccessfully; `message` is its last reported error.
    #[error("{message}")]
    Exited { code: Option<i32>, message: String },
}

impl WorkerError {
    pub fn exited(code: Option<i32>, last_error: Option<String>) -> Self {
        let message = last_error.unwrap_or_else(|| match code {
            Some(code) => format!("yt-dlp exited with status {code}"),
            None => "yt-dlp was terminated by a signal".to_string(),
        });
        Self::Exited { code, message }
    }

    /// Process exit status, when yt-dlp ran and exited on its own
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::Exited { code, .. } => *code,
            _ => None,
        }
    }
}

/// Failures while probing a URL for its title and streams.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("failed to start {}: {source}", binary.display())]
    Spawn {
        binary: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not read media info: {0}")]
    Failed(String),

    #[error("malformed media info: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures while fetching a preview image.
#[derive(Debug, Error)]
pub enum ThumbnailError {
    #[error("thumbnail request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("thumbnail could not be decoded: {0}")]
    Decode(#[from] image::ImageError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_error_prefers_reported_message() {
        let err = WorkerError::exited(Some(1), Some("Video unavailable".into()));
        assert_eq!(err.to_string(), "Video unavailable");

        let err = WorkerError::exited(Some(2), None);
        assert_eq!(err.to_string(), "yt-dlp exited with status 2");
        assert_eq!(err.exit_code(), Some(2));

        let err = WorkerError::MissingPipe("stdout");
        assert_eq!(err.exit_code(), None);
    }
}
