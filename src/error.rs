//! Error types for the poll loop.

use std::path::PathBuf;

/// Everything that stops the poller. None of these are retried; the
/// binary logs the error and exits non-zero.
#[derive(Debug, thiserror::Error)]
pub enum PollError {
    /// A required setting was absent or empty.
    #[error("required setting not provided: {name}")]
    ConfigMissing { name: &'static str },

    /// A setting was present but could not be used.
    #[error("invalid value {value:?} for {name}: {reason}")]
    ConfigInvalid {
        name: &'static str,
        value: String,
        reason: String,
    },

    /// The transport session could not be opened.
    #[error("failed to connect to {target}: {detail:#}")]
    ConnectFailed {
        target: String,
        detail: anyhow::Error,
    },

    /// The get-request or its size accounting failed.
    #[error("get request failed: {0:#}")]
    RequestFailed(anyhow::Error),

    /// The poll log could not be created or written.
    #[error("poll log {}: {source}", path.display())]
    FileError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Writing decoded values to the console failed.
    #[error("failed to write poll output: {0}")]
    Output(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PollError>;
