use std::time::Duration;
use thiserror::Error;

/// Failure talking to one of the HTTP collaborators.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{0}")]
    Rejected(String),

    #[error("unexpected response: {0}")]
    Decode(String),
}

/// Failure on the recognition channel.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("could not connect to recognizer at {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("timed out connecting to recognizer at {addr} after {after:?}")]
    Timeout { addr: String, after: Duration },

    #[error("recognition channel is backed up")]
    Full,

    #[error("recognition channel closed")]
    Closed,
}

#[derive(Debug, Error)]
pub enum CameraError {
    #[error("camera access denied: {0}")]
    AccessDenied(String),

    #[error("camera read failed: {0}")]
    Read(#[from] std::io::Error),

    #[error("camera released")]
    Released,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}
