//! Error types for the session controller and its remote collaborator.

use crate::models::SessionStatus;

/// Failure talking to the remote session service.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("request to {path} failed: {source}")]
    Transport {
        path: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request to {path} timed out")]
    Timeout { path: String },

    #[error("{path} returned {status}: {body}")]
    Status {
        path: String,
        status: u16,
        body: String,
    },
}

/// All errors the session controller reports to its caller.
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    /// Required draft fields are blank. No remote call was made.
    #[error("missing required draft fields: {}", .missing.join(", "))]
    Validation { missing: Vec<&'static str> },

    /// Operation attempted from a state that forbids it.
    #[error("cannot {operation} while {status}")]
    InvalidState {
        operation: &'static str,
        status: SessionStatus,
    },

    #[error("failed to start session: {0}")]
    StartFailed(#[source] RemoteError),

    #[error("failed to stop session: {0}")]
    StopFailed(#[source] RemoteError),
}

/// Configuration loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {message}")]
    Parse {
        path: std::path::PathBuf,
        message: String,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
