//! Custom error types for rosup.

use thiserror::Error;

/// Errors that can occur while upgrading a RouterOS fleet.
#[derive(Error, Debug)]
pub enum RosupError {
    #[error("fping is required to check device connectivity after rebooting: {0}")]
    Environment(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("SSH connection to {host} failed after {attempts} attempt(s): {reason}")]
    Connection {
        host: String,
        attempts: u32,
        reason: String,
    },

    #[error("SSH error: {0}")]
    Ssh(String),

    #[error("Failed to get {0}")]
    FactsUnavailable(String),

    #[error("{0}")]
    PrecheckFailed(String),

    #[error("{0} doesn't exist or isn't a file")]
    ArtifactMissing(String),

    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    #[error("Transfer to {host} failed: {reason}")]
    Transfer { host: String, reason: String },

    #[error("{host} has NOT come back online within {seconds} seconds")]
    RebootTimeout { host: String, seconds: u64 },

    #[error("Verification of {host} failed: {reason}")]
    VerificationFailed { host: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RosupError {
    /// Create an SSH error with the failing operation as context.
    pub fn ssh<E: std::fmt::Display>(operation: &str, err: E) -> Self {
        RosupError::Ssh(format!("{}: {}", operation, err))
    }

    /// Create a download error from any error type.
    pub fn download<E: std::fmt::Display>(url: &str, err: E) -> Self {
        RosupError::DownloadFailed {
            url: url.to_string(),
            reason: err.to_string(),
        }
    }
}
