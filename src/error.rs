use thiserror::Error;

/// Message fragments the AWS CLI prints for failures worth retrying.
const TRANSIENT_MARKERS: [&str; 8] = [
    "Throttling",
    "ThrottlingException",
    "RequestLimitExceeded",
    "TooManyRequests",
    "ServiceUnavailable",
    "InternalError",
    "Could not connect to the endpoint URL",
    "Connection was closed",
];

#[derive(Error, Debug)]
pub enum LensError {
    #[error("`aws {command}` failed: {message}")]
    AwsCli { command: String, message: String },

    #[error("`aws {command}` was throttled: {message}")]
    Throttled { command: String, message: String },

    #[error("`aws {command}` timed out after {seconds}s")]
    Timeout { command: String, seconds: u64 },

    #[error("No executions found for pipeline {0}")]
    NoExecutions(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LensError {
    /// Builds the error for a failed CLI invocation, promoting throttling
    /// responses to their own variant.
    pub fn from_cli_failure(command: &str, stderr: &str) -> Self {
        let message = stderr.trim().to_string();
        if message.contains("Throttling") || message.contains("Rate exceeded") {
            Self::Throttled {
                command: command.to_string(),
                message,
            }
        } else {
            Self::AwsCli {
                command: command.to_string(),
                message,
            }
        }
    }

    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Throttled { .. } | Self::Timeout { .. } => true,
            Self::AwsCli { message, .. } => {
                TRANSIENT_MARKERS.iter().any(|marker| message.contains(marker))
            }
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, LensError>;
