//! Error types for the analysis client
//!
//! Every failure surfaces as a single user-visible message. None of them end
//! the session; only receiving analysis results or an explicit reset do that.

use thiserror::Error;

/// Errors produced by the transport, normalizer and session controller
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
    /// Input rejected before any network call (empty text, no video, session complete)
    #[error("{0}")]
    Validation(String),
    /// Network or connectivity failure
    #[error("Connection failed: {0}")]
    Transport(String),
    /// The request did not finish within the configured timeout
    #[error("Request timed out: {0}")]
    Timeout(String),
    /// Non-success status with a service-provided (or generic) message
    #[error("{message}")]
    Service { status: u16, message: String },
    /// A reply body could not be understood
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
    /// A video artifact failed to load or download
    #[error("{0}")]
    Playback(String),
}

pub type ClientResult<T> = Result<T, ClientError>;

impl ClientError {
    pub fn validation(message: impl Into<String>) -> Self {
        ClientError::Validation(message.into())
    }

    pub fn playback(message: impl Into<String>) -> Self {
        ClientError::Playback(message.into())
    }

    /// Short machine-readable tag for logs
    pub fn kind(&self) -> &'static str {
        match self {
            ClientError::Validation(_) => "validation",
            ClientError::Transport(_) => "transport",
            ClientError::Timeout(_) => "timeout",
            ClientError::Service { .. } => "service",
            ClientError::MalformedResponse(_) => "malformed_response",
            ClientError::Playback(_) => "playback",
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClientError::Timeout(err.to_string())
        } else if err.is_decode() {
            ClientError::MalformedResponse(err.to_string())
        } else {
            ClientError::Transport(err.to_string())
        }
    }
}
