use serde::{Deserialize, Serialize};
use thiserror::Error;

/// All errors generated by the history and live-stream collaborators.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Deserialize, Serialize, Error)]
pub enum FeedError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("HTTP error status: {0}")]
    Status(u16),

    #[error("failed to decode payload: {0}")]
    Decode(String),

    #[error("malformed payload: {0}")]
    Payload(String),

    #[error("failed to connect to {url}: {reason}")]
    Connect { url: String, reason: String },

    #[error("SocketError: {0}")]
    Socket(String),

    #[error("stream idle for {0} seconds")]
    Timeout(u64),

    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

impl FeedError {
    /// Determine if an error means the underlying connection is gone.
    ///
    /// Non-terminal errors are logged and the connection is kept; terminal ones are
    /// followed by the stream ending, which schedules a reconnect.
    #[allow(clippy::match_like_matches_macro)]
    pub fn is_terminal(&self) -> bool {
        match self {
            FeedError::Connect { .. } | FeedError::Timeout(_) => true,
            FeedError::Socket(error_msg) => {
                let error_lower = error_msg.to_lowercase();
                error_lower.contains("connectionclosed")
                    || error_lower.contains("alreadyclosed")
                    || error_lower.contains("io(")
                    || error_lower.contains("reset")
            }
            _ => false,
        }
    }
}

impl From<reqwest::Error> for FeedError {
    fn from(error: reqwest::Error) -> Self {
        match error.status() {
            Some(status) => Self::Status(status.as_u16()),
            None if error.is_decode() => Self::Decode(error.to_string()),
            None => Self::Http(error.to_string()),
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for FeedError {
    fn from(error: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Socket(error.to_string())
    }
}

impl From<url::ParseError> for FeedError {
    fn from(error: url::ParseError) -> Self {
        Self::InvalidUrl(error.to_string())
    }
}

/// Errors raised while building an [`EngineConfig`](crate::config::EngineConfig).
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value}")]
    Invalid { key: String, value: String },

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Errors returned by a [`ManagerHandle`](crate::manager::ManagerHandle).
#[derive(Debug, Clone, Copy, Eq, PartialEq, Error)]
pub enum ManagerError {
    #[error("market manager has terminated")]
    Terminated,
}
