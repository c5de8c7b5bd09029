//! Errors raised while fetching and reading responses.

use std::time::Duration;

use traversal_core::feed::FeedError;

/// Failures raised by a [`crate::transport::Transport`].
#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("Failed to read response body: {0}")]
    Body(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        TransportError::Request(err.to_string())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum TraversalError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Fetching {url} did not complete within {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    #[error("Response body was already consumed")]
    BodyAlreadyConsumed,

    #[error("Response body was cancelled")]
    BodyCancelled,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid feed: {0}")]
    Feed(#[from] FeedError),
}

pub type Result<T> = std::result::Result<T, TraversalError>;
