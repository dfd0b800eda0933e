//! Error types for the edit-history engine and its collaborators.

use crate::buffer::Generation;
use crate::transform::RequestId;
use std::path::PathBuf;
use thiserror::Error;

/// Image decoder failures. Import is aborted and history is not touched.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Failed to read image {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported image: {0}")]
    Unsupported(String),

    #[error("Invalid image buffer: {0}")]
    InvalidBuffer(String),
}

/// Transform provider failures
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Provider request failed: {0}")]
    RequestFailed(String),

    #[error("Provider authentication failed: {0}")]
    AuthFailed(String),

    #[error("Provider rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Provider timed out: {0}")]
    Timeout(String),

    #[error("Provider returned an invalid response: {0}")]
    InvalidResponse(String),

    #[error("{0}")]
    Failed(String),
}

/// Errors surfaced at the session boundary
#[derive(Debug, Error)]
pub enum EditError {
    #[error("No image selected")]
    NoImageSelected,

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("A transform is already in progress (request {request_id})")]
    TransformBusy { request_id: RequestId },

    #[error("Transform failed: {0}")]
    TransformFailed(String),

    #[error("Stale image state: generation {actual} does not match current generation {expected}")]
    StaleState {
        expected: Generation,
        actual: Generation,
    },

    #[error("Async runtime unavailable: {0}")]
    Runtime(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ProviderError> for EditError {
    fn from(err: ProviderError) -> Self {
        EditError::TransformFailed(err.to_string())
    }
}

impl From<config::ConfigError> for EditError {
    fn from(err: config::ConfigError) -> Self {
        EditError::ConfigError(err.to_string())
    }
}
