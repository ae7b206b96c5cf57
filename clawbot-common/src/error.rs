// ================================================================
// File: clawbot-common/src/error.rs
// ================================================================

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Not found error: {0}")]
    NotFound(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A webhook payload that could not be mapped onto its event type.
    /// `path` points at the offending field (e.g. `reward.cost`).
    #[error("Malformed payload at '{path}': {message}")]
    Payload { path: String, message: String },

    #[error("Signature verification failed: {0}")]
    Signature(String),

    #[error("Delivery provider error: {0}")]
    Provider(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Timeout error: {0}")]
    Timeout(#[from] tokio::time::error::Elapsed),
}
