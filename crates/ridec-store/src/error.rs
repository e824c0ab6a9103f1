//! Persistence error types

use ridec_core::RidecError;
use thiserror::Error;

/// Persistence errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Corrupt value under key '{key}': {message}")]
    Corrupt { key: String, message: String },

    #[error("Backend not configured: {0}")]
    NotConfigured(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Broken stage chain for template {template}: {reason}")]
    BrokenChain { template: String, reason: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Domain(#[from] RidecError),
}

pub type Result<T> = std::result::Result<T, StoreError>;
