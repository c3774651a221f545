//! Blob store error types.
//!
//! Only systemic failures are errors here. "Blob not found" and transient
//! transport trouble are expected outcomes of the contract and are carried in
//! [`super::BlobExistence`] / [`super::DeleteOutcome`] instead.

use thiserror::Error;

/// Blob store operation errors.
#[derive(Debug, Error)]
pub enum BlobStoreError {
    /// Client misconfiguration (missing credential, bad endpoint).
    #[error("blob store configuration error: {0}")]
    Configuration(String),

    /// The API rejected our credential. Systemic, not per-blob.
    #[error("blob store rejected credentials (HTTP {status})")]
    Unauthorized {
        /// Status code returned by the API (401 or 403).
        status: u16,
    },

    /// The blob id could not be encoded into a request URL.
    #[error("invalid blob id: {0}")]
    InvalidBlobId(String),
}

impl BlobStoreError {
    /// Create a configuration error.
    #[must_use]
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}
