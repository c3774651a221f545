//! Reconciliation error types.

use thiserror::Error;

use crate::blobstore::BlobStoreError;

/// Reconciliation operation errors.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Blob store failure.
    #[error("blob store error: {0}")]
    BlobStore(#[from] BlobStoreError),

    /// Repository operation failed.
    #[error("repository error: {0}")]
    Repository(String),
}

impl ReconcileError {
    /// Create a repository error.
    #[must_use]
    pub fn repository(msg: impl Into<String>) -> Self {
        Self::Repository(msg.into())
    }

    /// Whether this error is systemic and must abort the whole pass.
    ///
    /// Misconfiguration and rejected credentials affect every record alike,
    /// so converting them into per-record retries would only burn the retry
    /// budget. Everything else is isolated to the record that hit it.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::BlobStore(BlobStoreError::Configuration(_) | BlobStoreError::Unauthorized { .. })
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatality_split() {
        assert!(ReconcileError::from(BlobStoreError::configuration("no key")).is_fatal());
        assert!(ReconcileError::from(BlobStoreError::Unauthorized { status: 401 }).is_fatal());
        assert!(!ReconcileError::from(BlobStoreError::InvalidBlobId("a/b".into())).is_fatal());
        assert!(!ReconcileError::repository("connection reset").is_fatal());
    }
}
