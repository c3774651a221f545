//! Blob store client over the file-management REST API.

use std::time::Duration;

use reqwest::StatusCode;
use tracing::debug;

use super::error::BlobStoreError;
use prism_shared::config::BlobStoreConfig;

/// Typed classification of a blob store HTTP response.
///
/// Every raw status code is funneled through this enum exactly once; nothing
/// upstream of this module branches on status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteStatus {
    /// 2xx success.
    Ok,
    /// 404 - the blob is absent. Expected, never an error.
    NotFound,
    /// Retryable: 5xx, timeouts, rate limits, anything unclassified.
    Transient,
    /// Systemic: the credential was rejected (401/403).
    Fatal,
}

impl RemoteStatus {
    /// Decode an HTTP status into the typed contract.
    #[must_use]
    pub fn from_status(status: StatusCode) -> Self {
        if status.is_success() {
            Self::Ok
        } else if status == StatusCode::NOT_FOUND {
            Self::NotFound
        } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            Self::Fatal
        } else {
            // 5xx, 408, 429, and anything the API grows in the future are all
            // safe to retry because delete is idempotent.
            Self::Transient
        }
    }
}

/// Result of an existence check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobExistence {
    /// The blob is present remotely.
    Present,
    /// The blob is confirmed absent (404).
    Absent,
    /// The check could not determine either way (transport/protocol error).
    /// Callers treat this as "might still exist".
    Unknown,
}

/// Result of a delete attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The blob is gone: either deleted now or already absent (404).
    Ok,
    /// Retryable failure; the blob may still exist.
    Transient,
}

/// Client contract for the remote blob store.
///
/// Both operations are idempotent and safe to invoke arbitrarily many times.
/// "Not found" is never surfaced as an error; only systemic problems
/// (credentials, configuration) are.
pub trait BlobClient: Send + Sync {
    /// Check whether a blob exists remotely.
    fn exists(
        &self,
        blob_id: &str,
    ) -> impl std::future::Future<Output = Result<BlobExistence, BlobStoreError>> + Send;

    /// Delete a blob. Deleting an already-absent blob succeeds.
    fn delete(
        &self,
        blob_id: &str,
    ) -> impl std::future::Future<Output = Result<DeleteOutcome, BlobStoreError>> + Send;
}

/// HTTP implementation of [`BlobClient`].
///
/// Wire contract: `GET {endpoint}/{blob_id}/details` for existence,
/// `DELETE {endpoint}/{blob_id}` for removal. Authenticated with a static
/// private key sent as the basic-auth username.
#[derive(Debug)]
pub struct HttpBlobClient {
    http: reqwest::Client,
    endpoint: String,
    private_key: String,
}

impl HttpBlobClient {
    /// Create a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the credential is missing or the
    /// HTTP client cannot be built.
    pub fn from_config(config: &BlobStoreConfig) -> Result<Self, BlobStoreError> {
        if config.private_key.trim().is_empty() {
            return Err(BlobStoreError::configuration(
                "blob store private key is not set",
            ));
        }
        if config.endpoint.trim().is_empty() {
            return Err(BlobStoreError::configuration(
                "blob store endpoint is not set",
            ));
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| BlobStoreError::configuration(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            private_key: config.private_key.clone(),
        })
    }

    fn blob_url(&self, blob_id: &str) -> Result<String, BlobStoreError> {
        if blob_id.is_empty() || blob_id.contains('/') || blob_id.contains('?') {
            return Err(BlobStoreError::InvalidBlobId(blob_id.to_string()));
        }
        Ok(format!("{}/{}", self.endpoint, blob_id))
    }
}

impl BlobClient for HttpBlobClient {
    async fn exists(&self, blob_id: &str) -> Result<BlobExistence, BlobStoreError> {
        let url = format!("{}/details", self.blob_url(blob_id)?);

        let response = match self
            .http
            .get(&url)
            .basic_auth(&self.private_key, Some(""))
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                // Transport failure: we cannot tell whether the blob exists.
                debug!(blob_id, error = %e, "existence check failed in transport");
                return Ok(BlobExistence::Unknown);
            }
        };

        match RemoteStatus::from_status(response.status()) {
            RemoteStatus::Ok => Ok(BlobExistence::Present),
            RemoteStatus::NotFound => Ok(BlobExistence::Absent),
            RemoteStatus::Transient => Ok(BlobExistence::Unknown),
            RemoteStatus::Fatal => Err(BlobStoreError::Unauthorized {
                status: response.status().as_u16(),
            }),
        }
    }

    async fn delete(&self, blob_id: &str) -> Result<DeleteOutcome, BlobStoreError> {
        let url = self.blob_url(blob_id)?;

        let response = match self
            .http
            .delete(&url)
            .basic_auth(&self.private_key, Some(""))
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                debug!(blob_id, error = %e, "delete failed in transport");
                return Ok(DeleteOutcome::Transient);
            }
        };

        match RemoteStatus::from_status(response.status()) {
            // 404 means the blob is already gone, which is exactly what a
            // delete wants. Treating it as success keeps retries idempotent.
            RemoteStatus::Ok | RemoteStatus::NotFound => Ok(DeleteOutcome::Ok),
            RemoteStatus::Transient => Ok(DeleteOutcome::Transient),
            RemoteStatus::Fatal => Err(BlobStoreError::Unauthorized {
                status: response.status().as_u16(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn test_config() -> BlobStoreConfig {
        BlobStoreConfig {
            endpoint: "https://blobs.example.com/v1/files".to_string(),
            private_key: "private_test_key".to_string(),
            request_timeout_secs: 5,
        }
    }

    #[rstest]
    #[case(StatusCode::OK, RemoteStatus::Ok)]
    #[case(StatusCode::NO_CONTENT, RemoteStatus::Ok)]
    #[case(StatusCode::NOT_FOUND, RemoteStatus::NotFound)]
    #[case(StatusCode::UNAUTHORIZED, RemoteStatus::Fatal)]
    #[case(StatusCode::FORBIDDEN, RemoteStatus::Fatal)]
    #[case(StatusCode::TOO_MANY_REQUESTS, RemoteStatus::Transient)]
    #[case(StatusCode::REQUEST_TIMEOUT, RemoteStatus::Transient)]
    #[case(StatusCode::INTERNAL_SERVER_ERROR, RemoteStatus::Transient)]
    #[case(StatusCode::BAD_GATEWAY, RemoteStatus::Transient)]
    #[case(StatusCode::SERVICE_UNAVAILABLE, RemoteStatus::Transient)]
    fn test_status_decode(#[case] status: StatusCode, #[case] expected: RemoteStatus) {
        assert_eq!(RemoteStatus::from_status(status), expected);
    }

    #[test]
    fn test_missing_private_key_is_configuration_error() {
        let config = BlobStoreConfig {
            private_key: "  ".to_string(),
            ..test_config()
        };
        let err = HttpBlobClient::from_config(&config).unwrap_err();
        assert!(matches!(err, BlobStoreError::Configuration(_)));
    }

    #[test]
    fn test_missing_endpoint_is_configuration_error() {
        let config = BlobStoreConfig {
            endpoint: String::new(),
            ..test_config()
        };
        let err = HttpBlobClient::from_config(&config).unwrap_err();
        assert!(matches!(err, BlobStoreError::Configuration(_)));
    }

    #[test]
    fn test_blob_url_strips_trailing_slash() {
        let config = BlobStoreConfig {
            endpoint: "https://blobs.example.com/v1/files/".to_string(),
            ..test_config()
        };
        let client = HttpBlobClient::from_config(&config).expect("valid config");
        assert_eq!(
            client.blob_url("abc123").expect("valid id"),
            "https://blobs.example.com/v1/files/abc123"
        );
    }

    #[rstest]
    #[case("")]
    #[case("a/b")]
    #[case("id?x=1")]
    fn test_invalid_blob_ids_rejected(#[case] blob_id: &str) {
        let client = HttpBlobClient::from_config(&test_config()).expect("valid config");
        let err = client.blob_url(blob_id).unwrap_err();
        assert!(matches!(err, BlobStoreError::InvalidBlobId(_)));
    }
}
