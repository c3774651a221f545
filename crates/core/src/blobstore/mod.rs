//! Blob store boundary.
//!
//! The remote blob store is an HTTP file-management API. Everything the rest
//! of the system knows about it goes through the [`BlobClient`] trait:
//! a tri-state existence check and an idempotent delete. Raw HTTP status
//! codes are decoded exactly once, at this boundary; upstream logic only ever
//! sees the typed results.

mod client;
mod error;

pub use client::{BlobClient, BlobExistence, DeleteOutcome, HttpBlobClient, RemoteStatus};
pub use error::BlobStoreError;
