//! Deletion reconciliation.
//!
//! When an image is marked for deletion its database record and its remote
//! blob live in two stores that fail independently and share no transaction.
//! This module converges them: a reconciliation pass drives `pending` records
//! through an idempotent state machine against the blob store, exhausted
//! records are moved to a dead-letter store, an audit pass later repairs
//! false positives there, and a retention pass forgets aged-out entries.
//!
//! State machine:
//!
//! ```text
//! ACTIVE --request_deletion--> PENDING
//! PENDING --(absent | delete ok)--> removed
//! PENDING --(transient, retry < max)--> PENDING
//! PENDING --(transient, retry >= max)--> dead-lettered
//! dead-lettered --(audit: absent | delete ok)--> removed
//! dead-lettered --(older than horizon)--> removed, orphan accepted
//! ```

mod error;
mod scheduler;
mod service;
mod types;

pub use error::ReconcileError;
pub use scheduler::JobScheduler;
pub use service::{DeadLetterRepository, ImageRepository, ReconcileService};
pub use types::{
    AuditSummary, DeadLetterEntry, DeleteStatus, ImageRecord, ReconcileOutcome, ReconcilePolicy,
    ReconcileSummary, RetentionSummary,
};
