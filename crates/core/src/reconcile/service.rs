//! Reconciliation service: the deletion state machine and batch passes.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use futures::stream;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::error::ReconcileError;
use super::types::{
    AuditSummary, DeadLetterEntry, ImageRecord, ReconcileOutcome, ReconcilePolicy,
    ReconcileSummary, RetentionSummary,
};
use crate::blobstore::{BlobClient, BlobExistence, DeleteOutcome};

/// Repository trait for image persistence.
///
/// This trait is implemented by the db crate to provide actual database
/// operations. The reconciliation service is the sole writer of
/// `delete_status` and `retry_count`.
pub trait ImageRepository: Send + Sync {
    /// Find an image by ID.
    fn find_by_id(
        &self,
        id: Uuid,
    ) -> impl std::future::Future<Output = Result<Option<ImageRecord>, ReconcileError>> + Send;

    /// List all images pending deletion.
    fn list_pending(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<ImageRecord>, ReconcileError>> + Send;

    /// List images stuck in the legacy `failed` state.
    fn list_failed(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<ImageRecord>, ReconcileError>> + Send;

    /// Transition an `active` image to `pending` with a zeroed retry count.
    /// Returns `false` if the image does not exist or is not `active`.
    fn mark_pending_delete(
        &self,
        id: Uuid,
    ) -> impl std::future::Future<Output = Result<bool, ReconcileError>> + Send;

    /// Persist an updated retry count on a pending image.
    fn set_retry_count(
        &self,
        id: Uuid,
        retry_count: u32,
    ) -> impl std::future::Future<Output = Result<(), ReconcileError>> + Send;

    /// Hard-delete an image record. Returns `false` if it was already gone.
    fn delete(
        &self,
        id: Uuid,
    ) -> impl std::future::Future<Output = Result<bool, ReconcileError>> + Send;
}

/// Repository trait for the dead-letter store.
pub trait DeadLetterRepository: Send + Sync {
    /// Insert an entry. Inserting an entry for an already dead-lettered image
    /// is a no-op, so re-entry after a crash is safe.
    fn insert(
        &self,
        entry: DeadLetterEntry,
    ) -> impl std::future::Future<Output = Result<(), ReconcileError>> + Send;

    /// List every entry.
    fn list_all(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<DeadLetterEntry>, ReconcileError>> + Send;

    /// Remove an entry by image ID. Returns `false` if it was already gone.
    fn remove(
        &self,
        id: Uuid,
    ) -> impl std::future::Future<Output = Result<bool, ReconcileError>> + Send;

    /// Remove every entry that failed before the cutoff. Returns the count.
    fn remove_older_than(
        &self,
        cutoff: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<u64, ReconcileError>> + Send;
}

/// Effect of auditing a single dead-letter entry.
enum AuditAction {
    Repaired,
    Deleted,
    Left,
}

/// Reconciliation service.
///
/// Drives images marked for deletion through the state machine against the
/// blob store, escalates exhausted records to the dead-letter store, and runs
/// the corrective audit and retention sweeps over it.
pub struct ReconcileService<R, D, B> {
    images: Arc<R>,
    dead_letters: Arc<D>,
    blobs: Arc<B>,
    policy: ReconcilePolicy,
}

impl<R, D, B> ReconcileService<R, D, B>
where
    R: ImageRepository,
    D: DeadLetterRepository,
    B: BlobClient,
{
    /// Create a new reconciliation service.
    #[must_use]
    pub fn new(images: Arc<R>, dead_letters: Arc<D>, blobs: Arc<B>, policy: ReconcilePolicy) -> Self {
        Self {
            images,
            dead_letters,
            blobs,
            policy,
        }
    }

    /// Mark an image for asynchronous deletion.
    ///
    /// Purely a state transition; no remote call happens here. Returns `true`
    /// if the image was `active` and is now `pending`, `false` otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository fails.
    pub async fn request_deletion(&self, image_id: Uuid) -> Result<bool, ReconcileError> {
        let accepted = self.images.mark_pending_delete(image_id).await?;
        if accepted {
            info!(image_id = %image_id, "image marked for deletion");
        }
        Ok(accepted)
    }

    /// Run one reconciliation pass.
    ///
    /// Sweeps legacy `failed` records into the dead-letter store, then drives
    /// every `pending` record through [`Self::attempt_reconcile`]. Records
    /// are independent: a failure on one is logged and counted as that
    /// record's transient failure, never aborting the batch. Only systemic
    /// errors (misconfiguration, rejected credentials) fail the pass.
    ///
    /// # Errors
    ///
    /// Returns an error on systemic blob store failures or if the pending
    /// snapshot cannot be fetched.
    pub async fn run_reconcile_pass(&self) -> Result<ReconcileSummary, ReconcileError> {
        let mut summary = ReconcileSummary {
            swept_legacy: self.sweep_legacy_failed().await?,
            ..ReconcileSummary::default()
        };

        let pending = self.images.list_pending().await?;
        summary.scanned = u64::try_from(pending.len()).unwrap_or(u64::MAX);

        let results: Vec<_> = stream::iter(pending)
            .map(|image| self.reconcile_record(image))
            .buffer_unordered(self.policy.concurrency)
            .collect()
            .await;

        for result in results {
            match result? {
                Some(ReconcileOutcome::Removed) => summary.removed += 1,
                Some(ReconcileOutcome::Retried(_)) => summary.retried += 1,
                Some(ReconcileOutcome::DeadLettered) => summary.dead_lettered += 1,
                None => summary.errors += 1,
            }
        }

        Ok(summary)
    }

    /// Run one reconcile attempt on a single pending image.
    ///
    /// The existence check comes first so an already-gone blob short-circuits
    /// without a delete call, and a 404 on delete counts as success; every
    /// step therefore tolerates re-execution after a crash.
    ///
    /// # Errors
    ///
    /// Returns an error if the blob store or a repository fails. Transient
    /// remote failures are not errors; they come back as
    /// [`ReconcileOutcome::Retried`] or [`ReconcileOutcome::DeadLettered`].
    pub async fn attempt_reconcile(
        &self,
        image: &ImageRecord,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        match self.blobs.exists(&image.blob_id).await? {
            BlobExistence::Absent => {
                // Blob already gone by some other path: no delete call needed.
                self.images.delete(image.id).await?;
                debug!(image_id = %image.id, blob_id = %image.blob_id, "blob already absent; record removed");
                Ok(ReconcileOutcome::Removed)
            }
            // Unknown is treated as "might still exist": attempting the
            // delete anyway is safe and avoids silently leaving orphans.
            BlobExistence::Present | BlobExistence::Unknown => {
                match self.blobs.delete(&image.blob_id).await? {
                    DeleteOutcome::Ok => {
                        self.images.delete(image.id).await?;
                        debug!(image_id = %image.id, blob_id = %image.blob_id, "blob deleted; record removed");
                        Ok(ReconcileOutcome::Removed)
                    }
                    DeleteOutcome::Transient => self.register_transient(image).await,
                }
            }
        }
    }

    /// Run one audit pass over the dead-letter store.
    ///
    /// Entries whose blob is confirmed absent are false positives and are
    /// removed without a delete call; otherwise one delete is attempted and
    /// the entry is removed on success or left for the next pass. The audit
    /// never grows a retry counter.
    ///
    /// # Errors
    ///
    /// Returns an error on systemic blob store failures or if the entry
    /// snapshot cannot be fetched.
    pub async fn run_audit_pass(&self) -> Result<AuditSummary, ReconcileError> {
        let entries = self.dead_letters.list_all().await?;
        let mut summary = AuditSummary {
            scanned: u64::try_from(entries.len()).unwrap_or(u64::MAX),
            ..AuditSummary::default()
        };

        for entry in entries {
            match self.audit_entry(&entry).await {
                Ok(AuditAction::Repaired) => {
                    info!(image_id = %entry.id, blob_id = %entry.blob_id, "dead-letter false positive repaired");
                    summary.repaired += 1;
                }
                Ok(AuditAction::Deleted) => {
                    info!(image_id = %entry.id, blob_id = %entry.blob_id, "dead-lettered blob deleted on audit");
                    summary.deleted += 1;
                }
                Ok(AuditAction::Left) => summary.remaining += 1,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(image_id = %entry.id, error = %e, "audit of dead-letter entry failed");
                    summary.errors += 1;
                }
            }
        }

        Ok(summary)
    }

    /// Run one retention sweep over the dead-letter store.
    ///
    /// Entries older than the horizon are forgotten unconditionally, even if
    /// their blob may remain orphaned remotely. Bounded bookkeeping beats
    /// unbounded growth here.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository fails.
    pub async fn run_retention_pass(&self) -> Result<RetentionSummary, ReconcileError> {
        let cutoff = Utc::now() - chrono::Duration::days(self.policy.retention_days);
        let purged = self.dead_letters.remove_older_than(cutoff).await?;
        if purged > 0 {
            info!(purged, "retention sweep forgot aged-out dead-letter entries");
        }
        Ok(RetentionSummary { purged })
    }

    /// Audit one dead-letter entry.
    ///
    /// Follows the same exists-then-delete shape as a reconcile attempt, but
    /// removes the entry instead of an image row and never touches a retry
    /// counter.
    async fn audit_entry(&self, entry: &DeadLetterEntry) -> Result<AuditAction, ReconcileError> {
        match self.blobs.exists(&entry.blob_id).await? {
            BlobExistence::Absent => {
                self.dead_letters.remove(entry.id).await?;
                Ok(AuditAction::Repaired)
            }
            BlobExistence::Present | BlobExistence::Unknown => {
                match self.blobs.delete(&entry.blob_id).await? {
                    DeleteOutcome::Ok => {
                        self.dead_letters.remove(entry.id).await?;
                        Ok(AuditAction::Deleted)
                    }
                    DeleteOutcome::Transient => Ok(AuditAction::Left),
                }
            }
        }
    }

    /// Reconcile one record, isolating non-fatal failures.
    ///
    /// Returns `Ok(None)` when the record hit a non-fatal error that could
    /// not even be persisted as a retry; the next pass picks it up again.
    async fn reconcile_record(
        &self,
        image: ImageRecord,
    ) -> Result<Option<ReconcileOutcome>, ReconcileError> {
        match self.attempt_reconcile(&image).await {
            Ok(outcome) => Ok(Some(outcome)),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!(
                    image_id = %image.id,
                    blob_id = %image.blob_id,
                    error = %e,
                    "reconcile attempt failed; counting as transient"
                );
                match self.register_transient(&image).await {
                    Ok(outcome) => Ok(Some(outcome)),
                    Err(e) if e.is_fatal() => Err(e),
                    Err(e) => {
                        error!(image_id = %image.id, error = %e, "could not persist retry");
                        Ok(None)
                    }
                }
            }
        }
    }

    /// Count one transient failure against a pending image.
    async fn register_transient(
        &self,
        image: &ImageRecord,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let retry_count = image.retry_count + 1;
        if retry_count >= self.policy.max_retries {
            self.move_to_dead_letters(image, retry_count).await?;
            Ok(ReconcileOutcome::DeadLettered)
        } else {
            self.images.set_retry_count(image.id, retry_count).await?;
            debug!(image_id = %image.id, retry_count, "transient failure; will retry next pass");
            Ok(ReconcileOutcome::Retried(retry_count))
        }
    }

    /// Move an image into the dead-letter store.
    ///
    /// Insert first, delete second: if the process dies in between, the image
    /// row is still authoritative and the next pass re-runs this move; the
    /// insert dedupes on image ID.
    async fn move_to_dead_letters(
        &self,
        image: &ImageRecord,
        retry_count: u32,
    ) -> Result<(), ReconcileError> {
        let entry = DeadLetterEntry::from_image(image, retry_count, Utc::now());
        self.dead_letters.insert(entry).await?;
        self.images.delete(image.id).await?;
        warn!(
            image_id = %image.id,
            blob_id = %image.blob_id,
            retry_count,
            "deletion retry budget exhausted; image dead-lettered"
        );
        Ok(())
    }

    /// Sweep legacy `failed` records into the dead-letter store.
    async fn sweep_legacy_failed(&self) -> Result<u64, ReconcileError> {
        let failed = self.images.list_failed().await?;
        let mut swept = 0;
        for image in failed {
            match self.move_to_dead_letters(&image, image.retry_count).await {
                Ok(()) => swept += 1,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(image_id = %image.id, error = %e, "failed to sweep legacy record");
                }
            }
        }
        Ok(swept)
    }
}


#[cfg(test)]
mod property_tests {
    use super::tests::{fixture, image};
    use super::*;
    use crate::reconcile::types::DeleteStatus;
    use proptest::prelude::*;

    // For any finite sequence of delete outcomes, a pending record reaches a
    // terminal state within max_retries passes of its first success (or is
    // dead-lettered after exactly max_retries failures), and its retry count
    // is monotonically non-decreasing and never exceeds the budget while the
    // record is still in the store.
    proptest! {
        #[test]
        fn prop_terminal_within_budget(outcomes in proptest::collection::vec(any::<bool>(), 1..6)) {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("runtime");

            rt.block_on(async {
                let f = fixture();
                let record = image("prop", DeleteStatus::Pending);
                let id = record.id;
                f.images.add(record);
                f.blobs.script_delete(outcomes.iter().map(|&ok| {
                    Ok(if ok {
                        crate::blobstore::DeleteOutcome::Ok
                    } else {
                        crate::blobstore::DeleteOutcome::Transient
                    })
                }));

                let max_retries = 3u32;
                let mut last_retry = 0u32;
                let mut passes_run = 0u32;

                while f.images.get(id).is_some() && passes_run < 8 {
                    f.service.run_reconcile_pass().await.expect("pass");
                    passes_run += 1;

                    if let Some(stored) = f.images.get(id) {
                        prop_assert!(stored.retry_count >= last_retry, "retry count regressed");
                        prop_assert!(stored.retry_count < max_retries, "over-budget record left in store");
                        last_retry = stored.retry_count;
                    }
                }

                // The record always leaves the store within the budget.
                prop_assert!(f.images.get(id).is_none());
                prop_assert!(passes_run <= max_retries);

                let first_ok = outcomes.iter().position(|&ok| ok);
                match first_ok {
                    Some(i) if (i as u32) < max_retries => {
                        prop_assert_eq!(f.dead_letters.len(), 0, "success must not dead-letter");
                        prop_assert_eq!(passes_run, i as u32 + 1);
                    }
                    _ => {
                        prop_assert_eq!(f.dead_letters.len(), 1, "exhausted budget must dead-letter");
                        prop_assert_eq!(passes_run, max_retries);
                        prop_assert_eq!(f.dead_letters.get(id).unwrap().retry_count, max_retries);
                    }
                }
                Ok(())
            })?;
        }
    }
}
