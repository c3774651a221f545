//! Reconciliation types and data structures.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use prism_shared::config::ReconcilerConfig;

/// Deletion state of an image record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteStatus {
    /// Live image, not marked for deletion.
    #[default]
    Active,
    /// Marked for deletion; the remote blob is not yet confirmed gone.
    Pending,
    /// Legacy terminal state from the pre-dead-letter scheme. No longer
    /// written; existing rows are swept into the dead-letter store.
    Failed,
}

impl DeleteStatus {
    /// Convert to database string value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Pending => "pending",
            Self::Failed => "failed",
        }
    }

    /// Parse from database string value.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "pending" => Some(Self::Pending),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// An uploaded image's metadata record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRecord {
    /// Image ID.
    pub id: Uuid,
    /// Owning user.
    pub owner_id: Uuid,
    /// Identifier of the blob on the remote store.
    pub blob_id: String,
    /// Original filename.
    pub filename: String,
    /// MIME type.
    pub mime_type: String,
    /// File size in bytes.
    pub file_size: i64,
    /// Deletion state.
    pub delete_status: DeleteStatus,
    /// Failed remote-delete attempts so far. Meaningful only while
    /// `delete_status` is `Pending`; never exceeds the retry budget while the
    /// record still lives in the image store.
    pub retry_count: u32,
    /// When the image was uploaded.
    pub created_at: DateTime<Utc>,
    /// When the record was last updated.
    pub updated_at: DateTime<Utc>,
}

/// Snapshot of an image whose deletion exhausted its retry budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetterEntry {
    /// Image ID (primary key; escalation dedupes on it).
    pub id: Uuid,
    /// Owning user at escalation time.
    pub owner_id: Uuid,
    /// Remote blob identifier.
    pub blob_id: String,
    /// Original filename.
    pub filename: String,
    /// MIME type.
    pub mime_type: String,
    /// File size in bytes.
    pub file_size: i64,
    /// Retry count at escalation time.
    pub retry_count: u32,
    /// When the image was originally uploaded.
    pub created_at: DateTime<Utc>,
    /// When the retry budget was exhausted.
    pub failed_at: DateTime<Utc>,
}

impl DeadLetterEntry {
    /// Snapshot an image at the moment of escalation.
    #[must_use]
    pub fn from_image(image: &ImageRecord, retry_count: u32, failed_at: DateTime<Utc>) -> Self {
        Self {
            id: image.id,
            owner_id: image.owner_id,
            blob_id: image.blob_id.clone(),
            filename: image.filename.clone(),
            mime_type: image.mime_type.clone(),
            file_size: image.file_size,
            retry_count,
            created_at: image.created_at,
            failed_at,
        }
    }
}

/// Tunables of the reconciliation state machine.
#[derive(Debug, Clone, Copy)]
pub struct ReconcilePolicy {
    /// Remote delete attempts before a record is dead-lettered.
    pub max_retries: u32,
    /// Age in days past which the retention sweep forgets dead-letter entries.
    pub retention_days: i64,
    /// Records reconciled concurrently within one pass.
    pub concurrency: usize,
}

impl Default for ReconcilePolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retention_days: 60,
            concurrency: 8,
        }
    }
}

impl From<&ReconcilerConfig> for ReconcilePolicy {
    fn from(config: &ReconcilerConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            retention_days: config.retention_days,
            concurrency: config.concurrency.max(1),
        }
    }
}

/// Terminal effect of one reconcile attempt on one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Blob confirmed gone; the record was hard-deleted.
    Removed,
    /// Transient failure; the record stays pending with this retry count.
    Retried(u32),
    /// Retry budget exhausted; the record moved to the dead-letter store.
    DeadLettered,
}

/// What one reconciliation pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    /// Legacy `failed` records swept into the dead-letter store.
    pub swept_legacy: u64,
    /// Pending records picked up this pass.
    pub scanned: u64,
    /// Records hard-deleted after their blob was confirmed gone.
    pub removed: u64,
    /// Records left pending with an incremented retry count.
    pub retried: u64,
    /// Records escalated to the dead-letter store.
    pub dead_lettered: u64,
    /// Records that hit a non-fatal error and could not be advanced.
    pub errors: u64,
}

/// What one audit pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuditSummary {
    /// Dead-letter entries examined.
    pub scanned: u64,
    /// False positives removed without a delete call (blob already gone).
    pub repaired: u64,
    /// Entries removed after a successful delete.
    pub deleted: u64,
    /// Entries left for the next audit pass.
    pub remaining: u64,
    /// Entries that hit a non-fatal error.
    pub errors: u64,
}

/// What one retention sweep did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetentionSummary {
    /// Entries forgotten because they aged past the horizon.
    pub purged: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delete_status_round_trip() {
        for status in [
            DeleteStatus::Active,
            DeleteStatus::Pending,
            DeleteStatus::Failed,
        ] {
            assert_eq!(DeleteStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(DeleteStatus::parse("deleted"), None);
    }

    #[test]
    fn test_dead_letter_snapshot_carries_image_fields() {
        let uploaded = Utc::now() - chrono::Duration::days(7);
        let failed = Utc::now();
        let image = ImageRecord {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            blob_id: "blob-1".to_string(),
            filename: "sunset.png".to_string(),
            mime_type: "image/png".to_string(),
            file_size: 2048,
            delete_status: DeleteStatus::Pending,
            retry_count: 2,
            created_at: uploaded,
            updated_at: failed,
        };

        let entry = DeadLetterEntry::from_image(&image, 3, failed);
        assert_eq!(entry.id, image.id);
        assert_eq!(entry.owner_id, image.owner_id);
        assert_eq!(entry.blob_id, image.blob_id);
        assert_eq!(entry.filename, image.filename);
        assert_eq!(entry.mime_type, image.mime_type);
        assert_eq!(entry.file_size, image.file_size);
        assert_eq!(entry.retry_count, 3);
        assert_eq!(entry.created_at, uploaded);
        assert_eq!(entry.failed_at, failed);
    }

    #[test]
    fn test_policy_from_config_clamps_concurrency() {
        let config = ReconcilerConfig {
            concurrency: 0,
            ..ReconcilerConfig::default()
        };
        let policy = ReconcilePolicy::from(&config);
        assert_eq!(policy.concurrency, 1);
        assert_eq!(policy.max_retries, 3);
    }
}
