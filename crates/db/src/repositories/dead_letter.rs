//! Dead-letter repository for database operations.

use chrono::{DateTime, Utc};
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

use crate::entities::dead_letter_images;
use prism_core::reconcile::{
    DeadLetterEntry, DeadLetterRepository as DeadLetterRepoTrait, ReconcileError,
};

/// Dead-letter repository implementation.
#[derive(Debug, Clone)]
pub struct DeadLetterRepository {
    db: DatabaseConnection,
}

impl DeadLetterRepository {
    /// Create a new dead-letter repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

impl DeadLetterRepoTrait for DeadLetterRepository {
    async fn insert(&self, entry: DeadLetterEntry) -> Result<(), ReconcileError> {
        let active_model = dead_letter_images::ActiveModel {
            id: Set(entry.id),
            owner_id: Set(entry.owner_id),
            blob_id: Set(entry.blob_id),
            filename: Set(entry.filename),
            mime_type: Set(entry.mime_type),
            file_size: Set(entry.file_size),
            retry_count: Set(i32::try_from(entry.retry_count).unwrap_or(i32::MAX)),
            created_at: Set(entry.created_at.into()),
            failed_at: Set(entry.failed_at.into()),
        };

        // The primary key is the image id; a conflict means the escalation
        // already ran (crash between insert and the image delete), so the
        // existing snapshot wins.
        dead_letter_images::Entity::insert(active_model)
            .on_conflict(
                OnConflict::column(dead_letter_images::Column::Id)
                    .do_nothing()
                    .to_owned(),
            )
            .do_nothing()
            .exec(&self.db)
            .await
            .map_err(|e| ReconcileError::repository(e.to_string()))?;

        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<DeadLetterEntry>, ReconcileError> {
        let models = dead_letter_images::Entity::find()
            .all(&self.db)
            .await
            .map_err(|e| ReconcileError::repository(e.to_string()))?;

        Ok(models.into_iter().map(to_domain).collect())
    }

    async fn remove(&self, id: Uuid) -> Result<bool, ReconcileError> {
        let result = dead_letter_images::Entity::delete_many()
            .filter(dead_letter_images::Column::Id.eq(id))
            .exec(&self.db)
            .await
            .map_err(|e| ReconcileError::repository(e.to_string()))?;

        Ok(result.rows_affected > 0)
    }

    async fn remove_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, ReconcileError> {
        let result = dead_letter_images::Entity::delete_many()
            .filter(dead_letter_images::Column::FailedAt.lt(cutoff))
            .exec(&self.db)
            .await
            .map_err(|e| ReconcileError::repository(e.to_string()))?;

        Ok(result.rows_affected)
    }
}

/// Convert database model to domain model.
fn to_domain(model: dead_letter_images::Model) -> DeadLetterEntry {
    DeadLetterEntry {
        id: model.id,
        owner_id: model.owner_id,
        blob_id: model.blob_id,
        filename: model.filename,
        mime_type: model.mime_type,
        file_size: model.file_size,
        retry_count: u32::try_from(model.retry_count).unwrap_or(0),
        created_at: model.created_at.with_timezone(&Utc),
        failed_at: model.failed_at.with_timezone(&Utc),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_domain_maps_fields() {
        let now = Utc::now();
        let id = Uuid::new_v4();
        let uploaded = now - chrono::Duration::days(30);
        let model = dead_letter_images::Model {
            id,
            owner_id: Uuid::new_v4(),
            blob_id: "blob-3".to_string(),
            filename: "f.png".to_string(),
            mime_type: "image/png".to_string(),
            file_size: 77,
            retry_count: 3,
            created_at: uploaded.into(),
            failed_at: now.into(),
        };

        let entry = to_domain(model);
        assert_eq!(entry.id, id);
        assert_eq!(entry.mime_type, "image/png");
        assert_eq!(entry.retry_count, 3);
        assert_eq!(entry.created_at, uploaded);
        assert_eq!(entry.failed_at, now);
    }
}
