//! Image repository for database operations.
//!
//! Implements the `prism-core` image persistence trait using SeaORM.

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use uuid::Uuid;

use crate::entities::images;
use prism_core::reconcile::{
    DeleteStatus, ImageRecord, ImageRepository as ImageRepoTrait, ReconcileError,
};

/// Image repository implementation.
#[derive(Debug, Clone)]
pub struct ImageRepository {
    db: DatabaseConnection,
}

impl ImageRepository {
    /// Create a new image repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn list_by_status(&self, status: DeleteStatus) -> Result<Vec<ImageRecord>, ReconcileError> {
        let models = images::Entity::find()
            .filter(images::Column::DeleteStatus.eq(status.as_str()))
            .all(&self.db)
            .await
            .map_err(|e| ReconcileError::repository(e.to_string()))?;

        models.into_iter().map(to_domain).collect()
    }
}

impl ImageRepoTrait for ImageRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<ImageRecord>, ReconcileError> {
        let model = images::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(|e| ReconcileError::repository(e.to_string()))?;

        model.map(to_domain).transpose()
    }

    async fn list_pending(&self) -> Result<Vec<ImageRecord>, ReconcileError> {
        self.list_by_status(DeleteStatus::Pending).await
    }

    async fn list_failed(&self) -> Result<Vec<ImageRecord>, ReconcileError> {
        self.list_by_status(DeleteStatus::Failed).await
    }

    async fn mark_pending_delete(&self, id: Uuid) -> Result<bool, ReconcileError> {
        // Guarded by the status filter so the transition only fires on
        // `active` rows; anything else reports not-accepted.
        let result = images::Entity::update_many()
            .col_expr(
                images::Column::DeleteStatus,
                Expr::value(DeleteStatus::Pending.as_str()),
            )
            .col_expr(images::Column::RetryCount, Expr::value(0))
            .col_expr(images::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(images::Column::Id.eq(id))
            .filter(images::Column::DeleteStatus.eq(DeleteStatus::Active.as_str()))
            .exec(&self.db)
            .await
            .map_err(|e| ReconcileError::repository(e.to_string()))?;

        Ok(result.rows_affected > 0)
    }

    async fn set_retry_count(&self, id: Uuid, retry_count: u32) -> Result<(), ReconcileError> {
        images::Entity::update_many()
            .col_expr(
                images::Column::RetryCount,
                Expr::value(i32::try_from(retry_count).unwrap_or(i32::MAX)),
            )
            .col_expr(images::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(images::Column::Id.eq(id))
            .exec(&self.db)
            .await
            .map_err(|e| ReconcileError::repository(e.to_string()))?;

        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, ReconcileError> {
        let result = images::Entity::delete_many()
            .filter(images::Column::Id.eq(id))
            .exec(&self.db)
            .await
            .map_err(|e| ReconcileError::repository(e.to_string()))?;

        Ok(result.rows_affected > 0)
    }
}

/// Convert database model to domain model.
fn to_domain(model: images::Model) -> Result<ImageRecord, ReconcileError> {
    let delete_status = DeleteStatus::parse(&model.delete_status).ok_or_else(|| {
        ReconcileError::repository(format!(
            "image {} has unknown delete_status '{}'",
            model.id, model.delete_status
        ))
    })?;

    Ok(ImageRecord {
        id: model.id,
        owner_id: model.owner_id,
        blob_id: model.blob_id,
        filename: model.filename,
        mime_type: model.mime_type,
        file_size: model.file_size,
        delete_status,
        retry_count: u32::try_from(model.retry_count).unwrap_or(0),
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_domain_rejects_unknown_status() {
        let now = Utc::now();
        let model = images::Model {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            blob_id: "b".to_string(),
            filename: "f.png".to_string(),
            mime_type: "image/png".to_string(),
            file_size: 1,
            delete_status: "deleted".to_string(),
            retry_count: 0,
            created_at: now.into(),
            updated_at: now.into(),
        };

        assert!(matches!(
            to_domain(model),
            Err(ReconcileError::Repository(_))
        ));
    }

    #[test]
    fn test_to_domain_maps_fields() {
        let now = Utc::now();
        let id = Uuid::new_v4();
        let model = images::Model {
            id,
            owner_id: Uuid::new_v4(),
            blob_id: "blob-9".to_string(),
            filename: "f.png".to_string(),
            mime_type: "image/png".to_string(),
            file_size: 123,
            delete_status: "pending".to_string(),
            retry_count: 2,
            created_at: now.into(),
            updated_at: now.into(),
        };

        let record = to_domain(model).expect("valid model");
        assert_eq!(record.id, id);
        assert_eq!(record.delete_status, DeleteStatus::Pending);
        assert_eq!(record.retry_count, 2);
        assert_eq!(record.blob_id, "blob-9");
    }
}
