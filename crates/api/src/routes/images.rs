//! Image routes.
//!
//! `POST /images/{id}/deletion` is the entry point into the deletion
//! reconciliation engine: it flips the record to `pending` and returns
//! immediately; the background jobs take it from there. Authorization is the
//! caller's responsibility and happens upstream of this service.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Serialize;
use serde_json::json;
use tracing::error;
use uuid::Uuid;

use crate::AppState;
use prism_core::reconcile::{ImageRecord, ImageRepository as ImageRepoTrait};
use prism_db::ImageRepository;
use prism_shared::AppError;

/// Creates the image routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/images/{image_id}", get(get_image))
        .route("/images/{image_id}/deletion", post(request_deletion))
}

/// Image details response.
#[derive(Debug, Serialize)]
pub struct ImageResponse {
    /// Image ID.
    pub id: Uuid,
    /// Owning user.
    pub owner_id: Uuid,
    /// Original filename.
    pub filename: String,
    /// MIME type.
    pub mime_type: String,
    /// File size in bytes.
    pub file_size: i64,
    /// Deletion state: `active` or `pending`.
    pub delete_status: &'static str,
    /// Created at timestamp (ISO 8601).
    pub created_at: String,
}

impl From<ImageRecord> for ImageResponse {
    fn from(record: ImageRecord) -> Self {
        Self {
            id: record.id,
            owner_id: record.owner_id,
            filename: record.filename,
            mime_type: record.mime_type,
            file_size: record.file_size,
            delete_status: record.delete_status.as_str(),
            created_at: record.created_at.to_rfc3339(),
        }
    }
}

/// GET `/images/{image_id}` - image details including deletion state.
async fn get_image(State(state): State<AppState>, Path(image_id): Path<Uuid>) -> impl IntoResponse {
    let repo = ImageRepository::new((*state.db).clone());

    match repo.find_by_id(image_id).await {
        Ok(Some(record)) => (StatusCode::OK, Json(ImageResponse::from(record))).into_response(),
        Ok(None) => error_response(&image_not_found(image_id)),
        Err(e) => {
            error!(image_id = %image_id, error = %e, "failed to load image");
            error_response(&AppError::Database(e.to_string()))
        }
    }
}

/// POST `/images/{image_id}/deletion` - mark an image for asynchronous
/// deletion.
///
/// Returns 202: the remote blob is removed eventually by the reconciliation
/// job, not within this request. Goes through the same service the jobs run
/// on, which owns the `active` to `pending` transition.
async fn request_deletion(
    State(state): State<AppState>,
    Path(image_id): Path<Uuid>,
) -> impl IntoResponse {
    let repo = ImageRepository::new((*state.db).clone());

    match state.reconciler.request_deletion(image_id).await {
        Ok(true) => (
            StatusCode::ACCEPTED,
            Json(json!({
                "id": image_id,
                "delete_status": "pending"
            })),
        )
            .into_response(),
        // Distinguish "no such image" from "not in a deletable state".
        Ok(false) => match repo.find_by_id(image_id).await {
            Ok(Some(_)) => error_response(&AppError::Conflict(
                "Image is already pending deletion".to_string(),
            )),
            Ok(None) => error_response(&image_not_found(image_id)),
            Err(e) => {
                error!(image_id = %image_id, error = %e, "failed to load image");
                error_response(&AppError::Database(e.to_string()))
            }
        },
        Err(e) => {
            error!(image_id = %image_id, error = %e, "failed to request deletion");
            error_response(&AppError::Database(e.to_string()))
        }
    }
}

fn image_not_found(image_id: Uuid) -> AppError {
    AppError::NotFound(format!("Image {image_id} not found"))
}

/// Map an [`AppError`] onto the JSON error body shape.
fn error_response(err: &AppError) -> axum::response::Response {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        Json(json!({
            "error": err.error_code(),
            "message": err.to_string()
        })),
    )
        .into_response()
}
