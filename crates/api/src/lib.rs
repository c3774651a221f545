//! HTTP API layer with Axum routes.
//!
//! The owning application talks to the reconciliation engine through this
//! surface: it marks images for deletion and can observe their deletion
//! state. Deletion itself always happens asynchronously in the background
//! jobs; no handler here ever blocks on the blob store.

pub mod routes;

use axum::Router;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use prism_core::blobstore::HttpBlobClient;
use prism_core::reconcile::ReconcileService;
use prism_db::{DeadLetterRepository, ImageRepository};

/// The concrete reconciliation service the server wires up at startup.
///
/// Deletion requests go through this service, the same object the background
/// jobs run on, so the state transition has a single owner.
pub type Reconciler = ReconcileService<ImageRepository, DeadLetterRepository, HttpBlobClient>;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub db: Arc<DatabaseConnection>,
    /// Reconciliation service shared with the background jobs.
    pub reconciler: Arc<Reconciler>,
}

/// Creates the main application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", routes::api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
