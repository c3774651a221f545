//! Prism API Server
//!
//! Main entry point for the Prism backend service: serves the HTTP API and
//! runs the deletion-reconciliation jobs.

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use prism_api::{AppState, create_router};
use prism_core::blobstore::HttpBlobClient;
use prism_core::reconcile::{JobScheduler, ReconcilePolicy, ReconcileService};
use prism_db::repositories::{DeadLetterRepository, ImageRepository};
use prism_db::connect;
use prism_shared::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "prism=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = AppConfig::load().context("failed to load configuration")?;

    // Connect to database
    let db = connect(&config.database.url).await?;
    info!("Connected to database");

    // Blob store client. A missing credential is a configuration error and
    // kills the process here rather than burning retry budgets later.
    let blob_client = Arc::new(HttpBlobClient::from_config(&config.blobstore)?);
    info!(endpoint = %config.blobstore.endpoint, "Blob store client configured");

    // Reconciliation service and its periodic jobs
    let images = Arc::new(ImageRepository::new(db.clone()));
    let dead_letters = Arc::new(DeadLetterRepository::new(db.clone()));
    let service = Arc::new(ReconcileService::new(
        images,
        dead_letters,
        blob_client,
        ReconcilePolicy::from(&config.reconciler),
    ));
    let scheduler = JobScheduler::new(Arc::clone(&service), config.reconciler.clone());
    let _job_handles = scheduler.start();

    // Create application state and router
    let state = AppState {
        db: Arc::new(db),
        reconciler: Arc::clone(&service),
    };
    let app = create_router(state);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
