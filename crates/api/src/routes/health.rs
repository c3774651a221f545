//! Health check endpoints.

use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use serde::Serialize;

use crate::AppState;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `healthy` when the database answers, `degraded` otherwise.
    pub status: &'static str,
    /// Service name.
    pub service: &'static str,
    /// Service version.
    pub version: &'static str,
    /// Whether the database answered a ping.
    pub database: bool,
}

fn health_report(database: bool) -> (StatusCode, HealthResponse) {
    let (status_code, status) = if database {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };
    (
        status_code,
        HealthResponse {
            status,
            service: "prism",
            version: env!("CARGO_PKG_VERSION"),
            database,
        },
    )
}

/// Health check handler.
///
/// Pings the database so a load balancer sees a dependency failure rather
/// than just a live process. The reconciliation jobs share this connection,
/// so an unreachable database also means deletions are not converging.
async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let database = state.db.ping().await.is_ok();
    let (status_code, body) = health_report(database);
    (status_code, Json(body))
}

/// Creates health check routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_healthy_when_database_answers() {
        let (status_code, body) = health_report(true);
        assert_eq!(status_code, StatusCode::OK);
        assert_eq!(body.status, "healthy");
        assert_eq!(body.service, "prism");
        assert!(body.database);
    }

    #[test]
    fn test_degraded_when_database_is_unreachable() {
        let (status_code, body) = health_report(false);
        assert_eq!(status_code, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body.status, "degraded");
        assert!(!body.database);
    }
}
