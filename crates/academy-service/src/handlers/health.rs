//! Health check handlers.
//!
//! - `/health`: Liveness check - returns OK if the process is running
//! - `/ready`: Readiness check - checks dependencies (DB, JWKS configuration)

use crate::models::ReadinessResponse;
use crate::routes::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use std::sync::Arc;

/// Liveness check handler.
///
/// Does NOT check any dependencies; failure means the process is hung.
pub async fn health_check() -> &'static str {
    "OK"
}

/// Readiness check handler.
///
/// Returns 200 if ready, 503 if not ready.
///
/// ## Checks
///
/// 1. Database connectivity - can execute simple query
/// 2. JWKS URI configured - keys are fetched on demand by the verifier
///
/// Error messages are intentionally generic; actual errors are logged
/// server-side.
#[tracing::instrument(skip_all, name = "academy.health.readiness")]
pub async fn readiness_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if let Err(e) = sqlx::query("SELECT 1").fetch_one(&state.pool).await {
        tracing::warn!(target: "academy.health", error = %e, "Readiness check failed: database error");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadinessResponse {
                status: "not_ready",
                database: Some("unhealthy"),
                jwks: None,
                error: Some("Service dependencies unavailable".to_string()),
            }),
        );
    }

    if state.config.jwks_uri.trim().is_empty() {
        tracing::warn!(target: "academy.health", "Readiness check failed: JWKS URI not configured");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadinessResponse {
                status: "not_ready",
                database: Some("healthy"),
                jwks: Some("missing"),
                error: Some("Service dependencies unavailable".to_string()),
            }),
        );
    }

    (
        StatusCode::OK,
        Json(ReadinessResponse {
            status: "ready",
            database: Some("healthy"),
            jwks: Some("configured"),
            error: None,
        }),
    )
}
