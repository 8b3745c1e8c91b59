use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::services::get_metrics;
use crate::startup::AppState;

/// Health check endpoint for Docker/K8s liveness probes.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.recipients.health_check().await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "service": "relay-service",
                "version": env!("CARGO_PKG_VERSION")
            })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "unhealthy",
                "service": "relay-service",
                "error": e.to_string()
            })),
        ),
    }
}

/// Readiness check endpoint for K8s readiness probes. Ready once both the
/// store and the push provider answer.
pub async fn readiness_check(State(state): State<AppState>) -> StatusCode {
    if let Err(e) = state.recipients.health_check().await {
        tracing::warn!(error = %e, "Recipient store not ready");
        return StatusCode::SERVICE_UNAVAILABLE;
    }

    if let Err(e) = state.push_provider.health_check().await {
        tracing::warn!(error = %e, "Push provider not ready");
        return StatusCode::SERVICE_UNAVAILABLE;
    }

    StatusCode::OK
}

pub async fn metrics_endpoint() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        get_metrics(),
    )
}
