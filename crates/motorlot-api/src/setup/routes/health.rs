//! Health check handler and response type.

use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

const REMOTE_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Run an async check with timeout; returns status string "healthy", "timeout", or "{prefix}: {error}".
async fn run_check<F, E>(timeout: Duration, f: F, error_prefix: &str) -> String
where
    F: Future<Output = Result<(), E>>,
    E: Display,
{
    match tokio::time::timeout(timeout, f).await {
        Ok(Ok(())) => "healthy".to_string(),
        Ok(Err(e)) => format!("{}: {}", error_prefix, e),
        Err(_) => "timeout".to_string(),
    }
}

#[derive(serde::Serialize)]
pub(super) struct HealthCheckResponse {
    pub status: String,
    pub remote: String,
}

/// Opens and releases one remote session; 503 when that fails.
pub(super) async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let client = state.upload.orchestrator.client();
    let remote = run_check(REMOTE_CHECK_TIMEOUT, client.check_connectivity(), "unhealthy").await;

    let (status_code, status) = if remote == "healthy" {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (
        status_code,
        Json(HealthCheckResponse {
            status: status.to_string(),
            remote,
        }),
    )
}
