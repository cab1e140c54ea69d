//! `GET /health`

use std::sync::Arc;

use axum::{Json, extract::State, response::IntoResponse};
use cephadm_api::responses::{HealthCheckEntry, HealthResponse};
use cephadm_core::message::GetHealth;

use crate::api::error::AppError;
use crate::state::AppState;

/// `GET /health`
///
/// # Errors
/// Returns `AppError` if engine communication fails
pub async fn health(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, AppError> {
    let checks = state
        .engine
        .ask(GetHealth)
        .await
        .map_err(|e| AppError::internal(format!("failed to read health: {e}")))?;

    let status = if checks.values().any(|a| matches!(a.severity, cephadm_core::healthcheck::Severity::Error)) {
        "HEALTH_ERR"
    } else if checks.is_empty() {
        "HEALTH_OK"
    } else {
        "HEALTH_WARN"
    };

    let checks = checks
        .into_iter()
        .map(|(id, alert)| HealthCheckEntry {
            id,
            severity: format!("{:?}", alert.severity),
            summary: alert.summary,
            count: alert.count,
        })
        .collect();

    Ok(Json(HealthResponse {
        status: status.to_string(),
        checks,
    }))
}
