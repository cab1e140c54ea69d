//! Upgrade state machine endpoints (§4.H, §4.K)

use std::sync::Arc;

use axum::{Json, extract::State, response::IntoResponse};
use cephadm_api::requests::UpgradeStartRequest;
use cephadm_api::responses::{MessageResponse, UpgradeStatusResponse};
use cephadm_core::message::{UpgradePause, UpgradeResume, UpgradeStart, UpgradeStatus, UpgradeStop};

use crate::api::error::AppError;
use crate::state::AppState;

/// `POST /upgrade/start`
///
/// # Errors
/// Returns `AppError` if an upgrade is already in progress
pub async fn start(
    State(state): State<Arc<AppState>>,
    Json(req): Json<UpgradeStartRequest>,
) -> Result<impl IntoResponse, AppError> {
    let message = state
        .engine
        .ask(UpgradeStart {
            image: req.image,
            version: req.version,
        })
        .await
        .map_err(|e| AppError::internal(format!("failed to start upgrade: {e}")))??;

    Ok(Json(MessageResponse { message }))
}

/// `GET /upgrade/status`
///
/// # Errors
/// Returns `AppError` if engine communication fails
pub async fn status(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, AppError> {
    let state = state
        .engine
        .ask(UpgradeStatus)
        .await
        .map_err(|e| AppError::internal(format!("failed to read upgrade status: {e}")))?;

    let response = match state {
        Some(s) => UpgradeStatusResponse {
            target_name: Some(s.target_name),
            target_version: s.target_version,
            paused: s.paused,
            error: s.error,
        },
        None => UpgradeStatusResponse {
            target_name: None,
            target_version: None,
            paused: false,
            error: None,
        },
    };

    Ok(Json(response))
}

/// `POST /upgrade/pause`
///
/// # Errors
/// Returns `AppError` if no upgrade is in progress
pub async fn pause(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, AppError> {
    let message = state
        .engine
        .ask(UpgradePause)
        .await
        .map_err(|e| AppError::internal(format!("failed to pause upgrade: {e}")))??;

    Ok(Json(MessageResponse { message }))
}

/// `POST /upgrade/resume`
///
/// # Errors
/// Returns `AppError` if no upgrade is in progress
pub async fn resume(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, AppError> {
    let message = state
        .engine
        .ask(UpgradeResume)
        .await
        .map_err(|e| AppError::internal(format!("failed to resume upgrade: {e}")))??;

    Ok(Json(MessageResponse { message }))
}

/// `POST /upgrade/stop`
///
/// # Errors
/// Returns `AppError` if engine communication fails
pub async fn stop(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, AppError> {
    let message = state
        .engine
        .ask(UpgradeStop)
        .await
        .map_err(|e| AppError::internal(format!("failed to stop upgrade: {e}")))?;

    Ok(Json(MessageResponse { message }))
}
