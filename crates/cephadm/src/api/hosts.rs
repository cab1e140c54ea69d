//! Host inventory endpoints (§4.K)

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use cephadm_api::requests::{AddHostLabelRequest, AddHostRequest};
use cephadm_api::responses::HostResponse;
use cephadm_core::message::{AddHost, AddHostLabel, ListHosts, RemoveHost};

use crate::api::error::AppError;
use crate::state::AppState;

/// `POST /hosts`
///
/// # Errors
/// Returns `AppError` if the host name is invalid or already registered
pub async fn add_host(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AddHostRequest>,
) -> Result<impl IntoResponse, AppError> {
    state
        .engine
        .ask(AddHost {
            name: req.name,
            addr: req.addr,
            labels: req.labels,
        })
        .await
        .map_err(|e| AppError::internal(format!("failed to add host: {e}")))??;

    Ok(StatusCode::CREATED)
}

/// `DELETE /hosts/:name`
///
/// # Errors
/// Returns `AppError` if the host is unknown
pub async fn remove_host(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    state
        .engine
        .ask(RemoveHost { name })
        .await
        .map_err(|e| AppError::internal(format!("failed to remove host: {e}")))??;

    Ok(StatusCode::NO_CONTENT)
}

/// `GET /hosts`
///
/// # Errors
/// Returns `AppError` if engine communication fails
pub async fn list_hosts(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let hosts = state
        .engine
        .ask(ListHosts)
        .await
        .map_err(|e| AppError::internal(format!("failed to list hosts: {e}")))?;

    let hosts: Vec<HostResponse> = hosts
        .into_iter()
        .map(|h| HostResponse {
            name: h.name,
            addr: h.addr,
            labels: h.labels.into_iter().collect(),
        })
        .collect();

    Ok(Json(hosts))
}

/// `POST /hosts/:name/labels`
///
/// # Errors
/// Returns `AppError` if the host is unknown
pub async fn add_host_label(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(req): Json<AddHostLabelRequest>,
) -> Result<impl IntoResponse, AppError> {
    state
        .engine
        .ask(AddHostLabel {
            name,
            label: req.label,
        })
        .await
        .map_err(|e| AppError::internal(format!("failed to add label: {e}")))??;

    Ok(StatusCode::NO_CONTENT)
}
