//! Daemon inventory and removal endpoints (§4.K)

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use cephadm_api::requests::{ListDaemonsQuery, RemoveDaemonQuery};
use cephadm_api::responses::DaemonResponse;
use cephadm_core::message::{ListDaemons, RemoveDaemon};
use cephadm_inventory::DaemonFilter;

use crate::api::error::AppError;
use crate::state::AppState;

/// `GET /daemons`
///
/// # Errors
/// Returns `AppError` if engine communication fails
pub async fn list_daemons(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListDaemonsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let mut filter = DaemonFilter::default();
    if let Some(t) = query.daemon_type {
        filter = filter.daemon_type(t);
    }
    if let Some(id) = query.daemon_id {
        filter = filter.daemon_id(id);
    }
    if let Some(name) = query.service_name {
        filter = filter.service_name(name);
    }
    if let Some(host) = query.hostname {
        filter = filter.hostname(host);
    }

    let daemons = state
        .engine
        .ask(ListDaemons { filter })
        .await
        .map_err(|e| AppError::internal(format!("failed to list daemons: {e}")))?;

    let daemons: Vec<DaemonResponse> = daemons
        .into_iter()
        .map(|d| DaemonResponse {
            name: d.name(),
            daemon_type: d.daemon_type,
            daemon_id: d.daemon_id,
            hostname: d.hostname,
            status: format!("{:?}", d.status),
            version: d.version,
            last_refresh: d.last_refresh.map(|dt| dt.to_rfc3339()),
        })
        .collect();

    Ok(Json(daemons))
}

/// `DELETE /daemons/:name`
///
/// # Errors
/// Returns `AppError` if the daemon is unknown or removal fails
pub async fn remove_daemon(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Query(query): Query<RemoveDaemonQuery>,
) -> Result<impl IntoResponse, AppError> {
    state
        .engine
        .ask(RemoveDaemon {
            name,
            force: query.force,
        })
        .await
        .map_err(|e| AppError::internal(format!("failed to remove daemon: {e}")))??;

    Ok(StatusCode::NO_CONTENT)
}
