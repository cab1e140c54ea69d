//! Service placement and lifecycle action endpoints (§4.K)

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use cephadm_api::requests::{ApplyServiceRequest, PlacementRequest, ServiceActionRequest};
use cephadm_api::responses::ApplyResponse;
use cephadm_core::daemon::DaemonAction;
use cephadm_core::error::CephadmError;
use cephadm_core::message::{ApplyService, ServiceAction};
use cephadm_inventory::{HostPlacement, PlacementSpec, ServiceSpec};

use crate::api::error::AppError;
use crate::state::AppState;

fn to_placement_spec(req: PlacementRequest) -> PlacementSpec {
    match req {
        PlacementRequest::Hosts(hosts) => {
            PlacementSpec::Hosts(hosts.into_iter().map(HostPlacement::bare).collect())
        }
        PlacementRequest::Label(label) => PlacementSpec::Label(label),
        PlacementRequest::Count(count) => PlacementSpec::Count(count),
    }
}

/// `POST /services/:type/apply`
///
/// # Errors
/// Returns `AppError` if the spec is invalid or placement cannot be satisfied
pub async fn apply_service(
    State(state): State<Arc<AppState>>,
    Path(service_type): Path<String>,
    Json(req): Json<ApplyServiceRequest>,
) -> Result<impl IntoResponse, AppError> {
    let placement = to_placement_spec(req.placement);
    let mut spec = ServiceSpec::new(service_type, placement);
    if let Some(name) = req.service_name {
        spec.service_name = name;
    }

    let report = state
        .engine
        .ask(ApplyService { spec })
        .await
        .map_err(|e| AppError::internal(format!("failed to apply service: {e}")))??;

    Ok(Json(ApplyResponse {
        deployed: report.deployed,
        removed: report.removed,
        unchanged: report.unchanged,
    }))
}

/// `POST /services/:name/action`
///
/// # Errors
/// Returns `AppError` if the action is unrecognized or the lifecycle call fails
pub async fn service_action(
    State(state): State<Arc<AppState>>,
    Path(service_name): Path<String>,
    Json(req): Json<ServiceActionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let action = DaemonAction::parse(&req.action).ok_or_else(|| {
        AppError::from(CephadmError::ValidationError(format!(
            "unrecognized action {}",
            req.action
        )))
    })?;

    state
        .engine
        .ask(ServiceAction {
            daemon_type: req.daemon_type,
            service_name,
            action,
        })
        .await
        .map_err(|e| AppError::internal(format!("failed to run service action: {e}")))??;

    Ok(axum::http::StatusCode::ACCEPTED)
}
