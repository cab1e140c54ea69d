//! HTTP router configuration (§4.K command surface)

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};

use crate::api::{daemons, hosts, services, system, upgrade};
use crate::state::AppState;

/// Create the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(system::health))
        .route("/hosts", get(hosts::list_hosts).post(hosts::add_host))
        .route("/hosts/:name", axum::routing::delete(hosts::remove_host))
        .route("/hosts/:name/labels", post(hosts::add_host_label))
        .route("/daemons", get(daemons::list_daemons))
        .route(
            "/daemons/:name",
            axum::routing::delete(daemons::remove_daemon),
        )
        .route("/services/:type/apply", post(services::apply_service))
        .route(
            "/services/:name/action",
            post(services::service_action),
        )
        .route("/upgrade/start", post(upgrade::start))
        .route("/upgrade/status", get(upgrade::status))
        .route("/upgrade/pause", post(upgrade::pause))
        .route("/upgrade/resume", post(upgrade::resume))
        .route("/upgrade/stop", post(upgrade::stop))
        .with_state(state)
}
