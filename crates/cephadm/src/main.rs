// Copyright (C) 2026 Mozart409
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published
// by the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! cephadm daemon
//!
//! Actor-based Ceph orchestration engine, driving daemon placement and
//! lifecycle over SSH and exposing the command surface over HTTP.
//!
//! # Usage
//! ```bash
//! # Run with default config
//! cephadm
//!
//! # Run with specific config file
//! CEPHADM_CONFIG=/path/to/cephadm.toml cephadm
//! ```

use std::sync::Arc;

use color_eyre::Result;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cephadm_core::message::AddHost;
use cephadm_core::{EngineActor, EngineActorArgs};
use kameo::actor::Spawn;

mod api;
mod config;
mod factory;
mod router;
mod state;

use config::Config;
use factory::DefaultHostFactory;
use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let config = Config::load_default()?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.daemon.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!("cephadm daemon starting...");
    info!(bind = %config.daemon.bind, "configuration loaded");

    let host_factory = Arc::new(DefaultHostFactory::new());
    let engine_args = EngineActorArgs {
        config: config.engine.clone(),
        host_factory,
        ..EngineActorArgs::default()
    };
    let engine = EngineActor::spawn(engine_args);

    info!("engine actor started");

    for seed in &config.host {
        let result = engine
            .ask(AddHost {
                name: seed.name.clone(),
                addr: seed.addr.clone(),
                labels: seed.labels.clone(),
            })
            .await;
        match result {
            Ok(Ok(())) => info!(host = %seed.name, "seed host registered"),
            Ok(Err(e)) => warn!(host = %seed.name, error = %e, "failed to register seed host"),
            Err(e) => warn!(host = %seed.name, error = %e, "engine unreachable while seeding hosts"),
        }
    }

    let state = Arc::new(AppState::new(engine.clone(), config.clone()));

    let app = router::create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.daemon.bind).await?;
    info!(addr = %config.daemon.bind, "HTTP server listening");
    info!(
        "Health endpoint available at http://{}/health",
        config.daemon.bind
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("shutting down...");

    let _ = engine.stop_gracefully().await;

    info!("shutdown complete");
    Ok(())
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("shutdown signal received");
}
