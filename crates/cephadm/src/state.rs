//! Application state shared across HTTP handlers

use std::sync::Arc;

use cephadm_core::EngineActor;
use kameo::actor::ActorRef;

use crate::config::Config;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Reference to the reconciliation engine actor
    pub engine: ActorRef<EngineActor>,
    /// Application configuration
    pub config: Arc<Config>,
}

impl AppState {
    /// Create new application state
    #[must_use]
    pub fn new(engine: ActorRef<EngineActor>, config: Config) -> Self {
        Self {
            engine,
            config: Arc::new(config),
        }
    }
}
