//! WebSocket event types broadcast by the engine as the fleet changes.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type")]
pub enum WsEvent {
    HostAdded {
        host: String,
    },
    HostRemoved {
        host: String,
    },
    DaemonDeployed {
        name: String,
    },
    DaemonRemoved {
        name: String,
    },
    UpgradeProgress {
        target: String,
        daemon: String,
    },
    UpgradeCompleted {
        target: String,
    },
    HealthChanged {
        id: String,
        cleared: bool,
    },
}
