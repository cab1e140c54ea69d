//! Message types carried over `ActorRef<EngineActor>::ask`, one per HTTP
//! endpoint in §4.K plus the internal serve-loop tick.

use cephadm_inventory::{DaemonDescription, DaemonFilter, ServiceSpec};

use crate::daemon::DaemonAction;
use crate::upgrade::UpgradeState;

/// `POST /hosts`
pub struct AddHost {
    pub name: String,
    pub addr: Option<String>,
    pub labels: Vec<String>,
}

/// `DELETE /hosts/:name`
pub struct RemoveHost {
    pub name: String,
}

/// `GET /hosts`
pub struct ListHosts;

/// `POST /hosts/:name/labels`
pub struct AddHostLabel {
    pub name: String,
    pub label: String,
}

/// `GET /daemons`
pub struct ListDaemons {
    pub filter: DaemonFilter,
}

/// `POST /services/:type/apply`
pub struct ApplyService {
    pub spec: ServiceSpec,
}

/// `POST /services/:name/action`
pub struct ServiceAction {
    pub daemon_type: String,
    pub service_name: String,
    pub action: DaemonAction,
}

/// `DELETE /daemons/:name`
pub struct RemoveDaemon {
    pub name: String,
    pub force: bool,
}

/// `POST /upgrade/start`
pub struct UpgradeStart {
    pub image: Option<String>,
    pub version: Option<String>,
}

/// `GET /upgrade/status`
pub struct UpgradeStatus;

/// `POST /upgrade/pause`
pub struct UpgradePause;

/// `POST /upgrade/resume`
pub struct UpgradeResume;

/// `POST /upgrade/stop`
pub struct UpgradeStop;

/// `GET /health`
pub struct GetHealth;

/// Internal: drive one serve-loop pass (§4.I). Not exposed over HTTP.
pub struct RunTick;

/// Reply carried by [`ListDaemons`]
pub type DaemonList = Vec<DaemonDescription>;

/// Reply carried by [`UpgradeStatus`]
pub type UpgradeStatusReply = Option<UpgradeState>;
