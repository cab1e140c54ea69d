//! Inventory type definitions: hosts, daemons, service specs

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Host
// ============================================================================

/// A managed host: unique hostname, optional network address, free-form labels
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Host {
    /// Unique hostname (validated against the RFC-952-subset grammar)
    pub name: String,
    /// Network address; falls back to `name` when unset
    pub addr: Option<String>,
    /// Free-form labels used by label-based placement
    pub labels: HashSet<String>,
}

impl Host {
    /// Create a host with no address and no labels
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            addr: None,
            labels: HashSet::new(),
        }
    }

    /// Effective address to connect to
    #[must_use]
    pub fn effective_addr(&self) -> &str {
        self.addr.as_deref().unwrap_or(&self.name)
    }

    /// Whether this host carries the given label
    #[must_use]
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.contains(label)
    }
}

// ============================================================================
// Daemon
// ============================================================================

/// Lifecycle status of a daemon as reported by the remote helper
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DaemonStatus {
    /// Running and healthy
    Running,
    /// Stopped
    Stopped,
    /// In an error state
    Error,
    /// Not yet known (no successful refresh has observed it)
    Unknown,
}

impl DaemonStatus {
    /// Numeric code matching the `{running=1, stopped=0, error=-1, unknown=nil}`
    /// encoding used on the wire.
    #[must_use]
    pub fn code(self) -> Option<i32> {
        match self {
            DaemonStatus::Running => Some(1),
            DaemonStatus::Stopped => Some(0),
            DaemonStatus::Error => Some(-1),
            DaemonStatus::Unknown => None,
        }
    }

    /// Parse the numeric wire code
    #[must_use]
    pub fn from_code(code: Option<i32>) -> Self {
        match code {
            Some(1) => DaemonStatus::Running,
            Some(0) => DaemonStatus::Stopped,
            Some(-1) => DaemonStatus::Error,
            _ => DaemonStatus::Unknown,
        }
    }
}

/// One daemon instance as tracked by the daemon cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonDescription {
    /// Daemon type, e.g. `mon`, `mgr`, `osd`
    pub daemon_type: String,
    /// Daemon id, unique within `daemon_type` cluster-wide
    pub daemon_id: String,
    /// Host this instance runs on
    pub hostname: String,
    /// Container id on the host, once deployed
    pub container_id: Option<String>,
    /// Image name/tag used to deploy it
    pub image_name: Option<String>,
    /// Resolved image digest/id
    pub image_id: Option<String>,
    /// Daemon/ceph version string
    pub version: Option<String>,
    /// Lifecycle status
    pub status: DaemonStatus,
    /// Last time this entry was refreshed from the host
    pub last_refresh: Option<DateTime<Utc>>,
    /// Cluster fsid the daemon was deployed under
    pub fsid: Option<String>,
    /// Deployment style reported by the helper, e.g. `cephadm:v1`
    pub style: Option<String>,
}

impl DaemonDescription {
    /// Create a daemon description in `Unknown` status with no refresh yet
    #[must_use]
    pub fn new(daemon_type: impl Into<String>, daemon_id: impl Into<String>, hostname: impl Into<String>) -> Self {
        Self {
            daemon_type: daemon_type.into(),
            daemon_id: daemon_id.into(),
            hostname: hostname.into(),
            container_id: None,
            image_name: None,
            image_id: None,
            version: None,
            status: DaemonStatus::Unknown,
            last_refresh: None,
            fsid: None,
            style: None,
        }
    }

    /// Stable `type.id` name
    #[must_use]
    pub fn name(&self) -> String {
        format!("{}.{}", self.daemon_type, self.daemon_id)
    }

    /// Placeholder entry served for a host whose daemon cache has never been
    /// refreshed: name `*.*`, status unknown. Placement treats this host as
    /// "do nothing yet" until a real refresh lands.
    #[must_use]
    pub fn unknown_placeholder(hostname: impl Into<String>) -> Self {
        Self::new("*", "*", hostname)
    }

    /// Whether this entry is the `*.*` unknown placeholder
    #[must_use]
    pub fn is_unknown_placeholder(&self) -> bool {
        self.daemon_type == "*" && self.daemon_id == "*"
    }
}

// ============================================================================
// Placement / service spec
// ============================================================================

/// One resolved placement target: hostname, optional network, optional
/// explicitly-requested daemon name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HostPlacement {
    /// Target hostname
    pub hostname: String,
    /// Network CIDR the daemon should bind within (required for monitors)
    pub network: Option<String>,
    /// Explicit daemon name requested by the caller
    pub name: Option<String>,
}

impl HostPlacement {
    /// A placement entry naming only a host
    #[must_use]
    pub fn bare(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            network: None,
            name: None,
        }
    }
}

/// How a service's placement is specified
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementSpec {
    /// Explicit host list (imperative, never resolved by the scheduler)
    Hosts(Vec<HostPlacement>),
    /// Select every host carrying this label
    Label(String),
    /// Let the scheduler pick `count` hosts from the candidate pool
    Count(usize),
}

impl PlacementSpec {
    /// The explicit host list, once resolved, or the list already given
    #[must_use]
    pub fn resolved_hosts(&self) -> Option<&[HostPlacement]> {
        match self {
            PlacementSpec::Hosts(hosts) => Some(hosts),
            _ => None,
        }
    }
}

/// Declarative specification of a service: type, name, and placement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSpec {
    /// Daemon type this service deploys, e.g. `mon`, `rgw`
    pub service_type: String,
    /// Service name (defaults to `service_type` for singleton services)
    pub service_name: String,
    /// Where to place daemons
    pub placement: PlacementSpec,
}

impl ServiceSpec {
    /// Construct a spec, defaulting `service_name` to `service_type`
    #[must_use]
    pub fn new(service_type: impl Into<String>, placement: PlacementSpec) -> Self {
        let service_type = service_type.into();
        Self {
            service_name: service_type.clone(),
            service_type,
            placement,
        }
    }

    /// Validate field combinations that cannot be expressed in the type alone
    ///
    /// # Errors
    /// Returns a message describing the violated invariant.
    pub fn validate(&self) -> Result<(), String> {
        if self.service_type == "mon"
            && let PlacementSpec::Hosts(hosts) = &self.placement
            && hosts.iter().any(|h| h.network.is_none())
        {
            return Err("monitor placement entries must each carry a network".to_string());
        }
        Ok(())
    }
}
