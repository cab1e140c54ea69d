//! Named health checks raised by the serve loop and upgrade state machine
//! (§4.H, §4.I): a small id → alert map, mirroring the original's
//! `self.health_checks` dictionary plus `set_health_checks`.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

/// Well-known health check identifiers
pub mod ids {
    pub const HOST_CHECK_FAILED: &str = "CEPHADM_HOST_CHECK_FAILED";
    pub const REFRESH_FAILED: &str = "CEPHADM_REFRESH_FAILED";
    pub const STRAY_HOST: &str = "CEPHADM_STRAY_HOST";
    pub const STRAY_DAEMON: &str = "CEPHADM_STRAY_DAEMON";
    pub const UPGRADE_FAILED_PULL: &str = "UPGRADE_FAILED_PULL";
    pub const UPGRADE_NO_STANDBY_MGR: &str = "UPGRADE_NO_STANDBY_MGR";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

/// One raised alert, matching the `{severity, summary, count, detail}` shape
/// the original threads through `_fail_upgrade`/stray detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthAlert {
    pub severity: Severity,
    pub summary: String,
    pub count: usize,
    pub detail: Vec<String>,
}

impl HealthAlert {
    #[must_use]
    pub fn warning(summary: impl Into<String>, detail: Vec<String>) -> Self {
        let count = detail.len().max(1);
        Self {
            severity: Severity::Warning,
            summary: summary.into(),
            count,
            detail,
        }
    }
}

/// Where raised/cleared health checks go; production implementation backs
/// the cluster's health-check dictionary, tests substitute an in-memory one.
pub trait HealthCheckSink: Send + Sync {
    fn raise(&self, id: &str, alert: HealthAlert);
    fn clear(&self, id: &str);
    fn snapshot(&self) -> HashMap<String, HealthAlert>;
}

#[derive(Debug, Default)]
pub struct InMemoryHealthChecks {
    checks: Mutex<HashMap<String, HealthAlert>>,
}

impl InMemoryHealthChecks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl HealthCheckSink for InMemoryHealthChecks {
    fn raise(&self, id: &str, alert: HealthAlert) {
        self.checks
            .lock()
            .expect("health check mutex poisoned")
            .insert(id.to_string(), alert);
    }

    fn clear(&self, id: &str) {
        self.checks.lock().expect("health check mutex poisoned").remove(id);
    }

    fn snapshot(&self) -> HashMap<String, HealthAlert> {
        self.checks.lock().expect("health check mutex poisoned").clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raise_then_clear_round_trips() {
        let sink = InMemoryHealthChecks::new();
        sink.raise(ids::STRAY_HOST, HealthAlert::warning("stray host h9", vec!["h9".to_string()]));
        assert!(sink.snapshot().contains_key(ids::STRAY_HOST));
        sink.clear(ids::STRAY_HOST);
        assert!(!sink.snapshot().contains_key(ids::STRAY_HOST));
    }
}
