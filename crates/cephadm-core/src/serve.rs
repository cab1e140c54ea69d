//! Serve loop (§4.I): the engine's single background tick, grounded in
//! the original `serve()`/`_kick_serve_loop` pair — an event-gated sleep
//! with a fixed backstop interval.

use std::collections::HashSet;
use std::time::Duration;

use cephadm_exec::RemoteCommand;
use cephadm_inventory::{DaemonDescription, Host, OutdatableCache};

use crate::configstore::ConfigStore;
use crate::error::CephadmError;
use crate::healthcheck::{HealthAlert, HealthCheckSink, ids};
use crate::service::ExecutorTable;
use crate::upgrade::{self, StepContext, StepOutcome, UpgradeState};

/// Gate the serve loop sleeps on; any mutator wakes it early, the fixed
/// interval is the backstop (§9 open-question resolution).
#[derive(Debug, Default)]
pub struct WakeGate {
    notify: tokio::sync::Notify,
}

impl WakeGate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wake an in-progress sleep immediately.
    pub fn kick(&self) {
        self.notify.notify_waiters();
    }

    /// Sleep until kicked or `interval` elapses, whichever comes first.
    pub async fn wait(&self, interval: Duration) {
        tokio::select! {
            () = self.notify.notified() => {}
            () = tokio::time::sleep(interval) => {}
        }
    }
}

/// Everything one serve tick touches, gathered by the engine.
pub struct TickContext<'a> {
    pub hosts: &'a [Host],
    pub executors: &'a ExecutorTable,
    pub daemon_cache: &'a mut OutdatableCache<Vec<DaemonDescription>>,
    pub daemon_cache_timeout: Duration,
    pub config_store: &'a dyn ConfigStore,
    pub fsid: &'a str,
    pub health: &'a dyn HealthCheckSink,
    pub cluster_reported_hosts: &'a [String],
    pub cluster_reported_daemons: &'a [DaemonDescription],
    pub active_mgr_id: &'a str,
    pub standby_mgr_count: usize,
    pub ok_to_stop_attempts: u32,
    pub ok_to_stop_interval: Duration,
}

/// Summary of one tick, for logging/tests.
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    pub hosts_checked: usize,
    pub hosts_failed: Vec<String>,
    pub refreshed: bool,
    pub stray_hosts: Vec<String>,
    pub stray_daemons: Vec<String>,
    pub upgrade_outcome: Option<StepOutcome>,
}

/// Run one serve-loop iteration (§4.I steps 1-4).
///
/// # Errors
/// Returns `CephadmError` only for failures outside the per-host
/// tolerant paths (steps 1-3 degrade to health checks instead of
/// propagating); step 4 propagates upgrade-step errors directly.
pub async fn tick(
    ctx: &mut TickContext<'_>,
    upgrade_state: &mut Option<UpgradeState>,
) -> Result<TickReport, CephadmError> {
    let mut report = TickReport::default();

    // 1. host health check
    let mut failed = Vec::new();
    for host in ctx.hosts {
        report.hosts_checked += 1;
        let Some(executor) = ctx.executors.get(&host.name) else {
            failed.push(host.name.clone());
            continue;
        };
        let cmd = RemoteCommand::new("check-host").error_ok();
        match executor.run(cmd).await {
            Ok(result) if result.success() => {}
            _ => failed.push(host.name.clone()),
        }
    }
    if failed.is_empty() {
        ctx.health.clear(ids::HOST_CHECK_FAILED);
    } else {
        ctx.health.raise(
            ids::HOST_CHECK_FAILED,
            HealthAlert::warning("failed to probe one or more hosts", failed.clone()),
        );
    }
    report.hosts_failed = failed;

    // 2. refresh daemons (maybe_refresh=true: only outdated entries)
    let outdated = ctx.daemon_cache.outdated(ctx.daemon_cache_timeout);
    let mut refresh_failed = Vec::new();
    for hostname in &outdated {
        let Some(executor) = ctx.executors.get(hostname) else {
            refresh_failed.push(hostname.clone());
            continue;
        };
        let cmd = RemoteCommand::new("ls").error_ok();
        match executor.run(cmd).await {
            Ok(result) if result.success() => {
                ctx.daemon_cache.set(hostname.clone(), Vec::new());
            }
            _ => refresh_failed.push(hostname.clone()),
        }
    }
    if refresh_failed.is_empty() {
        ctx.health.clear(ids::REFRESH_FAILED);
        report.refreshed = true;
    } else {
        ctx.health.raise(
            ids::REFRESH_FAILED,
            HealthAlert::warning("failed to refresh daemons on one or more hosts", refresh_failed),
        );
        return Ok(report);
    }

    // 3. stray detection
    let known_hosts: HashSet<&str> = ctx.hosts.iter().map(|h| h.name.as_str()).collect();
    let stray_hosts: Vec<String> = ctx
        .cluster_reported_hosts
        .iter()
        .filter(|h| !known_hosts.contains(h.as_str()))
        .cloned()
        .collect();
    if stray_hosts.is_empty() {
        ctx.health.clear(ids::STRAY_HOST);
    } else {
        ctx.health.raise(
            ids::STRAY_HOST,
            HealthAlert::warning(format!("{} stray host(s) reported by the cluster", stray_hosts.len()), stray_hosts.clone()),
        );
    }
    report.stray_hosts = stray_hosts;

    let known_daemons: HashSet<String> = ctx
        .daemon_cache
        .items_filtered(None)
        .values()
        .flat_map(|entry| entry.data.iter())
        .map(DaemonDescription::name)
        .collect();
    let stray_daemons: Vec<String> = ctx
        .cluster_reported_daemons
        .iter()
        .map(DaemonDescription::name)
        .filter(|name| !known_daemons.contains(name))
        .collect();
    if stray_daemons.is_empty() {
        ctx.health.clear(ids::STRAY_DAEMON);
    } else {
        ctx.health.raise(
            ids::STRAY_DAEMON,
            HealthAlert::warning(format!("{} stray daemon(s) reported by the cluster", stray_daemons.len()), stray_daemons.clone()),
        );
    }
    report.stray_daemons = stray_daemons;

    // 4. upgrade step
    if let Some(state) = upgrade_state
        && !state.paused
    {
        let all_daemons: Vec<DaemonDescription> = ctx
            .daemon_cache
            .items_filtered(None)
            .into_values()
            .flat_map(|entry| entry.data)
            .collect();
        let step_ctx = StepContext {
            daemons: &all_daemons,
            active_mgr_id: ctx.active_mgr_id,
            standby_mgr_count: ctx.standby_mgr_count,
            executors: ctx.executors,
            config_store: ctx.config_store,
            fsid: ctx.fsid,
            health: ctx.health,
            ok_to_stop_attempts: ctx.ok_to_stop_attempts,
            ok_to_stop_interval: ctx.ok_to_stop_interval,
        };
        let outcome = upgrade::step(upgrade_state, &step_ctx).await?;
        report.upgrade_outcome = Some(outcome);
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn wake_gate_kick_interrupts_sleep_before_interval() {
        let gate = WakeGate::new();
        let start = tokio::time::Instant::now();
        let kicker = async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            gate.kick();
        };
        let waiter = gate.wait(Duration::from_secs(600));
        tokio::join!(kicker, waiter);
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
