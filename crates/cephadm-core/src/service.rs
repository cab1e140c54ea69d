//! Service reconciler (§4.G): turns a `ServiceSpec` into a concrete set of
//! daemon creations/removals against the currently observed fleet.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use cephadm_exec::RemoteExecutor;
use cephadm_inventory::{DaemonDescription, Host, ServiceSpec};

use crate::configstore::ConfigStore;
use crate::daemon::{self, CreateOptions, DaemonAction};
use crate::error::CephadmError;
use crate::placement::{Scheduler, resolve_placement};
use crate::policy::DaemonType;

/// Per-host executors, keyed by hostname, as owned by the engine's
/// connection table.
pub type ExecutorTable = HashMap<String, Arc<dyn RemoteExecutor>>;

/// Outcome of one `apply` call, reported back to the command surface
#[derive(Debug, Clone, Default)]
pub struct ApplyReport {
    pub deployed: Vec<String>,
    pub removed: Vec<String>,
    pub unchanged: bool,
}

/// Reconcile one service spec against the observed fleet.
///
/// `current` must already be filtered to daemons of `spec.service_type`
/// whose id carries the service's name prefix; `connected` names the
/// daemons known to currently hold a live connection (used to prefer
/// disconnected victims on scale-down, e.g. managers).
///
/// # Errors
/// Returns `CephadmError::UnsupportedOperationError` for monitor
/// downscale, `CephadmError::PlacementError` if growth cannot be
/// satisfied by the candidate pool, or whatever the underlying
/// create/remove calls return.
pub async fn apply(
    spec: &ServiceSpec,
    all_hosts: &[Host],
    current: &[DaemonDescription],
    connected: &HashSet<String>,
    executors: &ExecutorTable,
    config_store: &dyn ConfigStore,
    fsid: &str,
    scheduler: &dyn Scheduler,
) -> Result<ApplyReport, CephadmError> {
    spec.validate().map_err(CephadmError::ValidationError)?;
    let daemon_type = DaemonType::parse(&spec.service_type)
        .ok_or_else(|| CephadmError::ValidationError(format!("unknown service type {}", spec.service_type)))?;

    let placement = resolve_placement(spec, all_hosts, scheduler)?;
    let target_count = placement.len();
    let delta = target_count as i64 - current.len() as i64;

    if delta == 0 {
        return Ok(ApplyReport {
            unchanged: true,
            ..Default::default()
        });
    }

    if delta > 0 {
        if daemon_type.policy().network_required {
            for p in &placement {
                if p.network.is_none() {
                    return Err(CephadmError::ValidationError(format!(
                        "placement for {} on {} is missing a required network",
                        spec.service_type, p.hostname
                    )));
                }
            }
        }

        let occupied: HashSet<&str> = current.iter().map(|d| d.hostname.as_str()).collect();
        let available: Vec<_> = placement
            .iter()
            .filter(|p| !occupied.contains(p.hostname.as_str()))
            .collect();

        #[allow(clippy::cast_sign_loss)]
        let need = delta as usize;
        if available.len() < need {
            return Err(CephadmError::PlacementError(format!(
                "service {} needs {need} more hosts but only {} are free",
                spec.service_type,
                available.len()
            )));
        }

        let existing_names: Vec<String> = current.iter().map(DaemonDescription::name).collect();
        let prefix = (spec.service_name != spec.service_type).then_some(spec.service_name.as_str());
        let mut deployed = Vec::with_capacity(need);

        for target in available.into_iter().take(need) {
            let executor = executors
                .get(&target.hostname)
                .ok_or_else(|| CephadmError::NotFoundError(format!("no connection for host {}", target.hostname)))?;

            let short_host = cephadm_inventory::validate::short_hostname(&target.hostname);
            let id = daemon::generate_unique_name(
                daemon_type,
                short_host,
                prefix,
                target.name.as_deref(),
                &existing_names,
            )?;

            let daemon = daemon::create(
                daemon_type,
                &id,
                &target.hostname,
                executor.as_ref(),
                config_store,
                fsid,
                CreateOptions::default(),
            )
            .await?;
            deployed.push(daemon.name());
        }

        return Ok(ApplyReport {
            deployed,
            ..Default::default()
        });
    }

    if daemon_type == DaemonType::Mon {
        return Err(CephadmError::UnsupportedOperationError(
            "monitor downscale is not supported".to_string(),
        ));
    }

    #[allow(clippy::cast_sign_loss)]
    let excess = (-delta) as usize;
    let victims = choose_scale_down_victims(current, connected, excess);

    let mut removed = Vec::with_capacity(victims.len());
    for victim in &victims {
        let executor = executors
            .get(&victim.hostname)
            .ok_or_else(|| CephadmError::NotFoundError(format!("no connection for host {}", victim.hostname)))?;
        daemon::remove(&victim.name(), executor.as_ref(), fsid, false).await?;
        removed.push(victim.name());
    }

    Ok(ApplyReport {
        removed,
        ..Default::default()
    })
}

/// Pick `count` daemons to remove, preferring ones absent from
/// `connected` (disconnected managers first), falling back to arbitrary
/// order, deduplicated by name (§9 open-question resolution).
fn choose_scale_down_victims(
    current: &[DaemonDescription],
    connected: &HashSet<String>,
    count: usize,
) -> Vec<DaemonDescription> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut ordered: Vec<&DaemonDescription> = current
        .iter()
        .filter(|d| !connected.contains(&d.name()))
        .collect();
    ordered.extend(current.iter().filter(|d| connected.contains(&d.name())));

    let mut victims = Vec::with_capacity(count);
    for d in ordered {
        if victims.len() >= count {
            break;
        }
        if seen.insert(d.name()) {
            victims.push(d.clone());
        }
    }
    victims
}

/// Fan out a lifecycle action over every daemon matching `(daemon_type,
/// service_name)`.
///
/// # Errors
/// Returns the first per-daemon error encountered; daemons already acted
/// on before the failure are not rolled back.
pub async fn service_action(
    action: DaemonAction,
    matching: &[DaemonDescription],
    executors: &ExecutorTable,
    config_store: &dyn ConfigStore,
    fsid: &str,
) -> Result<(), CephadmError> {
    for d in matching {
        let daemon_type = DaemonType::parse(&d.daemon_type)
            .ok_or_else(|| CephadmError::ValidationError(format!("unknown daemon type {}", d.daemon_type)))?;
        let executor = executors
            .get(&d.hostname)
            .ok_or_else(|| CephadmError::NotFoundError(format!("no connection for host {}", d.hostname)))?;

        daemon::action(
            daemon_type,
            &d.daemon_id,
            &d.hostname,
            executor.as_ref(),
            config_store,
            fsid,
            action,
            CreateOptions::default(),
        )
        .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn daemon(daemon_type: &str, id: &str, host: &str) -> DaemonDescription {
        DaemonDescription::new(daemon_type, id, host)
    }

    #[test]
    fn scale_down_prefers_disconnected_victims() {
        let current = vec![
            daemon("mgr", "h1", "h1"),
            daemon("mgr", "h2", "h2"),
            daemon("mgr", "h3", "h3"),
            daemon("mgr", "h4", "h4"),
        ];
        let mut connected = HashSet::new();
        connected.insert("mgr.h1".to_string());
        connected.insert("mgr.h2".to_string());
        connected.insert("mgr.h3".to_string());

        let victims = choose_scale_down_victims(&current, &connected, 2);
        let names: Vec<String> = victims.iter().map(DaemonDescription::name).collect();
        assert!(names.contains(&"mgr.h4".to_string()));
        assert_eq!(names.len(), 2);
    }

    #[test]
    fn scale_down_never_duplicates_a_victim() {
        let current = vec![daemon("mgr", "h1", "h1"), daemon("mgr", "h2", "h2")];
        let connected = HashSet::new();
        let victims = choose_scale_down_victims(&current, &connected, 5);
        assert_eq!(victims.len(), 2);
    }
}
