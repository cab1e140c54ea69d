//! Upgrade state machine (§4.H): one pass per serve tick, restart-safe
//! because only small derived facts are persisted and the rest is
//! re-derived every tick, grounded in `_do_upgrade`/`upgrade_start` of the
//! original `module.py`.

use std::collections::HashMap;
use std::time::Duration;

use cephadm_inventory::DaemonDescription;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::configstore::ConfigStore;
use crate::daemon::{self, CreateOptions, DaemonAction};
use crate::error::CephadmError;
use crate::healthcheck::{HealthAlert, HealthCheckSink, ids};
use crate::policy::{DaemonType, UPGRADE_ORDER};
use crate::service::ExecutorTable;

/// Persisted upgrade state (§3). Absent (`None` at the call site) means no
/// upgrade in progress.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpgradeState {
    pub target_name: String,
    pub target_id: Option<String>,
    pub target_version: Option<String>,
    pub image_id: Option<String>,
    pub error: Option<String>,
    pub paused: bool,
}

/// Begin (or describe) an upgrade. Mirrors `upgrade_start`: resuming a
/// paused upgrade to the same target clears `paused`; starting a different
/// target while one is in flight is rejected.
///
/// # Errors
/// Returns `CephadmError::ValidationError` if neither `image` nor
/// `version` is given, or if a different upgrade is already in progress.
pub fn start(
    state: &mut Option<UpgradeState>,
    image: Option<&str>,
    version: Option<&str>,
    container_image_base: &str,
) -> Result<String, CephadmError> {
    let target_name = match (image, version) {
        (_, Some(v)) => format!("{container_image_base}:v{v}"),
        (Some(i), None) => i.to_string(),
        (None, None) => {
            return Err(CephadmError::ValidationError(
                "upgrade start requires either an image or a version".to_string(),
            ));
        }
    };

    if let Some(existing) = state {
        if existing.target_name != target_name {
            return Err(CephadmError::ValidationError(format!(
                "upgrade to {} (not {target_name}) already in progress",
                existing.target_name
            )));
        }
        if existing.paused {
            existing.paused = false;
            return Ok(format!("resumed upgrade to {target_name}"));
        }
        return Ok(format!("upgrade to {target_name} in progress"));
    }

    *state = Some(UpgradeState {
        target_name: target_name.clone(),
        ..Default::default()
    });
    Ok(format!("initiating upgrade to {target_name}"))
}

/// Pause an in-progress upgrade.
///
/// # Errors
/// Returns `CephadmError::NotFoundError` if no upgrade is in progress.
pub fn pause(state: &mut Option<UpgradeState>) -> Result<String, CephadmError> {
    let s = state
        .as_mut()
        .ok_or_else(|| CephadmError::NotFoundError("no upgrade in progress".to_string()))?;
    if s.paused {
        return Ok(format!("upgrade to {} already paused", s.target_name));
    }
    s.paused = true;
    Ok(format!("paused upgrade to {}", s.target_name))
}

/// Resume a paused upgrade.
///
/// # Errors
/// Returns `CephadmError::NotFoundError` if no upgrade is in progress.
pub fn resume(state: &mut Option<UpgradeState>) -> Result<String, CephadmError> {
    let s = state
        .as_mut()
        .ok_or_else(|| CephadmError::NotFoundError("no upgrade in progress".to_string()))?;
    if !s.paused {
        return Ok(format!("upgrade to {} not paused", s.target_name));
    }
    s.paused = false;
    Ok(format!("resumed upgrade to {}", s.target_name))
}

/// Drop upgrade state entirely.
#[must_use]
pub fn stop(state: &mut Option<UpgradeState>) -> String {
    match state.take() {
        Some(s) => format!("stopped upgrade to {}", s.target_name),
        None => "no upgrade in progress".to_string(),
    }
}

/// What one `step` pass accomplished, for logging/tests; the serve loop
/// does not otherwise branch on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// No upgrade is active.
    Idle,
    /// Upgrade is paused; nothing was done.
    Paused,
    /// Waiting on a cache, an ok-to-stop gate, or a retry; re-enter next tick.
    Waiting,
    /// One daemon was redeployed with the target image.
    Redeployed(String),
    /// The active manager requested its own fail-over.
    ManagerFailover,
    /// All daemon types are at the target image; upgrade state was cleared.
    Completed,
}

/// Context the step algorithm needs beyond the mutable `UpgradeState`
/// itself; gathered by the engine from its caches and connection table.
pub struct StepContext<'a> {
    pub daemons: &'a [DaemonDescription],
    pub active_mgr_id: &'a str,
    pub standby_mgr_count: usize,
    pub executors: &'a ExecutorTable,
    pub config_store: &'a dyn ConfigStore,
    pub fsid: &'a str,
    pub health: &'a dyn HealthCheckSink,
    pub ok_to_stop_attempts: u32,
    pub ok_to_stop_interval: Duration,
}

/// Execute one pass of the state machine.
///
/// # Errors
/// Propagates `CephadmError` from the config store or remote executor;
/// most failure modes instead pause the upgrade and raise a health check
/// rather than returning `Err`.
pub async fn step(state: &mut Option<UpgradeState>, ctx: &StepContext<'_>) -> Result<StepOutcome, CephadmError> {
    let Some(s) = state.as_mut() else {
        return Ok(StepOutcome::Idle);
    };
    if s.paused {
        return Ok(StepOutcome::Paused);
    }

    if s.target_id.is_none() {
        match pull_image(&s.target_name, ctx).await {
            Ok((id, version)) => {
                s.target_id = Some(id);
                s.target_version = version;
            }
            Err(e) => {
                fail(s, ctx.health, ids::UPGRADE_FAILED_PULL, "failed to pull target image", vec![e.to_string()]);
                return Ok(StepOutcome::Waiting);
            }
        }
    }
    let target_id = s.target_id.clone().expect("checked above");
    let target_name = s.target_name.clone();

    for daemon_type in UPGRADE_ORDER {
        let mut need_upgrade_self = false;

        for d in ctx.daemons.iter().filter(|d| d.daemon_type == daemon_type.as_str()) {
            let Some(current_id) = &d.image_id else {
                return Ok(StepOutcome::Waiting);
            };
            if *current_id == target_id {
                continue;
            }

            if daemon_type == DaemonType::Mgr && d.daemon_id == ctx.active_mgr_id {
                need_upgrade_self = true;
                continue;
            }

            let executor = ctx
                .executors
                .get(&d.hostname)
                .ok_or_else(|| CephadmError::NotFoundError(format!("no connection for host {}", d.hostname)))?;

            let observed_id = inspect_image(executor.as_ref(), &target_name).await;
            let needs_pull = match observed_id {
                Ok(ref id) if *id == target_id => false,
                _ => true,
            };

            if needs_pull {
                match pull_image_on(executor.as_ref(), &target_name).await {
                    Ok((pulled_id, _)) if pulled_id == target_id => {}
                    Ok((pulled_id, _)) => {
                        s.target_id = Some(pulled_id);
                        return Ok(StepOutcome::Waiting);
                    }
                    Err(e) => {
                        fail(
                            s,
                            ctx.health,
                            ids::UPGRADE_FAILED_PULL,
                            "failed to pull target image",
                            vec![format!("failed to pull {target_name} on host {}: {e}", d.hostname)],
                        );
                        return Ok(StepOutcome::Waiting);
                    }
                }
            }

            if daemon_type.policy().ok_to_stop_gate && !wait_for_ok_to_stop(d, ctx).await? {
                return Ok(StepOutcome::Waiting);
            }

            ctx.config_store
                .mon_command(
                    "config set",
                    &[("name", "container_image"), ("value", target_name.as_str()), ("who", format!("{}.{}", daemon_type.as_str(), d.daemon_id).as_str())],
                )
                .await?;

            daemon::action(
                daemon_type,
                &d.daemon_id,
                &d.hostname,
                executor.as_ref(),
                ctx.config_store,
                ctx.fsid,
                DaemonAction::Redeploy,
                CreateOptions::default(),
            )
            .await?;

            return Ok(StepOutcome::Redeployed(format!("{}.{}", daemon_type.as_str(), d.daemon_id)));
        }

        if need_upgrade_self {
            if ctx.standby_mgr_count == 0 {
                fail(
                    s,
                    ctx.health,
                    ids::UPGRADE_NO_STANDBY_MGR,
                    "need standby mgr daemon",
                    vec![
                        "the upgrade process needs to upgrade the mgr, but needs at least one standby to proceed"
                            .to_string(),
                    ],
                );
                return Ok(StepOutcome::Waiting);
            }
            ctx.config_store
                .mon_command("mgr fail", &[("who", ctx.active_mgr_id)])
                .await?;
            return Ok(StepOutcome::ManagerFailover);
        } else if daemon_type == DaemonType::Mgr {
            ctx.health.clear(ids::UPGRADE_NO_STANDBY_MGR);
        }

        ctx.config_store
            .mon_command(
                "config set",
                &[("name", "container_image"), ("value", target_name.as_str()), ("who", daemon_type.as_str())],
            )
            .await?;
    }

    ctx.config_store
        .mon_command("config set", &[("name", "container_image"), ("value", target_name.as_str()), ("who", "global")])
        .await?;
    ctx.health.clear(ids::UPGRADE_FAILED_PULL);
    *state = None;
    Ok(StepOutcome::Completed)
}

fn fail(state: &mut UpgradeState, health: &dyn HealthCheckSink, id: &str, summary: &str, detail: Vec<String>) {
    state.error = Some(format!("{id}: {summary}"));
    state.paused = true;
    health.raise(id, HealthAlert::warning(format!("upgrade: {summary}"), detail));
}

async fn pull_image(image_name: &str, ctx: &StepContext<'_>) -> Result<(String, Option<String>), CephadmError> {
    let executor = ctx
        .executors
        .values()
        .next()
        .ok_or_else(|| CephadmError::PlacementError("no hosts defined".to_string()))?;
    pull_image_on(executor.as_ref(), image_name).await
}

async fn pull_image_on(
    executor: &dyn cephadm_exec::RemoteExecutor,
    image_name: &str,
) -> Result<(String, Option<String>), CephadmError> {
    run_image_command(executor, "pull", image_name).await
}

async fn inspect_image(executor: &dyn cephadm_exec::RemoteExecutor, image_name: &str) -> Result<String, CephadmError> {
    let (id, _) = run_image_command(executor, "inspect-image", image_name).await?;
    Ok(id)
}

/// Run `pull`/`inspect-image` against an image name, returning the
/// reported `(image_id, ceph_version)`.
async fn run_image_command(
    executor: &dyn cephadm_exec::RemoteExecutor,
    command: &str,
    image_name: &str,
) -> Result<(String, Option<String>), CephadmError> {
    let mut cmd = cephadm_exec::RemoteCommand::new(command)
        .with_image(image_name)
        .error_ok();
    cmd.no_fsid = true;

    let result = executor.run(cmd).await.map_err(CephadmError::from)?;
    if !result.success() {
        return Err(CephadmError::HelperExitError {
            status: result.status,
            stderr: result.stderr,
        });
    }

    let parsed: Value = serde_json::from_str(&result.stdout)
        .map_err(|e| CephadmError::RemoteExecutionError(format!("malformed image inspection output: {e}")))?;
    let image_id = parsed
        .get("image_id")
        .and_then(Value::as_str)
        .ok_or_else(|| CephadmError::RemoteExecutionError("image inspection response missing image_id".to_string()))?
        .to_string();
    let version = parsed
        .get("ceph_version")
        .and_then(Value::as_str)
        .map(std::string::ToString::to_string);
    Ok((image_id, version))
}

async fn wait_for_ok_to_stop(d: &DaemonDescription, ctx: &StepContext<'_>) -> Result<bool, CephadmError> {
    let mut tries = ctx.ok_to_stop_attempts;
    loop {
        if tries == 0 {
            return Ok(true);
        }
        let out = ctx
            .config_store
            .mon_command(format!("{} ok-to-stop", d.daemon_type).as_str(), &[("ids", d.daemon_id.as_str())])
            .await;
        match out {
            Ok(_) => return Ok(true),
            Err(_) if tries > 1 => {
                tokio::time::sleep(ctx.ok_to_stop_interval).await;
                tries -= 1;
            }
            Err(_) => return Ok(true),
        }
    }
}

/// Snapshot the per-section `container_image` overrides from a `config
/// dump`-shaped JSON blob, keyed by section (`mon`, `mon.a`, `global`, ...).
#[must_use]
pub fn parse_image_settings(config_dump_json: &str) -> HashMap<String, String> {
    let mut settings = HashMap::new();
    let Ok(Value::Array(opts)) = serde_json::from_str(config_dump_json) else {
        return settings;
    };
    for opt in opts {
        if opt.get("name").and_then(Value::as_str) == Some("container_image")
            && let (Some(section), Some(value)) = (
                opt.get("section").and_then(Value::as_str),
                opt.get("value").and_then(Value::as_str),
            )
        {
            settings.insert(section.to_string(), value.to_string());
        }
    }
    settings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_with_neither_image_nor_version_errors() {
        let mut state = None;
        assert!(start(&mut state, None, None, "quay.io/ceph/ceph").is_err());
    }

    #[test]
    fn start_then_start_different_target_errors() {
        let mut state = None;
        start(&mut state, Some("quay.io/ceph/ceph:v18"), None, "quay.io/ceph/ceph").unwrap();
        let result = start(&mut state, Some("quay.io/ceph/ceph:v19"), None, "quay.io/ceph/ceph");
        assert!(result.is_err());
    }

    #[test]
    fn pause_then_resume_clears_paused_flag() {
        let mut state = Some(UpgradeState {
            target_name: "quay.io/ceph/ceph:v18".to_string(),
            ..Default::default()
        });
        pause(&mut state).unwrap();
        assert!(state.as_ref().unwrap().paused);
        resume(&mut state).unwrap();
        assert!(!state.as_ref().unwrap().paused);
    }

    #[test]
    fn stop_drops_state() {
        let mut state = Some(UpgradeState {
            target_name: "quay.io/ceph/ceph:v18".to_string(),
            ..Default::default()
        });
        stop(&mut state);
        assert!(state.is_none());
    }

    #[test]
    fn pause_without_upgrade_errors() {
        let mut state: Option<UpgradeState> = None;
        assert!(pause(&mut state).is_err());
    }

    #[test]
    fn parse_image_settings_picks_container_image_rows_only() {
        let dump = r#"[
            {"name": "container_image", "section": "global", "value": "quay.io/ceph/ceph:v17"},
            {"name": "container_image", "section": "mon", "value": "quay.io/ceph/ceph:v17"},
            {"name": "other_option", "section": "global", "value": "foo"}
        ]"#;
        let settings = parse_image_settings(dump);
        assert_eq!(settings.get("global"), Some(&"quay.io/ceph/ceph:v17".to_string()));
        assert_eq!(settings.get("mon"), Some(&"quay.io/ceph/ceph:v17".to_string()));
        assert_eq!(settings.len(), 2);
    }
}
