//! Daemon lifecycle for one daemon on one host (§4.F), plus the unique
//! daemon-name generator grounded in the original `get_unique_name`.

use cephadm_exec::{RemoteCommand, RemoteExecutor, StdinPayload};
use cephadm_inventory::{DaemonDescription, DaemonStatus};
use rand::Rng;

use crate::configstore::ConfigStore;
use crate::error::CephadmError;
use crate::policy::{DaemonType, entity_name};

const NAME_SUFFIX_LEN: usize = 6;
const MAX_NAME_ATTEMPTS: usize = 32;

/// Lowercase 6-character random tag used for auto-generated daemon ids
fn random_suffix() -> String {
    let mut rng = rand::rng();
    (0..NAME_SUFFIX_LEN)
        .map(|_| (b'a' + rng.random_range(0..26u8)) as char)
        .collect()
}

/// Generate `[prefix.]short-host.<6-lowercase-letters>`, retrying on
/// collision with `existing_names`.
///
/// # Errors
/// Returns `CephadmError::NameCollisionError` if a caller-forced name is
/// already present in `existing_names`, or if no free name was found after
/// a bounded number of attempts (a pathological collision rate).
pub fn generate_unique_name(
    daemon_type: DaemonType,
    short_host: &str,
    prefix: Option<&str>,
    forced_id: Option<&str>,
    existing_names: &[String],
) -> Result<String, CephadmError> {
    if let Some(forced) = forced_id {
        let full = format!("{}.{forced}", daemon_type.as_str());
        if existing_names.iter().any(|n| n == &full) {
            return Err(CephadmError::NameCollisionError(full));
        }
        return Ok(forced.to_string());
    }

    for _ in 0..MAX_NAME_ATTEMPTS {
        let id = match prefix {
            Some(p) => format!("{p}.{short_host}.{}", random_suffix()),
            None => format!("{short_host}.{}", random_suffix()),
        };
        let full = format!("{}.{id}", daemon_type.as_str());
        if !existing_names.iter().any(|n| n == &full) {
            return Ok(id);
        }
    }

    Err(CephadmError::NameCollisionError(format!(
        "exhausted {MAX_NAME_ATTEMPTS} attempts generating a unique name on {short_host}"
    )))
}

/// Extra inputs to `create` beyond (type, id, host)
#[derive(Debug, Clone, Default)]
pub struct CreateOptions {
    /// Caller-supplied keyring; when absent one is fetched via `auth get`
    pub keyring: Option<String>,
    /// Extra lines appended to the minimal cluster config
    pub extra_config: Option<String>,
    /// Extra arguments appended to the remote `deploy` invocation
    pub extra_args: Vec<String>,
    /// Reconfigure an existing daemon instead of a fresh deploy
    pub reconfig: bool,
    /// OSD fsid fetched from the cluster osd-map, storage daemons only
    pub osd_fsid: Option<String>,
}

/// Deploy (or reconfigure) one daemon instance on one host.
///
/// # Errors
/// Propagates `CephadmError` from the config store, the remote executor,
/// or the helper's own non-zero exit.
pub async fn create(
    daemon_type: DaemonType,
    daemon_id: &str,
    hostname: &str,
    executor: &dyn RemoteExecutor,
    config_store: &dyn ConfigStore,
    fsid: &str,
    opts: CreateOptions,
) -> Result<DaemonDescription, CephadmError> {
    let entity = entity_name(daemon_type, daemon_id);

    let config = build_config_payload(daemon_type, &entity, config_store, opts.extra_config.as_deref()).await?;
    let keyring = resolve_keyring(daemon_type, daemon_id, opts.keyring, config_store).await?;
    let crash_keyring = if daemon_type.policy().needs_crash_keyring {
        Some(fetch_crash_keyring(hostname, config_store).await?)
    } else {
        None
    };

    let mut args = vec!["--name".to_string(), format!("{}.{daemon_id}", daemon_type.as_str())];
    if opts.reconfig {
        args.push("--reconfig".to_string());
    }
    if let Some(osd_fsid) = &opts.osd_fsid {
        args.push("--osd-fsid".to_string());
        args.push(osd_fsid.clone());
    }
    args.extend(opts.extra_args);

    let stdin = StdinPayload {
        config: Some(config),
        keyring: Some(keyring),
        crash_keyring,
    };

    let cmd = RemoteCommand::new("deploy")
        .with_fsid(fsid)
        .with_args(args)
        .with_stdin(stdin);

    let result = executor.run(cmd).await.map_err(CephadmError::from)?;
    if !result.success() {
        return Err(CephadmError::HelperExitError {
            status: result.status,
            stderr: result.stderr,
        });
    }

    let mut daemon = DaemonDescription::new(daemon_type.as_str(), daemon_id, hostname);
    daemon.fsid = Some(fsid.to_string());
    daemon.style = Some("cephadm:v1".to_string());
    daemon.status = DaemonStatus::Running;
    // Primed, then deliberately left unrefreshed so the next cache refresh
    // reconciles against observed reality (§4.F step 5).
    daemon.last_refresh = None;

    Ok(daemon)
}

async fn build_config_payload(
    daemon_type: DaemonType,
    entity: &str,
    config_store: &dyn ConfigStore,
    extra_config: Option<&str>,
) -> Result<String, CephadmError> {
    if is_scrape_daemon(daemon_type) {
        return Ok(generate_scrape_config(entity));
    }

    let mut config = config_store
        .mon_command("config generate-minimal-conf", &[])
        .await?;
    if let Some(extra) = extra_config {
        config.push('\n');
        config.push_str(extra);
    }
    Ok(config)
}

fn is_scrape_daemon(daemon_type: DaemonType) -> bool {
    matches!(
        daemon_type,
        DaemonType::Prometheus | DaemonType::NodeExporter | DaemonType::Alertmanager
    )
}

fn generate_scrape_config(entity: &str) -> String {
    format!("# scrape config for {entity}\nglobal:\n  scrape_interval: 15s\n")
}

async fn resolve_keyring(
    daemon_type: DaemonType,
    daemon_id: &str,
    supplied: Option<String>,
    config_store: &dyn ConfigStore,
) -> Result<String, CephadmError> {
    if let Some(keyring) = supplied {
        return Ok(keyring);
    }

    let entity = if daemon_type == DaemonType::Mon {
        "mon.".to_string()
    } else {
        format!("{}.{daemon_id}", daemon_type.as_str())
    };

    config_store
        .mon_command("auth get", &[("entity", entity.as_str())])
        .await
}

async fn fetch_crash_keyring(hostname: &str, config_store: &dyn ConfigStore) -> Result<String, CephadmError> {
    let entity = format!("client.crash.{hostname}");
    config_store
        .mon_command("auth get-or-create", &[("entity", entity.as_str())])
        .await
}

/// Remove one daemon instance from one host.
///
/// # Errors
/// Propagates the remote executor's error, or the helper's non-zero exit
/// when `force` was not requested.
pub async fn remove(
    name: &str,
    executor: &dyn RemoteExecutor,
    fsid: &str,
    force: bool,
) -> Result<(), CephadmError> {
    let mut args = vec!["--name".to_string(), name.to_string()];
    if force {
        args.push("--force".to_string());
    }

    let cmd = RemoteCommand::new("rm-daemon").with_fsid(fsid).with_args(args);
    let result = executor.run(cmd).await.map_err(CephadmError::from)?;
    if !result.success() {
        return Err(CephadmError::HelperExitError {
            status: result.status,
            stderr: result.stderr,
        });
    }
    Ok(())
}

/// Lifecycle action on an already-deployed daemon
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonAction {
    Start,
    Stop,
    Restart,
    Redeploy,
    Reconfig,
}

impl DaemonAction {
    /// Parse the wire string used by the service action endpoint, if recognized
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "start" => DaemonAction::Start,
            "stop" => DaemonAction::Stop,
            "restart" => DaemonAction::Restart,
            "redeploy" => DaemonAction::Redeploy,
            "reconfig" => DaemonAction::Reconfig,
            _ => return None,
        })
    }
}

/// Apply a lifecycle action to one daemon. `Redeploy`/`Reconfig` are
/// expressed in terms of [`create`]; the caller supplies the same
/// `CreateOptions` it would use for a fresh deploy.
///
/// # Errors
/// Propagates the remote executor's error, or the helper's non-zero exit.
pub async fn action(
    daemon_type: DaemonType,
    daemon_id: &str,
    hostname: &str,
    executor: &dyn RemoteExecutor,
    config_store: &dyn ConfigStore,
    fsid: &str,
    action: DaemonAction,
    create_opts: CreateOptions,
) -> Result<(), CephadmError> {
    let name = format!("{}.{daemon_id}", daemon_type.as_str());

    match action {
        DaemonAction::Redeploy => {
            let opts = CreateOptions {
                reconfig: false,
                ..create_opts
            };
            create(daemon_type, daemon_id, hostname, executor, config_store, fsid, opts).await?;
        }
        DaemonAction::Reconfig => {
            let opts = CreateOptions {
                reconfig: true,
                ..create_opts
            };
            create(daemon_type, daemon_id, hostname, executor, config_store, fsid, opts).await?;
        }
        DaemonAction::Start | DaemonAction::Restart => {
            run_unit_command(executor, fsid, &name, "reset-failed").await?;
            let verb = if action == DaemonAction::Start { "start" } else { "restart" };
            run_unit_command(executor, fsid, &name, verb).await?;
        }
        DaemonAction::Stop => {
            run_unit_command(executor, fsid, &name, "stop").await?;
        }
    }

    Ok(())
}

async fn run_unit_command(
    executor: &dyn RemoteExecutor,
    fsid: &str,
    name: &str,
    verb: &str,
) -> Result<(), CephadmError> {
    let cmd = RemoteCommand::new("unit")
        .with_fsid(fsid)
        .with_args(vec!["--name".to_string(), name.to_string(), verb.to_string()]);
    let result = executor.run(cmd).await.map_err(CephadmError::from)?;
    if !result.success() {
        return Err(CephadmError::HelperExitError {
            status: result.status,
            stderr: result.stderr,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_name_avoids_existing_names() {
        let existing = vec!["mon.host1.abcdef".to_string()];
        let name = generate_unique_name(DaemonType::Mon, "host1", None, None, &existing).unwrap();
        assert_ne!(format!("mon.{name}"), existing[0]);
        assert!(name.starts_with("host1."));
    }

    #[test]
    fn unique_name_with_prefix_embeds_it() {
        let name = generate_unique_name(DaemonType::Rgw, "host1", Some("myrgw"), None, &[]).unwrap();
        assert!(name.starts_with("myrgw.host1."));
    }

    #[test]
    fn forced_name_colliding_with_existing_errors() {
        let existing = vec!["mon.host1".to_string()];
        let result = generate_unique_name(DaemonType::Mon, "host1", None, Some("host1"), &existing);
        assert!(result.is_err());
    }

    #[test]
    fn forced_name_with_no_collision_is_accepted() {
        let result = generate_unique_name(DaemonType::Mon, "host1", None, Some("host1"), &[]);
        assert_eq!(result.unwrap(), "host1");
    }

    #[test]
    fn generated_suffix_is_six_lowercase_letters() {
        let name = generate_unique_name(DaemonType::Mgr, "host1", None, None, &[]).unwrap();
        let suffix = name.rsplit('.').next().unwrap();
        assert_eq!(suffix.len(), NAME_SUFFIX_LEN);
        assert!(suffix.chars().all(|c| c.is_ascii_lowercase()));
    }
}
