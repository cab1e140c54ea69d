//! `EngineActor`: the single actor behind the reconciliation engine.
//!
//! Owns the host registry, per-host connections, the daemon cache, the
//! upgrade state machine, and the background serve loop. Every HTTP handler
//! in the `cephadm` binary maps onto exactly one message here.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use kameo::actor::{ActorRef, WeakActorRef};
use kameo::error::ActorStopReason;
use kameo::message::{Context, Message};
use kameo::prelude::*;
use tokio::sync::broadcast;
use tracing::{info, warn};

use async_trait::async_trait;
use cephadm_api::events::WsEvent;
use cephadm_exec::RemoteExecutor;
use cephadm_inventory::{DaemonDescription, Host, OutdatableCache};

use crate::config::EngineConfig;
use crate::configstore::ConfigStore;
use crate::daemon;
use crate::error::CephadmError;
use crate::healthcheck::HealthCheckSink;
use crate::message::{
    AddHost, AddHostLabel, ApplyService, DaemonList, GetHealth, ListDaemons, ListHosts,
    RemoveDaemon, RemoveHost, RunTick, ServiceAction, UpgradePause, UpgradeResume, UpgradeStart,
    UpgradeStatus, UpgradeStatusReply, UpgradeStop,
};
use crate::placement::Scheduler;
use crate::service::{self, ExecutorTable};
use crate::serve::{self, TickContext, WakeGate};
use crate::upgrade::{self, UpgradeState};

/// Builds the per-host `RemoteExecutor` used when a host is registered.
///
/// Cephadm drives containers directly, so unlike a general host-fleet
/// factory there is no package manager to detect on top of the connection.
#[async_trait]
pub trait EngineHostFactory: Send + Sync {
    /// Create a remote executor for the given address.
    ///
    /// # Errors
    /// Returns `CephadmError::RemoteExecutionError` if the executor cannot
    /// be constructed (bad SSH key, unsupported address form, ...).
    async fn create_executor(
        &self,
        addr: &str,
        config: &EngineConfig,
    ) -> Result<Arc<dyn RemoteExecutor>, CephadmError>;
}

/// Factory that panics if invoked; placeholder for `EngineActorArgs::default`.
struct NoOpHostFactory;

#[async_trait]
impl EngineHostFactory for NoOpHostFactory {
    async fn create_executor(
        &self,
        _addr: &str,
        _config: &EngineConfig,
    ) -> Result<Arc<dyn RemoteExecutor>, CephadmError> {
        panic!("NoOpHostFactory should not be used in production")
    }
}

/// Arguments for spawning an `EngineActor`.
pub struct EngineActorArgs {
    pub config: EngineConfig,
    pub host_factory: Arc<dyn EngineHostFactory>,
    pub scheduler: Arc<dyn Scheduler>,
    pub config_store: Arc<dyn ConfigStore>,
    pub health: Arc<dyn HealthCheckSink>,
    pub event_channel_capacity: usize,
}

impl Default for EngineActorArgs {
    fn default() -> Self {
        Self {
            config: EngineConfig::default(),
            host_factory: Arc::new(NoOpHostFactory),
            scheduler: Arc::new(crate::placement::SimpleScheduler),
            config_store: Arc::new(crate::configstore::InMemoryConfigStore::new()),
            health: Arc::new(crate::healthcheck::InMemoryHealthChecks::new()),
            event_channel_capacity: 1024,
        }
    }
}

/// Reconciliation engine: one actor, one fleet.
pub struct EngineActor {
    hosts: HashMap<String, Host>,
    executors: ExecutorTable,
    daemon_cache: OutdatableCache<Vec<DaemonDescription>>,
    config_store: Arc<dyn ConfigStore>,
    health: Arc<dyn HealthCheckSink>,
    upgrade_state: Option<UpgradeState>,
    scheduler: Arc<dyn Scheduler>,
    host_factory: Arc<dyn EngineHostFactory>,
    config: EngineConfig,
    wake_gate: Arc<WakeGate>,
    /// Id of the manager daemon currently running this engine. Tracking who
    /// holds that role belongs to the out-of-scope manager host (§1); the
    /// engine only needs somewhere to read it from for the upgrade gate.
    active_mgr_id: String,
    standby_mgr_count: usize,
    event_tx: broadcast::Sender<WsEvent>,
}

impl EngineActor {
    /// Subscribe to fleet events (host/daemon/upgrade changes).
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<WsEvent> {
        self.event_tx.subscribe()
    }

    fn host_list(&self) -> Vec<Host> {
        self.hosts.values().cloned().collect()
    }

    fn all_daemons(&self) -> Vec<DaemonDescription> {
        self.daemon_cache
            .items_filtered(None)
            .into_values()
            .flat_map(|entry| entry.data)
            .collect()
    }
}

impl Actor for EngineActor {
    type Args = EngineActorArgs;
    type Error = CephadmError;

    async fn on_start(args: Self::Args, actor_ref: ActorRef<Self>) -> Result<Self, Self::Error> {
        let (event_tx, _) = broadcast::channel(args.event_channel_capacity);
        let wake_gate = Arc::new(WakeGate::new());
        let interval = args.config.serve_interval;

        info!(id = %actor_ref.id(), "EngineActor starting");

        let loop_gate = wake_gate.clone();
        let loop_ref = actor_ref.clone();
        tokio::spawn(async move {
            loop {
                loop_gate.wait(interval).await;
                if loop_ref.ask(RunTick).await.is_err() {
                    // Actor has stopped; let the task exit quietly.
                    break;
                }
            }
        });

        Ok(Self {
            hosts: HashMap::new(),
            executors: HashMap::new(),
            daemon_cache: OutdatableCache::new(),
            config_store: args.config_store,
            health: args.health,
            upgrade_state: None,
            scheduler: args.scheduler,
            host_factory: args.host_factory,
            config: args.config,
            wake_gate,
            active_mgr_id: String::new(),
            standby_mgr_count: 0,
            event_tx,
        })
    }

    async fn on_stop(
        &mut self,
        _actor_ref: WeakActorRef<Self>,
        reason: ActorStopReason,
    ) -> Result<(), Self::Error> {
        info!(reason = ?reason, "EngineActor stopping");
        Ok(())
    }
}

impl Message<AddHost> for EngineActor {
    type Reply = Result<(), CephadmError>;

    async fn handle(&mut self, msg: AddHost, _ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        cephadm_inventory::validate::validate_hostname(&msg.name)?;
        if self.hosts.contains_key(&msg.name) {
            return Err(CephadmError::ValidationError(format!(
                "host {} is already registered",
                msg.name
            )));
        }

        let mut host = Host::new(&msg.name);
        host.addr = msg.addr;
        host.labels = msg.labels.into_iter().collect();

        let executor = self
            .host_factory
            .create_executor(host.effective_addr(), &self.config)
            .await?;

        self.executors.insert(msg.name.clone(), executor);
        self.hosts.insert(msg.name.clone(), host);
        self.wake_gate.kick();
        let _ = self.event_tx.send(WsEvent::HostAdded { host: msg.name.clone() });
        info!(host = %msg.name, "host added");
        Ok(())
    }
}

impl Message<RemoveHost> for EngineActor {
    type Reply = Result<(), CephadmError>;

    async fn handle(&mut self, msg: RemoveHost, _ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        self.hosts
            .remove(&msg.name)
            .ok_or_else(|| CephadmError::NotFoundError(format!("host {} not found", msg.name)))?;
        self.executors.remove(&msg.name);
        self.daemon_cache.remove(&msg.name);
        let _ = self.event_tx.send(WsEvent::HostRemoved { host: msg.name.clone() });
        info!(host = %msg.name, "host removed");
        Ok(())
    }
}

impl Message<ListHosts> for EngineActor {
    type Reply = Vec<Host>;

    async fn handle(&mut self, _msg: ListHosts, _ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        self.host_list()
    }
}

impl Message<AddHostLabel> for EngineActor {
    type Reply = Result<(), CephadmError>;

    async fn handle(&mut self, msg: AddHostLabel, _ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        let host = self
            .hosts
            .get_mut(&msg.name)
            .ok_or_else(|| CephadmError::NotFoundError(format!("host {} not found", msg.name)))?;
        host.labels.insert(msg.label);
        Ok(())
    }
}

impl Message<ListDaemons> for EngineActor {
    type Reply = DaemonList;

    async fn handle(&mut self, msg: ListDaemons, _ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        cephadm_inventory::filter_daemons(self.all_daemons().iter(), &msg.filter)
            .into_iter()
            .cloned()
            .collect()
    }
}

impl Message<ApplyService> for EngineActor {
    type Reply = Result<service::ApplyReport, CephadmError>;

    async fn handle(&mut self, msg: ApplyService, _ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        let all_daemons = self.all_daemons();
        let current: Vec<DaemonDescription> = all_daemons
            .iter()
            .filter(|d| d.daemon_type == msg.spec.service_type)
            .filter(|d| d.daemon_id.starts_with(msg.spec.service_name.as_str()) || msg.spec.service_name == msg.spec.service_type)
            .cloned()
            .collect();
        let connected = self
            .executors
            .iter()
            .filter(|(_, e)| e.is_connected())
            .map(|(name, _)| name.clone())
            .collect();

        let hosts = self.host_list();
        let report = service::apply(
            &msg.spec,
            &hosts,
            &current,
            &connected,
            &self.executors,
            self.config_store.as_ref(),
            &self.config.fsid,
            self.scheduler.as_ref(),
        )
        .await?;

        for host in hosts {
            self.daemon_cache.invalidate(&host.name);
        }
        for name in &report.deployed {
            let _ = self.event_tx.send(WsEvent::DaemonDeployed { name: name.clone() });
        }
        for name in &report.removed {
            let _ = self.event_tx.send(WsEvent::DaemonRemoved { name: name.clone() });
        }
        self.wake_gate.kick();
        Ok(report)
    }
}

impl Message<ServiceAction> for EngineActor {
    type Reply = Result<(), CephadmError>;

    async fn handle(&mut self, msg: ServiceAction, _ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        let matching: Vec<DaemonDescription> = self
            .all_daemons()
            .into_iter()
            .filter(|d| d.daemon_type == msg.daemon_type)
            .filter(|d| d.daemon_id.starts_with(msg.service_name.as_str()) || msg.service_name == msg.daemon_type)
            .collect();

        service::service_action(
            msg.action,
            &matching,
            &self.executors,
            self.config_store.as_ref(),
            &self.config.fsid,
        )
        .await?;
        self.wake_gate.kick();
        Ok(())
    }
}

impl Message<RemoveDaemon> for EngineActor {
    type Reply = Result<(), CephadmError>;

    async fn handle(&mut self, msg: RemoveDaemon, _ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        let Some(daemon) = self.all_daemons().into_iter().find(|d| d.name() == msg.name) else {
            return Err(CephadmError::NotFoundError(format!("daemon {} not found", msg.name)));
        };
        let executor = self
            .executors
            .get(&daemon.hostname)
            .ok_or_else(|| CephadmError::NotFoundError(format!("no connection for host {}", daemon.hostname)))?;

        daemon::remove(&msg.name, executor.as_ref(), &self.config.fsid, msg.force).await?;
        self.daemon_cache.invalidate(&daemon.hostname);
        Ok(())
    }
}

impl Message<UpgradeStart> for EngineActor {
    type Reply = Result<String, CephadmError>;

    async fn handle(&mut self, msg: UpgradeStart, _ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        let result = upgrade::start(
            &mut self.upgrade_state,
            msg.image.as_deref(),
            msg.version.as_deref(),
            "quay.io/ceph/ceph",
        )?;
        self.wake_gate.kick();
        Ok(result)
    }
}

impl Message<UpgradeStatus> for EngineActor {
    type Reply = UpgradeStatusReply;

    async fn handle(&mut self, _msg: UpgradeStatus, _ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        self.upgrade_state.clone()
    }
}

impl Message<UpgradePause> for EngineActor {
    type Reply = Result<String, CephadmError>;

    async fn handle(&mut self, _msg: UpgradePause, _ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        upgrade::pause(&mut self.upgrade_state)
    }
}

impl Message<UpgradeResume> for EngineActor {
    type Reply = Result<String, CephadmError>;

    async fn handle(&mut self, _msg: UpgradeResume, _ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        let result = upgrade::resume(&mut self.upgrade_state)?;
        self.wake_gate.kick();
        Ok(result)
    }
}

impl Message<UpgradeStop> for EngineActor {
    type Reply = String;

    async fn handle(&mut self, _msg: UpgradeStop, _ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        upgrade::stop(&mut self.upgrade_state)
    }
}

impl Message<GetHealth> for EngineActor {
    type Reply = std::collections::HashMap<String, crate::healthcheck::HealthAlert>;

    async fn handle(&mut self, _msg: GetHealth, _ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        self.health.snapshot()
    }
}

impl Message<RunTick> for EngineActor {
    type Reply = Result<(), CephadmError>;

    async fn handle(&mut self, _msg: RunTick, _ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        let hosts = self.host_list();
        let known_hosts: Vec<String> = hosts.iter().map(|h| h.name.clone()).collect();
        let known_daemons = self.all_daemons();

        let mut tick_ctx = TickContext {
            hosts: &hosts,
            executors: &self.executors,
            daemon_cache: &mut self.daemon_cache,
            daemon_cache_timeout: self.config.daemon_cache_timeout,
            config_store: self.config_store.as_ref(),
            fsid: &self.config.fsid,
            health: self.health.as_ref(),
            cluster_reported_hosts: &known_hosts,
            cluster_reported_daemons: &known_daemons,
            active_mgr_id: &self.active_mgr_id,
            standby_mgr_count: self.standby_mgr_count,
            ok_to_stop_attempts: self.config.ok_to_stop_attempts,
            ok_to_stop_interval: self.config.ok_to_stop_interval,
        };

        let target_name = self.upgrade_state.as_ref().map(|s| s.target_name.clone());
        match serve::tick(&mut tick_ctx, &mut self.upgrade_state).await {
            Ok(report) => {
                if !report.hosts_failed.is_empty() {
                    warn!(hosts = ?report.hosts_failed, "host check failures this tick");
                }
                if let Some(upgrade::StepOutcome::Redeployed(daemon)) = &report.upgrade_outcome
                    && let Some(target) = &target_name
                {
                    let _ = self.event_tx.send(WsEvent::UpgradeProgress {
                        target: target.clone(),
                        daemon: daemon.clone(),
                    });
                }
                if matches!(report.upgrade_outcome, Some(upgrade::StepOutcome::Completed))
                    && let Some(target) = target_name
                {
                    let _ = self.event_tx.send(WsEvent::UpgradeCompleted { target });
                }
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "serve tick failed");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cephadm_exec::{CommandResult, ExecError, RemoteCommand};
    use std::time::Duration as StdDuration;

    struct AlwaysOkExecutor;

    #[async_trait]
    impl RemoteExecutor for AlwaysOkExecutor {
        async fn run(&self, _cmd: RemoteCommand) -> Result<CommandResult, ExecError> {
            Ok(CommandResult {
                status: 0,
                stdout: String::new(),
                stderr: String::new(),
                duration: StdDuration::from_millis(1),
            })
        }

        fn executor_type(&self) -> &'static str {
            "test"
        }

        fn is_connected(&self) -> bool {
            true
        }
    }

    struct TestHostFactory;

    #[async_trait]
    impl EngineHostFactory for TestHostFactory {
        async fn create_executor(
            &self,
            _addr: &str,
            _config: &EngineConfig,
        ) -> Result<Arc<dyn RemoteExecutor>, CephadmError> {
            Ok(Arc::new(AlwaysOkExecutor))
        }
    }

    fn args() -> EngineActorArgs {
        EngineActorArgs {
            host_factory: Arc::new(TestHostFactory),
            ..EngineActorArgs::default()
        }
    }

    #[tokio::test]
    async fn add_then_list_hosts_round_trips() {
        let actor = EngineActor::spawn(args());
        actor
            .ask(AddHost {
                name: "host1".to_string(),
                addr: None,
                labels: vec![],
            })
            .await
            .unwrap();

        let hosts = actor.ask(ListHosts).await.unwrap();
        assert_eq!(hosts.len(), 1);
        assert_eq!(hosts[0].name, "host1");
    }

    #[tokio::test]
    async fn removing_unknown_host_errors() {
        let actor = EngineActor::spawn(args());
        let result = actor
            .ask(RemoveHost {
                name: "nope".to_string(),
            })
            .await
            .unwrap();
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn duplicate_host_name_rejected() {
        let actor = EngineActor::spawn(args());
        actor
            .ask(AddHost {
                name: "host1".to_string(),
                addr: None,
                labels: vec![],
            })
            .await
            .unwrap()
            .unwrap();

        let result = actor
            .ask(AddHost {
                name: "host1".to_string(),
                addr: None,
                labels: vec![],
            })
            .await
            .unwrap();
        assert!(result.is_err());
    }
}
