use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kameo::actor::Spawn;

use cephadm_core::message::{AddHost, ApplyService, ListDaemons, ListHosts, UpgradeStart, UpgradeStatus};
use cephadm_core::{EngineActor, EngineActorArgs, EngineConfig, EngineHostFactory};
use cephadm_exec::error::ExecError;
use cephadm_exec::result::CommandResult;
use cephadm_exec::script::RemoteCommand;
use cephadm_exec::traits::RemoteExecutor;
use cephadm_inventory::{DaemonFilter, PlacementSpec, ServiceSpec};

struct MockExecutor;

#[async_trait]
impl RemoteExecutor for MockExecutor {
    async fn run(&self, _cmd: RemoteCommand) -> Result<CommandResult, ExecError> {
        Ok(CommandResult {
            status: 0,
            stdout: String::new(),
            stderr: String::new(),
            duration: Duration::from_millis(1),
        })
    }

    fn executor_type(&self) -> &'static str {
        "mock"
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
    ) -> Result<Arc<dyn RemoteExecutor>, cephadm_core::CephadmError> {
        Ok(Arc::new(MockExecutor))
    }
}

fn spawn_engine() -> kameo::actor::ActorRef<EngineActor> {
    let args = EngineActorArgs {
        host_factory: Arc::new(TestHostFactory),
        ..EngineActorArgs::default()
    };
    EngineActor::spawn(args)
}

#[tokio::test]
async fn add_host_then_list_round_trips() {
    let engine = spawn_engine();

    engine
        .ask(AddHost {
            name: "node1".to_string(),
            addr: Some("10.0.0.1".to_string()),
            labels: vec!["mon".to_string()],
        })
        .await
        .unwrap()
        .unwrap();

    let hosts = engine.ask(ListHosts).await.unwrap();
    assert_eq!(hosts.len(), 1);
    assert_eq!(hosts[0].name, "node1");
    assert!(hosts[0].labels.contains("mon"));

    engine.stop_gracefully().await.unwrap();
}

#[tokio::test]
async fn apply_service_deploys_onto_registered_hosts() {
    let engine = spawn_engine();

    for name in ["node1", "node2", "node3"] {
        engine
            .ask(AddHost {
                name: name.to_string(),
                addr: None,
                labels: vec![],
            })
            .await
            .unwrap()
            .unwrap();
    }

    let spec = ServiceSpec::new("crash", PlacementSpec::Count(3));
    let report = engine
        .ask(ApplyService { spec })
        .await
        .unwrap()
        .unwrap();

    assert_eq!(report.deployed.len(), 3);
    assert!(!report.unchanged);

    let daemons = engine
        .ask(ListDaemons {
            filter: DaemonFilter::new().daemon_type("crash"),
        })
        .await
        .unwrap();
    assert_eq!(daemons.len(), 3);

    engine.stop_gracefully().await.unwrap();
}

#[tokio::test]
async fn upgrade_start_then_status_reports_target() {
    let engine = spawn_engine();

    engine
        .ask(UpgradeStart {
            image: Some("quay.io/ceph/ceph:v18".to_string()),
            version: None,
        })
        .await
        .unwrap()
        .unwrap();

    let status = engine.ask(UpgradeStatus).await.unwrap();
    let state = status.expect("upgrade should be in progress");
    assert_eq!(state.target_name, "quay.io/ceph/ceph:v18");
    assert!(!state.paused);

    engine.stop_gracefully().await.unwrap();
}
