//! Builds the per-host `RemoteExecutor` used when a host is registered.

use std::sync::Arc;

use async_trait::async_trait;
use cephadm_core::{CephadmError, EngineConfig, EngineHostFactory};
use cephadm_exec::keys::KeySource;
use cephadm_exec::local::LocalExecutor;
use cephadm_exec::ssh::SshExecutor;
use cephadm_exec::{ConnectionInfo, DispatchMode, RemoteExecutor};

/// Default implementation of `EngineHostFactory`: localhost gets a
/// `LocalExecutor`, everything else gets SSH.
pub struct DefaultHostFactory;

impl DefaultHostFactory {
    /// Create a new factory instance
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for DefaultHostFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EngineHostFactory for DefaultHostFactory {
    async fn create_executor(
        &self,
        addr: &str,
        config: &EngineConfig,
    ) -> Result<Arc<dyn RemoteExecutor>, CephadmError> {
        if addr == "localhost" || addr == "127.0.0.1" {
            return Ok(Arc::new(LocalExecutor::new(DispatchMode::Root)));
        }

        let key_source = match &config.ssh_identity_key {
            Some(path) => KeySource::Path(path.clone().into()),
            None => KeySource::Agent,
        };

        let conn_info = ConnectionInfo::new(addr, &config.ssh_user);
        let executor = SshExecutor::new(conn_info, &key_source, DispatchMode::Root)
            .map_err(|e| CephadmError::RemoteExecutionError(e.to_string()))?;
        Ok(Arc::new(executor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn localhost_gets_local_executor() {
        let factory = DefaultHostFactory::new();
        let executor = factory
            .create_executor("localhost", &EngineConfig::default())
            .await
            .unwrap();
        assert_eq!(executor.executor_type(), "local");
    }

    #[tokio::test]
    async fn remote_addr_gets_ssh_executor() {
        let factory = DefaultHostFactory::new();
        let executor = factory
            .create_executor("ceph-node-1.example.com", &EngineConfig::default())
            .await
            .unwrap();
        assert_eq!(executor.executor_type(), "ssh");
    }
}
