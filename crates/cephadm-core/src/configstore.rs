//! Config store shim (§4.J): stands in for the external manager's
//! key-value store and mon-command RPC. The manager host itself is an
//! out-of-scope collaborator (§1); this is the minimal seam the engine
//! needs to talk to it.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::CephadmError;

/// Key-value store plus mon-command RPC, backed by a real manager host in
/// production.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Fetch a stored value by key
    async fn get_store(&self, key: &str) -> Option<String>;

    /// Persist a value under a key
    async fn set_store(&self, key: &str, value: &str);

    /// Issue a mon-command, returning its JSON/text result
    ///
    /// # Errors
    /// Returns `CephadmError::ConfigError` if the command could not be
    /// executed against the backing cluster.
    async fn mon_command(&self, cmd: &str, args: &[(&str, &str)]) -> Result<String, CephadmError>;
}

/// Production-shaped `ConfigStore` backing a `HashMap` guarded by a mutex;
/// used by the `cephadm` binary until wired to a real manager host.
#[derive(Debug, Default)]
pub struct InMemoryConfigStore {
    store: Mutex<HashMap<String, String>>,
    mon_commands: Mutex<HashMap<String, String>>,
}

impl InMemoryConfigStore {
    /// An empty store
    #[must_use]
    pub fn new() -> Self {
        Self {
            store: Mutex::new(HashMap::new()),
            mon_commands: Mutex::new(HashMap::new()),
        }
    }

    /// Seed a canned response for a mon-command, keyed by the command name
    /// alone (ignoring args) — used by tests that script a fake cluster.
    pub fn script_mon_command(&self, cmd: impl Into<String>, response: impl Into<String>) {
        self.mon_commands
            .lock()
            .expect("config store mutex poisoned")
            .insert(cmd.into(), response.into());
    }
}

#[async_trait]
impl ConfigStore for InMemoryConfigStore {
    async fn get_store(&self, key: &str) -> Option<String> {
        self.store
            .lock()
            .expect("config store mutex poisoned")
            .get(key)
            .cloned()
    }

    async fn set_store(&self, key: &str, value: &str) {
        self.store
            .lock()
            .expect("config store mutex poisoned")
            .insert(key.to_string(), value.to_string());
    }

    async fn mon_command(&self, cmd: &str, _args: &[(&str, &str)]) -> Result<String, CephadmError> {
        self.mon_commands
            .lock()
            .expect("config store mutex poisoned")
            .get(cmd)
            .cloned()
            .ok_or_else(|| CephadmError::ConfigError(format!("no scripted response for mon-command {cmd}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let store = InMemoryConfigStore::new();
        store.set_store("container_image", "quay.io/ceph/ceph:v18").await;
        assert_eq!(
            store.get_store("container_image").await,
            Some("quay.io/ceph/ceph:v18".to_string())
        );
    }

    #[tokio::test]
    async fn missing_key_returns_none() {
        let store = InMemoryConfigStore::new();
        assert_eq!(store.get_store("missing").await, None);
    }

    #[tokio::test]
    async fn scripted_mon_command_is_returned() {
        let store = InMemoryConfigStore::new();
        store.script_mon_command("osd ok-to-stop", "{\"ok_to_stop\":true}");
        let result = store.mon_command("osd ok-to-stop", &[]).await.unwrap();
        assert!(result.contains("ok_to_stop"));
    }

    #[tokio::test]
    async fn unscripted_mon_command_errors() {
        let store = InMemoryConfigStore::new();
        assert!(store.mon_command("auth get", &[]).await.is_err());
    }
}
