//! Engine-wide configuration: timeouts, worker pool sizing, SSH defaults

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Engine configuration (§5 concurrency/resource model, §3 cache timeouts)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Worker pool size; 1 serializes all command finalization (§5, §9)
    #[serde(default = "default_pool_size")]
    pub worker_pool_size: usize,
    /// SSH user used for new connections (`root` or `cephadm`)
    #[serde(default = "default_ssh_user")]
    pub ssh_user: String,
    /// Path to the SSH identity key, if not using the agent
    pub ssh_identity_key: Option<String>,
    /// Device cache staleness timeout (§3: default 600s)
    #[serde(default = "default_device_cache_timeout", with = "duration_secs")]
    pub device_cache_timeout: Duration,
    /// Daemon cache staleness timeout (§3: default 60s)
    #[serde(default = "default_daemon_cache_timeout", with = "duration_secs")]
    pub daemon_cache_timeout: Duration,
    /// Serve loop sleep interval (§4.I: default 600s)
    #[serde(default = "default_serve_interval", with = "duration_secs")]
    pub serve_interval: Duration,
    /// Number of ok-to-stop poll attempts during upgrade (§4.H: default 4)
    #[serde(default = "default_ok_to_stop_attempts")]
    pub ok_to_stop_attempts: u32,
    /// Delay between ok-to-stop attempts (§4.H: default 15s)
    #[serde(default = "default_ok_to_stop_interval", with = "duration_secs")]
    pub ok_to_stop_interval: Duration,
    /// Cluster fsid, stamped onto remote invocations and cached daemons
    pub fsid: String,
}

fn default_pool_size() -> usize {
    1
}

fn default_ssh_user() -> String {
    "root".to_string()
}

fn default_device_cache_timeout() -> Duration {
    Duration::from_secs(600)
}

fn default_daemon_cache_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_serve_interval() -> Duration {
    Duration::from_secs(600)
}

fn default_ok_to_stop_attempts() -> u32 {
    4
}

fn default_ok_to_stop_interval() -> Duration {
    Duration::from_secs(15)
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            worker_pool_size: default_pool_size(),
            ssh_user: default_ssh_user(),
            ssh_identity_key: None,
            device_cache_timeout: default_device_cache_timeout(),
            daemon_cache_timeout: default_daemon_cache_timeout(),
            serve_interval: default_serve_interval(),
            ok_to_stop_attempts: default_ok_to_stop_attempts(),
            ok_to_stop_interval: default_ok_to_stop_interval(),
            fsid: String::new(),
        }
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(d)?;
        Ok(Duration::from_secs(secs))
    }
}
