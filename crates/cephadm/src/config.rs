//! Configuration loading and types

use std::path::PathBuf;

use cephadm_core::EngineConfig;
use serde::{Deserialize, Serialize};

/// Top-level configuration for the cephadm daemon
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Daemon server settings
    #[serde(default)]
    pub daemon: DaemonConfig,
    /// Reconciliation engine settings (§3/§5)
    #[serde(default)]
    pub engine: EngineConfig,
    /// Hosts registered at startup, in addition to any added later over HTTP
    #[serde(default)]
    pub host: Vec<SeedHost>,
}

/// A host to register with the engine at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedHost {
    pub name: String,
    #[serde(default)]
    pub addr: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
}

/// Daemon server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Address and port to bind to
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            log_level: default_log_level(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from file
    ///
    /// # Errors
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &PathBuf) -> eyre::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load from the `CEPHADM_CONFIG` env override, a handful of common
    /// paths, or fall back to defaults.
    pub fn load_default() -> eyre::Result<Self> {
        if let Ok(path) = std::env::var("CEPHADM_CONFIG") {
            return Self::load(&PathBuf::from(path));
        }

        let paths = [
            PathBuf::from("cephadm.toml"),
            PathBuf::from("/etc/cephadm/cephadm.toml"),
            dirs::config_dir()
                .map(|p| p.join("cephadm/cephadm.toml"))
                .unwrap_or_default(),
        ];

        for path in paths {
            if path.exists() {
                return Self::load(&path);
            }
        }

        tracing::warn!("no config file found, using defaults");
        Ok(Config::default())
    }
}
