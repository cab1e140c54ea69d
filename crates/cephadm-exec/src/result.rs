//! Result types for remote command execution

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Result of a remote command execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResult {
    /// Exit status code (0 for success)
    pub status: i32,
    /// stdout output
    pub stdout: String,
    /// stderr output
    pub stderr: String,
    /// Time taken to execute
    pub duration: Duration,
}

impl CommandResult {
    /// Check if command succeeded (exit code 0)
    #[must_use]
    pub fn success(&self) -> bool {
        self.status == 0
    }

    /// Combine stdout and stderr
    #[must_use]
    pub fn combined_output(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }

    /// Parse stdout as JSON
    ///
    /// # Errors
    /// Returns a `serde_json::Error` if stdout is not valid JSON of type `T`.
    pub fn parse_json<T: for<'de> Deserialize<'de>>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.stdout)
    }
}

/// Connection information for an SSH-managed host
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionInfo {
    /// Host address (resolved from the inventory; falls back to the hostname)
    pub addr: String,
    /// Port (default 22)
    #[serde(default = "default_port")]
    pub port: u16,
    /// SSH user (`root` or `cephadm`)
    pub user: String,
}

fn default_port() -> u16 {
    22
}

impl ConnectionInfo {
    /// Create new connection info
    pub fn new(addr: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            port: 22,
            user: user.into(),
        }
    }

    /// Set custom port
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }
}

/// How the helper payload is dispatched on the remote host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// Concatenate a prelude (argv + stdin as JSON literals) with the helper
    /// payload and run it through a remote interpreter.
    Root,
    /// Invoke the already-installed helper binary with sudo.
    Packaged,
}
