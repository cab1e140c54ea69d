//! Remote executor trait

use async_trait::async_trait;

use crate::error::ExecError;
use crate::result::CommandResult;
use crate::script::RemoteCommand;

/// Executes one already-built remote command against one host.
///
/// An implementation owns exactly one connection (or none, for local/test
/// executors); the per-host connection table is owned by the engine, not by
/// this trait.
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    /// Run a command, returning its captured output.
    ///
    /// # Errors
    /// Returns `ExecError` on transport failure, authentication failure, or
    /// (when `cmd.error_ok` is false) non-zero exit.
    async fn run(&self, cmd: RemoteCommand) -> Result<CommandResult, ExecError>;

    /// Identify the dispatch strategy for logging/diagnostics.
    fn executor_type(&self) -> &'static str;

    /// Whether the underlying connection is currently established.
    fn is_connected(&self) -> bool {
        false
    }
}
