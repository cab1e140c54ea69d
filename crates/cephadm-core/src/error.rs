//! Core error types for cephadm-core

use thiserror::Error;

/// Errors raised by engine operations (§7 error kinds)
#[derive(Error, Debug, Clone)]
pub enum CephadmError {
    /// Bad host name, missing network, duplicate name, or similar
    #[error("validation error: {0}")]
    ValidationError(String),

    /// Unknown host or daemon
    #[error("not found: {0}")]
    NotFoundError(String),

    /// Transport/exec failure from the remote executor
    #[error("remote execution error: {0}")]
    RemoteExecutionError(String),

    /// Helper exited non-zero
    #[error("helper exited with status {status}: {stderr}")]
    HelperExitError {
        /// Exit status reported by the helper
        status: i32,
        /// Captured stderr
        stderr: String,
    },

    /// Not enough hosts to satisfy a placement
    #[error("placement error: {0}")]
    PlacementError(String),

    /// Upgrade safety gate rejected the step (not ok-to-stop, no standby)
    #[error("upgrade gate error: {0}")]
    UpgradeGateError(String),

    /// Operation is not supported for this service type (e.g. monitor downscale)
    #[error("unsupported operation: {0}")]
    UnsupportedOperationError(String),

    /// Daemon name collision on an explicitly-requested name
    #[error("name collision: {0}")]
    NameCollisionError(String),

    /// Config-store lookup or mon-command failed
    #[error("config store error: {0}")]
    ConfigError(String),

    /// Actor communication failure (kameo ask/tell)
    #[error("actor error: {0}")]
    ActorError(String),

    /// Operation timed out
    #[error("operation timed out")]
    Timeout,
}

impl CephadmError {
    /// Map to the `(exit-code, message)` shape from §6/§7
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            CephadmError::ValidationError(_) => -22, // -EINVAL
            CephadmError::NotFoundError(_) => -2,    // -ENOENT
            CephadmError::HelperExitError { status, .. } => *status,
            _ => 1,
        }
    }

    /// HTTP status for the §4.K command surface
    #[must_use]
    pub fn http_status(&self) -> u16 {
        match self {
            CephadmError::ValidationError(_) | CephadmError::NameCollisionError(_) => 400,
            CephadmError::NotFoundError(_) => 404,
            CephadmError::RemoteExecutionError(_)
            | CephadmError::HelperExitError { .. }
            | CephadmError::PlacementError(_)
            | CephadmError::UpgradeGateError(_)
            | CephadmError::UnsupportedOperationError(_)
            | CephadmError::ConfigError(_)
            | CephadmError::ActorError(_)
            | CephadmError::Timeout => 502,
        }
    }
}

impl From<cephadm_exec::ExecError> for CephadmError {
    fn from(e: cephadm_exec::ExecError) -> Self {
        match e {
            cephadm_exec::ExecError::CommandFailed { status, stderr } => {
                CephadmError::HelperExitError { status, stderr }
            }
            cephadm_exec::ExecError::Timeout { .. } => CephadmError::Timeout,
            other => CephadmError::RemoteExecutionError(other.to_string()),
        }
    }
}

impl From<cephadm_inventory::InventoryError> for CephadmError {
    fn from(e: cephadm_inventory::InventoryError) -> Self {
        match e {
            cephadm_inventory::InventoryError::HostValidation(msg) => {
                CephadmError::ValidationError(msg)
            }
            other => CephadmError::ConfigError(other.to_string()),
        }
    }
}
