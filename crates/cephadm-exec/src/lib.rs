//! cephadm-exec: Remote execution abstraction
//!
//! Provides traits and implementations for executing commands locally and remotely via SSH

pub mod error;
pub mod keys;
pub mod local;
pub mod result;
pub mod script;
pub mod ssh;
pub mod traits;

pub use error::ExecError;
pub use result::{CommandResult, ConnectionInfo, DispatchMode};
pub use script::{RemoteCommand, StdinPayload};
pub use traits::RemoteExecutor;
