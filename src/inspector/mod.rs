//! OS Process Inspector: maps ports to listening processes and kills by PID
//!
//! Abstracted behind `ProcessInspector` so the platform commands can be
//! swapped for a fake in tests. Command failure is reported as
//! `InspectorError`, distinct from `Ok(None)` ("nothing listening"); callers
//! that must degrade log the error and treat the port as free.

mod shell;

pub use shell::ShellInspector;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A process found listening on a port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessInfo {
    pub pid: u32,
    pub name: String,
}

/// Inspector errors
#[derive(Debug, thiserror::Error)]
pub enum InspectorError {
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`{command}` timed out after {timeout_ms}ms")]
    Timeout { command: String, timeout_ms: u64 },
    #[error("`{command}` exited with {code:?}: {stderr}")]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },
    #[error("process inspection is not supported on this platform")]
    Unsupported,
}

/// Platform capability consumed by the ghost reconciler and port sweeps
#[async_trait]
pub trait ProcessInspector: Send + Sync {
    /// Process listening on `port`, `Ok(None)` when the port is free.
    async fn find_process_by_port(&self, port: u16) -> Result<Option<ProcessInfo>, InspectorError>;

    /// Kill `pid`; `Ok(false)` when the process no longer exists.
    async fn kill_process(&self, pid: u32) -> Result<bool, InspectorError>;
}
