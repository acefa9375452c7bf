//! Append-only event log entries and the action vocabulary written by the core

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ServiceStatus;

/// Action labels appended by the control and scheduling paths.
///
/// The log itself stores free text; analysis classifies entries by
/// case-insensitive substring, so external writers may use their own labels.
pub mod actions {
    pub const STATUS_CHANGE: &str = "Status Change";
    pub const START_REQUESTED: &str = "Start Requested";
    pub const START_SUCCEEDED: &str = "Start Succeeded";
    pub const START_FAILED: &str = "Start Failed";
    pub const STOP_REQUESTED: &str = "Stop Requested";
    pub const STOP_SUCCEEDED: &str = "Stop Succeeded";
    pub const STOP_FAILED: &str = "Stop Failed";
    pub const RESTART_REQUESTED: &str = "Restart Requested";
    pub const RESTART_SUCCEEDED: &str = "Restart Succeeded";
    pub const RESTART_FAILED: &str = "Restart Failed";
    pub const AUTO_RESTART_ATTEMPT: &str = "Auto Restart Attempt";
    pub const AUTO_RESTART_FAILED: &str = "Auto Restart Failed";
    pub const GHOST_TERMINATED: &str = "Ghost Process Terminated";
    pub const CHECK_ERROR: &str = "Check Error";
}

/// One immutable row of the event log
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventLogEntry {
    /// Assigned by the registry on append
    pub id: u64,
    /// `None` for global events
    pub service_id: Option<u64>,
    pub action: String,
    pub details: String,
    pub status: Option<ServiceStatus>,
    pub timestamp: DateTime<Utc>,
}

impl EventLogEntry {
    /// Build an unsaved entry stamped with the current time.
    pub fn new(service_id: Option<u64>, action: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            id: 0,
            service_id,
            action: action.into(),
            details: details.into(),
            status: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_status(mut self, status: ServiceStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    fn action_contains(&self, needle: &str) -> bool {
        self.action.to_ascii_lowercase().contains(needle)
    }

    pub fn is_status_change(&self) -> bool {
        self.action_contains("status change")
    }

    /// Action mentions an error/failure, or the recorded status is Error/Unreachable.
    pub fn is_error(&self) -> bool {
        self.action_contains("error")
            || self.action_contains("failed")
            || self.status.is_some_and(ServiceStatus::is_critical)
    }

    /// Start/stop/restart activity that did not itself fail.
    pub fn is_restart(&self) -> bool {
        (self.action_contains("start") || self.action_contains("stop")) && !self.is_error()
    }
}
