//! Structured results returned by imperative control operations

use serde::{Deserialize, Serialize};

use super::ServiceStatus;

/// Outcome of start/stop/restart/ghost cleanup, never an `Err`.
///
/// `simulation` marks that no real infrastructure was touched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ControlResult {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub service_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ServiceStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terminated: Option<usize>,
    pub simulation: bool,
}

impl ControlResult {
    pub fn ok(service_id: u64, message: impl Into<String>, status: ServiceStatus, simulation: bool) -> Self {
        Self {
            success: true,
            message: message.into(),
            error: None,
            service_id: Some(service_id),
            status: Some(status),
            terminated: None,
            simulation,
        }
    }

    pub fn failed(service_id: Option<u64>, message: impl Into<String>, error: impl Into<String>, simulation: bool) -> Self {
        Self {
            success: false,
            message: message.into(),
            error: Some(error.into()),
            service_id,
            status: None,
            terminated: None,
            simulation,
        }
    }

    pub fn terminated(service_id: u64, count: usize, simulation: bool) -> Self {
        Self {
            success: true,
            message: format!("Terminated {count} ghost process(es)"),
            error: None,
            service_id: Some(service_id),
            status: None,
            terminated: Some(count),
            simulation,
        }
    }
}
