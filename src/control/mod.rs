//! Restart control and ghost-process reconciliation
//!
//! Imperative operations validate first, audit before and after, and always
//! return a `ControlResult`; errors never cross this boundary as `Err`.

pub mod ghost;
pub mod ports;
pub mod restart;
pub mod validation;

pub use ghost::GhostProcessReconciler;
pub use ports::{check_port_conflicts, find_port_conflicts, PortConflict, PortHolder};
pub use restart::RestartController;
pub use validation::{validate_service, ValidationError};

use crate::inspector::InspectorError;
use crate::registry::RegistryError;

/// Internal failure of a control step, rendered into `ControlResult::error`
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("service {0} not found")]
    ServiceNotFound(u64),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "))]
    PortConflict(Vec<PortConflict>),
    #[error("registry: {0}")]
    Registry(#[from] RegistryError),
    #[error("process inspector: {0}")]
    Inspector(#[from] InspectorError),
}
