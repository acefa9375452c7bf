//! Request validation for imperative control operations

use crate::probe::normalize_url;
use crate::types::MonitoredService;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("service name must not be empty")]
    EmptyName,
    #[error("invalid port {0}: must be between 1 and 65535")]
    InvalidPort(u16),
    #[error("invalid URL `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// Check name, every port and the URL before any state change.
pub fn validate_service(service: &MonitoredService) -> Result<(), ValidationError> {
    if service.name.trim().is_empty() {
        return Err(ValidationError::EmptyName);
    }
    if let Some(port) = service.all_ports().find(|p| *p == 0) {
        return Err(ValidationError::InvalidPort(port));
    }
    normalize_url(service).map_err(|e| ValidationError::InvalidUrl {
        url: service.url.clone(),
        reason: e.to_string(),
    })?;
    Ok(())
}
