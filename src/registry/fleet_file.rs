//! Fleet definition file used to seed an `InMemoryRegistry`
//!
//! ```toml
//! [settings]
//! auto_restart = true
//!
//! [[services]]
//! id = 1
//! name = "api"
//! url = "http://localhost"
//! port = 8080
//! service_type = "Backend"
//!
//! [[events]]
//! service_id = 1
//! action = "Status Change"
//! status = "Running"
//! timestamp = "2026-10-17T08:00:00Z"
//! ```

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::InMemoryRegistry;
use crate::types::{
    EventLogEntry, GlobalSettings, MonitoredService, ServiceStatus, TrackedPort, TrackedProcess,
};

#[derive(Debug, thiserror::Error)]
pub enum FleetFileError {
    #[error("fleet file I/O error ({}): {1}", .0.display())]
    Io(PathBuf, std::io::Error),
    #[error("fleet file parse error ({}): {1}", .0.display())]
    Parse(PathBuf, toml::de::Error),
    #[error("duplicate service id {0}")]
    DuplicateService(u64),
}

/// Historical event without a registry-assigned id
#[derive(Debug, Clone, Deserialize)]
pub struct SeedEvent {
    #[serde(default)]
    pub service_id: Option<u64>,
    pub action: String,
    #[serde(default)]
    pub details: String,
    #[serde(default)]
    pub status: Option<ServiceStatus>,
    pub timestamp: DateTime<Utc>,
}

impl From<SeedEvent> for EventLogEntry {
    fn from(e: SeedEvent) -> Self {
        let mut entry = EventLogEntry::new(e.service_id, e.action, e.details).at(e.timestamp);
        entry.status = e.status;
        entry
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FleetFile {
    #[serde(default)]
    pub settings: GlobalSettings,
    #[serde(default)]
    pub services: Vec<MonitoredService>,
    #[serde(default)]
    pub ports: Vec<TrackedPort>,
    #[serde(default)]
    pub processes: Vec<TrackedProcess>,
    #[serde(default)]
    pub events: Vec<SeedEvent>,
}

impl FleetFile {
    pub fn load(path: &Path) -> Result<Self, FleetFileError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| FleetFileError::Io(path.to_path_buf(), e))?;
        let fleet: Self = toml::from_str(&contents)
            .map_err(|e| FleetFileError::Parse(path.to_path_buf(), e))?;

        let mut seen = std::collections::HashSet::new();
        for svc in &fleet.services {
            if !seen.insert(svc.id) {
                return Err(FleetFileError::DuplicateService(svc.id));
            }
        }
        Ok(fleet)
    }

    pub fn into_registry(self) -> InMemoryRegistry {
        InMemoryRegistry::new()
            .with_settings(self.settings)
            .with_services(self.services)
            .with_ports(self.ports)
            .with_processes(self.processes)
            .with_events(self.events.into_iter().map(EventLogEntry::from))
    }
}
