//! Port conflict detection
//!
//! A candidate conflicts when any of its ports is held by another Running
//! service or by a tracked port marked in use that the candidate does not own.

use serde::Serialize;

use crate::registry::{Registry, RegistryError};
use crate::types::{MonitoredService, ServiceStatus, TrackedPort};

/// Who currently holds a conflicting port
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PortHolder {
    Service { id: u64, name: String },
    Process { pid: Option<u32>, name: Option<String> },
}

impl std::fmt::Display for PortHolder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PortHolder::Service { id, name } => write!(f, "service '{name}' (id {id})"),
            PortHolder::Process { pid, name } => {
                let name = name.as_deref().unwrap_or("unknown process");
                match pid {
                    Some(pid) => write!(f, "{name} (pid {pid})"),
                    None => write!(f, "{name}"),
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortConflict {
    pub port: u16,
    pub holder: PortHolder,
}

impl std::fmt::Display for PortConflict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Port conflict: port {} is in use by {}", self.port, self.holder)
    }
}

/// Conflicts for `candidate` given a snapshot of services and tracked ports.
///
/// At most one conflict is reported per port; running services win over
/// tracked ports.
pub fn find_port_conflicts(
    candidate: &MonitoredService,
    services: &[MonitoredService],
    tracked: &[TrackedPort],
) -> Vec<PortConflict> {
    let mut conflicts: Vec<PortConflict> = Vec::new();

    for port in candidate.all_ports() {
        if conflicts.iter().any(|c| c.port == port) {
            continue;
        }

        let service_holder = services
            .iter()
            .filter(|s| s.id != candidate.id && s.status == ServiceStatus::Running)
            .find(|s| s.all_ports().any(|p| p == port))
            .map(|s| PortHolder::Service {
                id: s.id,
                name: s.name.clone(),
            });

        let holder = service_holder.or_else(|| {
            tracked
                .iter()
                .find(|t| t.port == port && t.in_use && t.service_id != Some(candidate.id))
                .map(|t| PortHolder::Process {
                    pid: t.pid,
                    name: t.process_name.clone(),
                })
        });

        if let Some(holder) = holder {
            conflicts.push(PortConflict { port, holder });
        }
    }

    conflicts
}

/// Load the fleet and tracked ports from the registry and check `candidate`.
pub async fn check_port_conflicts(
    registry: &dyn Registry,
    candidate: &MonitoredService,
) -> Result<Vec<PortConflict>, RegistryError> {
    let services = registry.list_services().await?;
    let tracked = registry.list_tracked_ports().await?;
    Ok(find_port_conflicts(candidate, &services, &tracked))
}
