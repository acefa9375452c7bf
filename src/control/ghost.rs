//! Ghost process reconciliation
//!
//! A ghost is a tracked process recorded as Running while its owning service
//! is not Running. Termination flips the record to Terminated with an audit
//! entry and, when a PID is known, asks the inspector to kill it. Kill
//! failures are logged and never block the flip.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use super::ControlError;
use crate::inspector::ProcessInspector;
use crate::registry::{Registry, RegistryError};
use crate::types::{
    actions, ControlResult, EventLogEntry, MonitoredService, ProcessStatus, ServiceStatus, TrackedProcess,
};

/// Ghosts of `service` within a snapshot of tracked processes.
pub fn find_ghosts(service: &MonitoredService, processes: &[TrackedProcess]) -> Vec<TrackedProcess> {
    if !service.ghost_detection || service.status == ServiceStatus::Running {
        return Vec::new();
    }
    processes
        .iter()
        .filter(|p| p.service_id == service.id && p.status == ProcessStatus::Running)
        .cloned()
        .collect()
}

pub struct GhostProcessReconciler {
    registry: Arc<dyn Registry>,
    inspector: Arc<dyn ProcessInspector>,
    simulation: bool,
}

impl GhostProcessReconciler {
    pub fn new(registry: Arc<dyn Registry>, inspector: Arc<dyn ProcessInspector>, simulation: bool) -> Self {
        Self {
            registry,
            inspector,
            simulation,
        }
    }

    pub async fn detect(&self, service: &MonitoredService) -> Result<Vec<TrackedProcess>, RegistryError> {
        let processes = self.registry.list_tracked_processes().await?;
        Ok(find_ghosts(service, &processes))
    }

    /// Ghosts across the fleet, grouped by owning service.
    pub async fn detect_all(&self) -> Result<Vec<(MonitoredService, Vec<TrackedProcess>)>, RegistryError> {
        let services = self.registry.list_services().await?;
        let processes = self.registry.list_tracked_processes().await?;
        Ok(services
            .into_iter()
            .filter_map(|svc| {
                let ghosts = find_ghosts(&svc, &processes);
                (!ghosts.is_empty()).then_some((svc, ghosts))
            })
            .collect())
    }

    pub async fn terminate_ghost_processes(&self, service_id: u64) -> ControlResult {
        match self.try_terminate(service_id).await {
            Ok(count) => ControlResult::terminated(service_id, count, self.simulation),
            Err(e) => {
                warn!(service_id, error = %e, "Ghost cleanup failed");
                ControlResult::failed(
                    Some(service_id),
                    "Failed to terminate ghost processes",
                    e.to_string(),
                    self.simulation,
                )
            }
        }
    }

    async fn try_terminate(&self, service_id: u64) -> Result<usize, ControlError> {
        let service = self
            .registry
            .get_service(service_id)
            .await?
            .ok_or(ControlError::ServiceNotFound(service_id))?;
        let ghosts = self.detect(&service).await?;
        if ghosts.is_empty() {
            debug!(service = %service.name, "No ghost processes");
            return Ok(0);
        }
        self.terminate(&service, ghosts).await
    }

    /// Terminate already-detected ghosts of `service`, returning how many were flipped.
    pub async fn terminate(
        &self,
        service: &MonitoredService,
        ghosts: Vec<TrackedProcess>,
    ) -> Result<usize, ControlError> {
        let mut count = 0;
        for mut ghost in ghosts {
            if let Some(pid) = ghost.pid {
                match self.inspector.kill_process(pid).await {
                    Ok(killed) => debug!(service = %service.name, pid, killed, "Ghost kill signalled"),
                    Err(e) => warn!(service = %service.name, pid, error = %e, "Failed to kill ghost process"),
                }
            }

            ghost.status = ProcessStatus::Terminated;
            ghost.updated_at = Some(Utc::now());
            self.registry.update_tracked_process(&ghost).await?;

            let pid = ghost.pid.map_or_else(|| "unknown".to_string(), |p| p.to_string());
            let entry = EventLogEntry::new(
                Some(service.id),
                actions::GHOST_TERMINATED,
                format!("Terminated ghost process {} (pid {pid})", ghost.name),
            );
            self.registry.append_event(entry).await?;
            count += 1;
        }

        info!(service = %service.name, count, "Ghost processes terminated");
        Ok(count)
    }
}
