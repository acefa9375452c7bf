//! Restart Controller
//!
//! Start/stop/restart of monitored services with validation, port-conflict
//! checks and before/after audit entries. In simulation mode (the default)
//! no real process is touched: the outcome is recorded as a status
//! transition only. Outside simulation, `stop` asks the process inspector to
//! kill whatever listens on the service's ports.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use super::ports::check_port_conflicts;
use super::validation::validate_service;
use super::ControlError;
use crate::config::ControlConfig;
use crate::inspector::ProcessInspector;
use crate::registry::Registry;
use crate::types::{actions, ControlResult, EventLogEntry, MonitoredService, ServiceStatus};

pub struct RestartController {
    registry: Arc<dyn Registry>,
    inspector: Arc<dyn ProcessInspector>,
    restart_delay: Duration,
    simulation: bool,
}

impl RestartController {
    pub fn new(registry: Arc<dyn Registry>, inspector: Arc<dyn ProcessInspector>, config: &ControlConfig) -> Self {
        Self {
            registry,
            inspector,
            restart_delay: Duration::from_millis(config.restart_delay_ms),
            simulation: config.simulation,
        }
    }

    pub const fn is_simulation(&self) -> bool {
        self.simulation
    }

    // ========================================================================
    // Public operations
    // ========================================================================

    pub async fn start(&self, service_id: u64) -> ControlResult {
        let mut service = match self.load(service_id).await {
            Ok(s) => s,
            Err(e) => return self.failure(Some(service_id), "Start rejected", &e),
        };

        self.audit(&service, actions::START_REQUESTED, format!("Start requested for {}", service.name))
            .await;

        match self.try_start(&mut service).await {
            Ok(()) => {
                self.audit(&service, actions::START_SUCCEEDED, format!("{} started", service.name))
                    .await;
                info!(service = %service.name, simulation = self.simulation, "Service started");
                ControlResult::ok(service.id, format!("{} started", service.name), service.status, self.simulation)
            }
            Err(e) => {
                self.audit(&service, actions::START_FAILED, e.to_string()).await;
                warn!(service = %service.name, error = %e, "Start failed");
                self.failure(Some(service.id), format!("Failed to start {}", service.name), &e)
            }
        }
    }

    pub async fn stop(&self, service_id: u64) -> ControlResult {
        let mut service = match self.load(service_id).await {
            Ok(s) => s,
            Err(e) => return self.failure(Some(service_id), "Stop rejected", &e),
        };

        self.audit(&service, actions::STOP_REQUESTED, format!("Stop requested for {}", service.name))
            .await;

        match self.try_stop(&mut service).await {
            Ok(()) => {
                self.audit(&service, actions::STOP_SUCCEEDED, format!("{} stopped", service.name))
                    .await;
                info!(service = %service.name, simulation = self.simulation, "Service stopped");
                ControlResult::ok(service.id, format!("{} stopped", service.name), service.status, self.simulation)
            }
            Err(e) => {
                self.audit(&service, actions::STOP_FAILED, e.to_string()).await;
                warn!(service = %service.name, error = %e, "Stop failed");
                self.failure(Some(service.id), format!("Failed to stop {}", service.name), &e)
            }
        }
    }

    /// Stop (best effort), wait the restart delay, then start.
    ///
    /// A service in Error/Unreachable is forced to Stopped and started
    /// directly without a stop phase.
    pub async fn restart(&self, service_id: u64) -> ControlResult {
        let mut service = match self.load(service_id).await {
            Ok(s) => s,
            Err(e) => return self.failure(Some(service_id), "Restart rejected", &e),
        };

        self.audit(
            &service,
            actions::RESTART_REQUESTED,
            format!("Restart requested for {} (currently {})", service.name, service.status),
        )
        .await;

        let outcome = if service.status.is_critical() {
            match self.transition(&mut service, ServiceStatus::Stopped).await {
                Ok(()) => self.try_start(&mut service).await,
                Err(e) => Err(e),
            }
        } else {
            if let Err(e) = self.try_stop(&mut service).await {
                warn!(service = %service.name, error = %e, "Stop phase of restart failed, continuing");
            }
            tokio::time::sleep(self.restart_delay).await;
            self.try_start(&mut service).await
        };

        match outcome {
            Ok(()) => {
                self.audit(&service, actions::RESTART_SUCCEEDED, format!("{} restarted", service.name))
                    .await;
                info!(service = %service.name, simulation = self.simulation, "Service restarted");
                ControlResult::ok(service.id, format!("{} restarted", service.name), service.status, self.simulation)
            }
            Err(e) => {
                self.audit(&service, actions::RESTART_FAILED, e.to_string()).await;
                warn!(service = %service.name, error = %e, "Restart failed");
                self.failure(Some(service.id), format!("Failed to restart {}", service.name), &e)
            }
        }
    }

    // ========================================================================
    // Steps
    // ========================================================================

    async fn load(&self, service_id: u64) -> Result<MonitoredService, ControlError> {
        let service = self
            .registry
            .get_service(service_id)
            .await?
            .ok_or(ControlError::ServiceNotFound(service_id))?;
        validate_service(&service)?;
        Ok(service)
    }

    async fn try_start(&self, service: &mut MonitoredService) -> Result<(), ControlError> {
        let conflicts = check_port_conflicts(self.registry.as_ref(), service).await?;
        if !conflicts.is_empty() {
            return Err(ControlError::PortConflict(conflicts));
        }
        self.transition(service, ServiceStatus::Running).await
    }

    async fn try_stop(&self, service: &mut MonitoredService) -> Result<(), ControlError> {
        if !self.simulation {
            for port in service.all_ports() {
                if let Some(process) = self.inspector.find_process_by_port(port).await? {
                    let killed = self.inspector.kill_process(process.pid).await?;
                    info!(service = %service.name, port, pid = process.pid, killed, "Signalled listener");
                }
            }
        }
        self.transition(service, ServiceStatus::Stopped).await
    }

    /// Persist `status` and `last_checked`; a changed status also appends a Status Change entry.
    async fn transition(&self, service: &mut MonitoredService, status: ServiceStatus) -> Result<(), ControlError> {
        let previous = service.status;
        service.status = status;
        service.last_checked = Some(Utc::now());
        self.registry.update_service(service).await?;

        if previous != status {
            let entry = EventLogEntry::new(
                Some(service.id),
                actions::STATUS_CHANGE,
                format!("Status changed from {previous} to {status}"),
            )
            .with_status(status);
            self.registry.append_event(entry).await?;
        }
        Ok(())
    }

    async fn audit(&self, service: &MonitoredService, action: &str, details: String) {
        let entry = EventLogEntry::new(Some(service.id), action, details);
        if let Err(e) = self.registry.append_event(entry).await {
            warn!(service = %service.name, action, error = %e, "Failed to append audit entry");
        }
    }

    fn failure(&self, service_id: Option<u64>, message: impl Into<String>, error: &ControlError) -> ControlResult {
        ControlResult::failed(service_id, message, error.to_string(), self.simulation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inspector::{InspectorError, ProcessInfo};
    use crate::registry::InMemoryRegistry;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeInspector {
        listeners: Vec<(u16, u32)>,
        killed: Mutex<Vec<u32>>,
        broken: bool,
    }

    #[async_trait]
    impl ProcessInspector for FakeInspector {
        async fn find_process_by_port(&self, port: u16) -> Result<Option<ProcessInfo>, InspectorError> {
            if self.broken {
                return Err(InspectorError::Timeout {
                    command: "lsof".into(),
                    timeout_ms: 10,
                });
            }
            Ok(self
                .listeners
                .iter()
                .find(|(p, _)| *p == port)
                .map(|(_, pid)| ProcessInfo { pid: *pid, name: "node".into() }))
        }

        async fn kill_process(&self, pid: u32) -> Result<bool, InspectorError> {
            self.killed.lock().expect("lock").push(pid);
            Ok(true)
        }
    }

    fn config() -> ControlConfig {
        ControlConfig {
            restart_delay_ms: 0,
            ..ControlConfig::default()
        }
    }

    fn controller(registry: Arc<InMemoryRegistry>) -> RestartController {
        RestartController::new(registry, Arc::new(FakeInspector::default()), &config())
    }

    #[tokio::test]
    async fn test_start_transitions_and_audits() {
        let registry = Arc::new(InMemoryRegistry::new().with_services(vec![MonitoredService::new(
            1,
            "api",
            "localhost",
            8080,
        )]));
        let result = controller(registry.clone()).start(1).await;
        assert!(result.success);
        assert!(result.simulation);
        assert_eq!(result.status, Some(ServiceStatus::Running));

        let log: Vec<String> = registry.events_for(1).into_iter().map(|e| e.action).collect();
        assert_eq!(log, vec![actions::START_REQUESTED, actions::STATUS_CHANGE, actions::START_SUCCEEDED]);
    }

    #[tokio::test]
    async fn test_unknown_and_invalid_services_fail_without_audit() {
        let registry = Arc::new(InMemoryRegistry::new().with_services(vec![MonitoredService::new(
            2,
            "",
            "localhost",
            8080,
        )]));
        let c = controller(registry.clone());

        let missing = c.stop(99).await;
        assert!(!missing.success);
        assert!(missing.error.as_deref().is_some_and(|e| e.contains("not found")));

        let invalid = c.start(2).await;
        assert!(!invalid.success);
        assert!(registry.events().is_empty());
    }

    #[tokio::test]
    async fn test_port_conflict_blocks_start() {
        let registry = Arc::new(InMemoryRegistry::new().with_services(vec![
            MonitoredService::new(1, "A", "localhost", 3000).with_status(ServiceStatus::Running),
            MonitoredService::new(2, "B", "localhost", 3000),
        ]));
        let result = controller(registry.clone()).start(2).await;
        assert!(!result.success);
        assert!(result.error.as_deref().is_some_and(|e| e.contains("Port conflict")));

        let b = registry.get_service(2).await.expect("get").expect("exists");
        assert_eq!(b.status, ServiceStatus::Stopped);
        let log: Vec<String> = registry.events_for(2).into_iter().map(|e| e.action).collect();
        assert_eq!(log, vec![actions::START_REQUESTED, actions::START_FAILED]);
    }

    #[tokio::test]
    async fn test_restart_from_error_skips_stop_phase() {
        let registry = Arc::new(InMemoryRegistry::new().with_services(vec![
            MonitoredService::new(1, "api", "localhost", 8080).with_status(ServiceStatus::Error),
        ]));
        let result = controller(registry.clone()).restart(1).await;
        assert!(result.success);

        let events = registry.events_for(1);
        let statuses: Vec<ServiceStatus> = events
            .iter()
            .filter(|e| e.action == actions::STATUS_CHANGE)
            .filter_map(|e| e.status)
            .collect();
        assert_eq!(statuses, vec![ServiceStatus::Stopped, ServiceStatus::Running]);
        assert!(events.iter().all(|e| e.action != actions::STOP_REQUESTED));
    }

    #[tokio::test]
    async fn test_live_stop_kills_listener() {
        let registry = Arc::new(InMemoryRegistry::new().with_services(vec![
            MonitoredService::new(1, "api", "localhost", 8080).with_status(ServiceStatus::Running),
        ]));
        let inspector = Arc::new(FakeInspector {
            listeners: vec![(8080, 777)],
            ..FakeInspector::default()
        });
        let live = ControlConfig {
            simulation: false,
            ..config()
        };
        let c = RestartController::new(registry.clone(), inspector.clone(), &live);
        let result = c.stop(1).await;
        assert!(result.success);
        assert!(!result.simulation);
        assert_eq!(*inspector.killed.lock().expect("lock"), vec![777]);
    }

    #[tokio::test]
    async fn test_restart_continues_when_stop_phase_fails() {
        let registry = Arc::new(InMemoryRegistry::new().with_services(vec![
            MonitoredService::new(1, "api", "localhost", 8080).with_status(ServiceStatus::Running),
        ]));
        let inspector = Arc::new(FakeInspector {
            broken: true,
            ..FakeInspector::default()
        });
        let live = ControlConfig {
            simulation: false,
            ..config()
        };
        let result = RestartController::new(registry.clone(), inspector, &live).restart(1).await;
        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.status, Some(ServiceStatus::Running));

        let svc = registry.get_service(1).await.expect("get").expect("exists");
        assert_eq!(svc.status, ServiceStatus::Running);
        let log: Vec<String> = registry.events_for(1).into_iter().map(|e| e.action).collect();
        assert!(log.iter().all(|a| a != actions::RESTART_FAILED));
        assert_eq!(log.last().map(String::as_str), Some(actions::RESTART_SUCCEEDED));
    }
}
