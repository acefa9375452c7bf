//! Tick bodies shared by the scheduler timers
//!
//! Each tick sweeps the fleet sequentially. A failure on one service is
//! logged, recorded against that service, and never aborts the sweep.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use chrono::Utc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::PortEvent;
use crate::control::{GhostProcessReconciler, RestartController};
use crate::inspector::ProcessInspector;
use crate::probe::{probe_target, ProbeTarget, StatusProbe};
use crate::registry::{Registry, RegistryError};
use crate::types::{actions, EventLogEntry, GlobalSettings, MonitoredService, ServiceStatus, TrackedPort};

/// Counters for one sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub checked: usize,
    pub changed: usize,
    pub failed: usize,
    pub restarted: usize,
    pub ghosts_found: usize,
    pub ghosts_terminated: usize,
}

/// Which service sweep is running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SweepKind {
    Status,
    Endpoint,
}

pub(crate) struct SchedulerCore {
    pub(crate) registry: Arc<dyn Registry>,
    pub(crate) inspector: Arc<dyn ProcessInspector>,
    pub(crate) probe: StatusProbe,
    pub(crate) controller: RestartController,
    pub(crate) reconciler: GhostProcessReconciler,
    pub(crate) settings: ArcSwap<GlobalSettings>,
    pub(crate) port_events: broadcast::Sender<PortEvent>,
}

impl SchedulerCore {
    /// Reload settings from the registry, keeping the last snapshot on failure.
    pub(crate) async fn refresh_settings(&self) -> Arc<GlobalSettings> {
        match self.registry.get_settings().await {
            Ok(settings) => self.settings.store(Arc::new(settings)),
            Err(e) => warn!(error = %e, "Failed to refresh settings, using last snapshot"),
        }
        self.settings.load_full()
    }

    // ========================================================================
    // Status / endpoint sweeps
    // ========================================================================

    pub(crate) async fn service_sweep(&self, kind: SweepKind) -> TickSummary {
        let settings = self.refresh_settings().await;
        let mut summary = TickSummary::default();

        let services = match self.registry.list_services().await {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "Failed to list services");
                return summary;
            }
        };

        let probe = match kind {
            SweepKind::Status => self.probe.clone(),
            SweepKind::Endpoint => self
                .probe
                .clone()
                .with_http_timeout(Duration::from_millis(settings.endpoint_timeout_ms)),
        };

        let allow_restart = kind == SweepKind::Status && settings.auto_restart;
        for service in services {
            if kind == SweepKind::Endpoint && !matches!(probe_target(&service), Ok(ProbeTarget::Http(_))) {
                continue;
            }
            summary.checked += 1;
            match self.check_service(&probe, &service, allow_restart).await {
                Ok(outcome) => {
                    if outcome.changed {
                        summary.changed += 1;
                    }
                    if outcome.restarted {
                        summary.restarted += 1;
                    }
                }
                Err(e) => {
                    summary.failed += 1;
                    warn!(service = %service.name, error = %e, "Service check failed");
                    self.mark_error(service, &e).await;
                }
            }
        }

        debug!(?kind, checked = summary.checked, changed = summary.changed, "Service sweep finished");
        summary
    }

    async fn check_service(
        &self,
        probe: &StatusProbe,
        service: &MonitoredService,
        allow_restart: bool,
    ) -> Result<CheckOutcome, RegistryError> {
        let observed = probe.probe(service).await;
        let mut updated = service.clone();
        updated.last_checked = Some(Utc::now());
        updated.status = observed;
        self.registry.update_service(&updated).await?;

        let changed = observed != service.status;
        if changed {
            info!(service = %service.name, from = %service.status, to = %observed, "Status changed");
            let entry = EventLogEntry::new(
                Some(service.id),
                actions::STATUS_CHANGE,
                format!("Status changed from {} to {observed}", service.status),
            )
            .with_status(observed);
            self.registry.append_event(entry).await?;
        }

        let mut restarted = false;
        if allow_restart && observed.is_down() {
            restarted = self.auto_restart(&updated).await?;
        }

        Ok(CheckOutcome { changed, restarted })
    }

    async fn auto_restart(&self, service: &MonitoredService) -> Result<bool, RegistryError> {
        self.registry
            .append_event(EventLogEntry::new(
                Some(service.id),
                actions::AUTO_RESTART_ATTEMPT,
                format!("Auto-restarting {} ({})", service.name, service.status),
            ))
            .await?;

        let result = self.controller.restart(service.id).await;
        if result.success {
            info!(service = %service.name, "Auto-restart succeeded");
        } else {
            let reason = result.error.unwrap_or(result.message);
            warn!(service = %service.name, error = %reason, "Auto-restart failed");
            self.registry
                .append_event(EventLogEntry::new(Some(service.id), actions::AUTO_RESTART_FAILED, reason))
                .await?;
        }
        Ok(result.success)
    }

    async fn mark_error(&self, mut service: MonitoredService, error: &RegistryError) {
        service.status = ServiceStatus::Error;
        service.last_checked = Some(Utc::now());
        if let Err(e) = self.registry.update_service(&service).await {
            warn!(service = %service.name, error = %e, "Failed to mark service as Error");
        }
        let entry = EventLogEntry::new(Some(service.id), actions::CHECK_ERROR, error.to_string())
            .with_status(ServiceStatus::Error);
        if let Err(e) = self.registry.append_event(entry).await {
            warn!(service = %service.name, error = %e, "Failed to record check error");
        }
    }

    // ========================================================================
    // Port sweep
    // ========================================================================

    pub(crate) async fn port_sweep(&self) -> TickSummary {
        let mut summary = TickSummary::default();
        let ports = match self.registry.list_tracked_ports().await {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "Failed to list tracked ports");
                return summary;
            }
        };

        for tracked in ports {
            summary.checked += 1;
            let (updated, event) = self.inspect_port(tracked).await;
            if let Err(e) = self.registry.update_tracked_port(&updated).await {
                summary.failed += 1;
                warn!(port = updated.port, error = %e, "Failed to update tracked port");
                continue;
            }
            if let Some(event) = event {
                summary.changed += 1;
                // no subscribers is fine
                let _ = self.port_events.send(event);
            }
        }
        summary
    }

    async fn inspect_port(&self, mut tracked: TrackedPort) -> (TrackedPort, Option<PortEvent>) {
        let was_in_use = tracked.in_use;
        let found = match self.inspector.find_process_by_port(tracked.port).await {
            Ok(found) => found,
            Err(e) => {
                warn!(port = tracked.port, error = %e, "Port inspection failed, treating as free");
                None
            }
        };

        tracked.last_checked = Some(Utc::now());
        let event = match found {
            Some(process) => {
                tracked.in_use = true;
                tracked.pid = Some(process.pid);
                tracked.process_name = Some(process.name.clone());
                (!was_in_use).then(|| PortEvent::Occupied {
                    port: tracked.port,
                    pid: process.pid,
                    process_name: process.name,
                })
            }
            None => {
                tracked.in_use = false;
                tracked.pid = None;
                tracked.process_name = None;
                was_in_use.then_some(PortEvent::Released { port: tracked.port })
            }
        };
        (tracked, event)
    }

    // ========================================================================
    // Process sweep
    // ========================================================================

    pub(crate) async fn process_sweep(&self) -> TickSummary {
        let settings = self.refresh_settings().await;
        let mut summary = TickSummary::default();
        if !settings.ghost_detection_enabled {
            return summary;
        }

        let found = match self.reconciler.detect_all().await {
            Ok(found) => found,
            Err(e) => {
                warn!(error = %e, "Ghost detection failed");
                return summary;
            }
        };

        for (service, ghosts) in found {
            summary.ghosts_found += ghosts.len();
            warn!(service = %service.name, count = ghosts.len(), "Ghost processes detected");
            if !settings.auto_cleanup_ghosts {
                continue;
            }
            match self.reconciler.terminate(&service, ghosts).await {
                Ok(n) => summary.ghosts_terminated += n,
                Err(e) => {
                    summary.failed += 1;
                    warn!(service = %service.name, error = %e, "Ghost cleanup failed");
                }
            }
        }
        summary
    }
}

struct CheckOutcome {
    changed: bool,
    restarted: bool,
}
