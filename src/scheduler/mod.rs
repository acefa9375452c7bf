//! Monitor Scheduler
//!
//! Owns four independent timers (service status, endpoint, port and process
//! checks), each a spawned task driven by its own `tokio::time::interval`
//! and stopped through a shared `CancellationToken`. A tick runs inside its
//! timer loop, so ticks of one timer never overlap; a late tick delays the
//! next one instead of bursting.
//!
//! Interval changes need a full stop-then-start (`reconfigure`); the other
//! settings are re-read from the registry on every tick.

mod ticks;

pub use ticks::TickSummary;

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use serde::Serialize;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::{defaults, SentinelConfig};
use crate::control::{GhostProcessReconciler, RestartController};
use crate::inspector::ProcessInspector;
use crate::probe::{ProbeError, StatusProbe};
use crate::registry::{Registry, RegistryError};
use crate::types::GlobalSettings;
use ticks::{SchedulerCore, SweepKind};

/// Occupancy change observed by the port sweep
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PortEvent {
    Occupied { port: u16, pid: u32, process_name: String },
    Released { port: u16 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    ServiceStatus,
    Endpoint,
    Port,
    Process,
}

impl std::fmt::Display for TimerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimerKind::ServiceStatus => write!(f, "service-status"),
            TimerKind::Endpoint => write!(f, "endpoint"),
            TimerKind::Port => write!(f, "port"),
            TimerKind::Process => write!(f, "process"),
        }
    }
}

impl TimerKind {
    pub const ALL: [Self; 4] = [Self::ServiceStatus, Self::Endpoint, Self::Port, Self::Process];

    fn period(self, settings: &GlobalSettings) -> Duration {
        match self {
            Self::ServiceStatus => settings.service_check_interval(),
            Self::Endpoint => settings.endpoint_check_interval(),
            Self::Port => settings.port_check_interval(),
            Self::Process => settings.process_check_interval(),
        }
    }
}

struct Timers {
    cancel: CancellationToken,
    tasks: JoinSet<TimerKind>,
}

pub struct MonitorScheduler {
    core: Arc<SchedulerCore>,
    timers: Mutex<Option<Timers>>,
}

impl MonitorScheduler {
    pub fn new(
        registry: Arc<dyn Registry>,
        inspector: Arc<dyn ProcessInspector>,
        config: &SentinelConfig,
    ) -> Result<Self, ProbeError> {
        let probe = StatusProbe::new(&config.probe)?;
        let controller = RestartController::new(registry.clone(), inspector.clone(), &config.control);
        let reconciler = GhostProcessReconciler::new(registry.clone(), inspector.clone(), config.control.simulation);
        let (port_events, _) = broadcast::channel(defaults::PORT_EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            core: Arc::new(SchedulerCore {
                registry,
                inspector,
                probe,
                controller,
                reconciler,
                settings: ArcSwap::from_pointee(GlobalSettings::default()),
                port_events,
            }),
            timers: Mutex::new(None),
        })
    }

    /// Receive port occupancy changes.
    pub fn subscribe(&self) -> broadcast::Receiver<PortEvent> {
        self.core.port_events.subscribe()
    }

    /// Latest settings snapshot the timers are working from.
    pub fn settings(&self) -> Arc<GlobalSettings> {
        self.core.settings.load_full()
    }

    pub async fn is_running(&self) -> bool {
        self.timers.lock().await.is_some()
    }

    /// Load settings and spawn the four timers. No-op when already running.
    pub async fn start(&self) -> Result<(), RegistryError> {
        let mut timers = self.timers.lock().await;
        if timers.is_some() {
            warn!("Scheduler already running");
            return Ok(());
        }

        let settings = self.core.registry.get_settings().await?;
        self.core.settings.store(Arc::new(settings.clone()));

        let cancel = CancellationToken::new();
        let mut tasks = JoinSet::new();
        for kind in TimerKind::ALL {
            spawn_timer(&mut tasks, self.core.clone(), kind, kind.period(&settings), cancel.clone());
        }

        info!(
            status_secs = settings.service_check_interval_secs,
            endpoint_secs = settings.endpoint_check_interval_secs,
            port_secs = settings.port_check_interval_secs,
            process_secs = settings.process_check_interval_secs,
            auto_restart = settings.auto_restart,
            "Monitor scheduler started"
        );
        *timers = Some(Timers { cancel, tasks });
        Ok(())
    }

    /// Cancel all timers and wait for in-flight ticks to finish.
    pub async fn stop(&self) {
        let Some(Timers { cancel, mut tasks }) = self.timers.lock().await.take() else {
            return;
        };
        cancel.cancel();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(kind) => info!(timer = %kind, "Timer stopped"),
                Err(e) => warn!(error = %e, "Timer task ended abnormally"),
            }
        }
        info!("Monitor scheduler stopped");
    }

    /// Stop, persist the new settings, start again.
    pub async fn reconfigure(&self, settings: GlobalSettings) -> Result<(), RegistryError> {
        let changed = self.core.settings.load().intervals_differ(&settings);
        self.stop().await;
        self.core.registry.update_settings(&settings).await?;
        info!(intervals_changed = changed, "Settings updated, restarting timers");
        self.start().await
    }

    // ========================================================================
    // Single sweeps (used by the timers, callable directly)
    // ========================================================================

    pub async fn run_status_check(&self) -> TickSummary {
        self.core.service_sweep(SweepKind::Status).await
    }

    pub async fn run_endpoint_check(&self) -> TickSummary {
        self.core.service_sweep(SweepKind::Endpoint).await
    }

    pub async fn run_port_check(&self) -> TickSummary {
        self.core.port_sweep().await
    }

    pub async fn run_process_check(&self) -> TickSummary {
        self.core.process_sweep().await
    }
}

fn spawn_timer(
    tasks: &mut JoinSet<TimerKind>,
    core: Arc<SchedulerCore>,
    kind: TimerKind,
    period: Duration,
    cancel: CancellationToken,
) {
    tasks.spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = cancel.cancelled() => return kind,
                _ = interval.tick() => {
                    let summary = match kind {
                        TimerKind::ServiceStatus => core.service_sweep(SweepKind::Status).await,
                        TimerKind::Endpoint => core.service_sweep(SweepKind::Endpoint).await,
                        TimerKind::Port => core.port_sweep().await,
                        TimerKind::Process => core.process_sweep().await,
                    };
                    tracing::debug!(timer = %kind, ?summary, "Tick complete");
                }
            }
        }
    });
}
