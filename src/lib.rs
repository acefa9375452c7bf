//! Service Sentinel: fleet health intelligence and restart control
//!
//! Watches a fleet of registered network services, derives health metrics
//! from their event logs, scores them for restart urgency, forecasts
//! near-term failure windows and drives remediation.
//!
//! ## Pipeline
//!
//! - **Probe**: HTTP/TCP reachability classified into a `ServiceStatus`
//! - **Analysis**: event-log aggregation and pattern mining into `HealthMetrics`
//! - **Scoring**: additive rule table producing a `RestartRecommendation`
//! - **Prediction**: hourly failure-probability forecast (`ServicePrediction`)
//! - **Control**: validated start/stop/restart and ghost-process cleanup
//! - **Scheduler**: four timers driving probes, port sweeps and ghost sweeps
//!
//! Storage and OS process enumeration sit behind the `Registry` and
//! `ProcessInspector` traits.

pub mod analysis;
pub mod config;
pub mod control;
pub mod inspector;
pub mod intelligence;
pub mod prediction;
pub mod probe;
pub mod registry;
pub mod scheduler;
pub mod scoring;
pub mod types;

pub use config::SentinelConfig;

pub use types::{
    ControlResult, EventLogEntry, GlobalSettings, HealthMetrics, MonitoredService, RestartRecommendation,
    RiskLevel, ServicePrediction, ServiceStatus, ServiceType, Urgency,
};

pub use analysis::HealthAnalyzer;
pub use control::{GhostProcessReconciler, RestartController};
pub use inspector::{ProcessInspector, ShellInspector};
pub use intelligence::HealthIntelligence;
pub use prediction::PredictionEngine;
pub use probe::StatusProbe;
pub use registry::{InMemoryRegistry, Registry, RegistryError};
pub use scheduler::{MonitorScheduler, PortEvent};
pub use scoring::RecommendationScorer;
