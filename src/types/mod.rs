//! Shared data structures for the service health pipeline
//!
//! - Registry records: MonitoredService, TrackedPort, TrackedProcess, GlobalSettings
//! - Event log: EventLogEntry (sole source of derived metrics)
//! - Derived: HealthMetrics, TimeBasedPattern, RestartRecommendation, ServicePrediction
//! - Control: ControlResult

mod service;
mod event;
mod settings;
mod metrics;
mod recommendation;
mod prediction;
mod control;

pub use service::*;
pub use event::*;
pub use settings::*;
pub use metrics::*;
pub use recommendation::*;
pub use prediction::*;
pub use control::*;
