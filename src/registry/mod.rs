//! Registry: the external store of services, settings, tracked ports/processes
//! and the append-only event log
//!
//! The core never owns this data; it reads through the `Registry` trait and
//! requests updates. Backends:
//! - `InMemoryRegistry`: in-process store for tests, demos and the CLI
//! - A database-backed registry lives outside this crate

mod memory;
pub mod fleet_file;

pub use memory::InMemoryRegistry;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::types::{EventLogEntry, GlobalSettings, MonitoredService, TrackedPort, TrackedProcess};

/// Registry errors
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: u64 },
    #[error("storage error: {0}")]
    Storage(String),
}

/// Storage seam consumed by analysis, control and scheduling.
///
/// Implementations must be thread-safe (Send + Sync) for shared access
/// across scheduler tasks. Writes are last-write-wins; event appends are
/// the only ordering guarantee.
#[async_trait]
pub trait Registry: Send + Sync {
    async fn list_services(&self) -> Result<Vec<MonitoredService>, RegistryError>;

    async fn get_service(&self, id: u64) -> Result<Option<MonitoredService>, RegistryError>;

    /// Replace the stored record with the same id.
    async fn update_service(&self, service: &MonitoredService) -> Result<(), RegistryError>;

    /// Append an entry, returning it with its assigned id.
    async fn append_event(&self, entry: EventLogEntry) -> Result<EventLogEntry, RegistryError>;

    /// Entries for one service at or after `since`, oldest first.
    async fn query_events(
        &self,
        service_id: u64,
        since: DateTime<Utc>,
    ) -> Result<Vec<EventLogEntry>, RegistryError>;

    async fn get_settings(&self) -> Result<GlobalSettings, RegistryError>;

    async fn update_settings(&self, settings: &GlobalSettings) -> Result<(), RegistryError>;

    async fn list_tracked_ports(&self) -> Result<Vec<TrackedPort>, RegistryError>;

    async fn update_tracked_port(&self, port: &TrackedPort) -> Result<(), RegistryError>;

    async fn list_tracked_processes(&self) -> Result<Vec<TrackedProcess>, RegistryError>;

    async fn update_tracked_process(&self, process: &TrackedProcess) -> Result<(), RegistryError>;
}
