//! In-memory registry
//!
//! Thread-safe via `RwLock`. Not durable; data is lost on restart.

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{Registry, RegistryError};
use crate::types::{EventLogEntry, GlobalSettings, MonitoredService, TrackedPort, TrackedProcess};

#[derive(Default)]
struct Store {
    services: BTreeMap<u64, MonitoredService>,
    events: Vec<EventLogEntry>,
    settings: GlobalSettings,
    ports: BTreeMap<u16, TrackedPort>,
    processes: BTreeMap<u64, TrackedProcess>,
    next_event_id: u64,
}

/// In-process registry used by tests and the CLI
#[derive(Default)]
pub struct InMemoryRegistry {
    store: RwLock<Store>,
}

fn poisoned<E: std::fmt::Display>(e: E) -> RegistryError {
    RegistryError::Storage(e.to_string())
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: seed services.
    pub fn with_services(self, services: impl IntoIterator<Item = MonitoredService>) -> Self {
        if let Ok(mut store) = self.store.write() {
            for svc in services {
                store.services.insert(svc.id, svc);
            }
        }
        self
    }

    /// Builder: replace global settings.
    pub fn with_settings(self, settings: GlobalSettings) -> Self {
        if let Ok(mut store) = self.store.write() {
            store.settings = settings;
        }
        self
    }

    /// Builder: seed tracked ports.
    pub fn with_ports(self, ports: impl IntoIterator<Item = TrackedPort>) -> Self {
        if let Ok(mut store) = self.store.write() {
            for p in ports {
                store.ports.insert(p.port, p);
            }
        }
        self
    }

    /// Builder: seed tracked processes.
    pub fn with_processes(self, processes: impl IntoIterator<Item = TrackedProcess>) -> Self {
        if let Ok(mut store) = self.store.write() {
            for p in processes {
                store.processes.insert(p.id, p);
            }
        }
        self
    }

    /// Builder: seed historical events, keeping their timestamps.
    pub fn with_events(self, events: impl IntoIterator<Item = EventLogEntry>) -> Self {
        if let Ok(mut store) = self.store.write() {
            for e in events {
                push_event(&mut store, e);
            }
        }
        self
    }

    /// Snapshot of the whole log in append order.
    pub fn events(&self) -> Vec<EventLogEntry> {
        self.store
            .read()
            .map(|s| s.events.clone())
            .unwrap_or_default()
    }

    /// Snapshot of one service's entries in append order.
    pub fn events_for(&self, service_id: u64) -> Vec<EventLogEntry> {
        self.events()
            .into_iter()
            .filter(|e| e.service_id == Some(service_id))
            .collect()
    }
}

fn push_event(store: &mut Store, mut entry: EventLogEntry) -> EventLogEntry {
    store.next_event_id += 1;
    entry.id = store.next_event_id;
    store.events.push(entry.clone());
    entry
}

#[async_trait]
impl Registry for InMemoryRegistry {
    async fn list_services(&self) -> Result<Vec<MonitoredService>, RegistryError> {
        let store = self.store.read().map_err(poisoned)?;
        Ok(store.services.values().cloned().collect())
    }

    async fn get_service(&self, id: u64) -> Result<Option<MonitoredService>, RegistryError> {
        let store = self.store.read().map_err(poisoned)?;
        Ok(store.services.get(&id).cloned())
    }

    async fn update_service(&self, service: &MonitoredService) -> Result<(), RegistryError> {
        let mut store = self.store.write().map_err(poisoned)?;
        match store.services.get_mut(&service.id) {
            Some(existing) => {
                *existing = service.clone();
                Ok(())
            }
            None => Err(RegistryError::NotFound { kind: "service", id: service.id }),
        }
    }

    async fn append_event(&self, entry: EventLogEntry) -> Result<EventLogEntry, RegistryError> {
        let mut store = self.store.write().map_err(poisoned)?;
        Ok(push_event(&mut store, entry))
    }

    async fn query_events(
        &self,
        service_id: u64,
        since: DateTime<Utc>,
    ) -> Result<Vec<EventLogEntry>, RegistryError> {
        let store = self.store.read().map_err(poisoned)?;
        let mut events: Vec<EventLogEntry> = store
            .events
            .iter()
            .filter(|e| e.service_id == Some(service_id) && e.timestamp >= since)
            .cloned()
            .collect();
        // stable: equal timestamps keep append order
        events.sort_by_key(|e| e.timestamp);
        Ok(events)
    }

    async fn get_settings(&self) -> Result<GlobalSettings, RegistryError> {
        let store = self.store.read().map_err(poisoned)?;
        Ok(store.settings.clone())
    }

    async fn update_settings(&self, settings: &GlobalSettings) -> Result<(), RegistryError> {
        let mut store = self.store.write().map_err(poisoned)?;
        store.settings = settings.clone();
        Ok(())
    }

    async fn list_tracked_ports(&self) -> Result<Vec<TrackedPort>, RegistryError> {
        let store = self.store.read().map_err(poisoned)?;
        Ok(store.ports.values().cloned().collect())
    }

    async fn update_tracked_port(&self, port: &TrackedPort) -> Result<(), RegistryError> {
        let mut store = self.store.write().map_err(poisoned)?;
        store.ports.insert(port.port, port.clone());
        Ok(())
    }

    async fn list_tracked_processes(&self) -> Result<Vec<TrackedProcess>, RegistryError> {
        let store = self.store.read().map_err(poisoned)?;
        Ok(store.processes.values().cloned().collect())
    }

    async fn update_tracked_process(&self, process: &TrackedProcess) -> Result<(), RegistryError> {
        let mut store = self.store.write().map_err(poisoned)?;
        match store.processes.get_mut(&process.id) {
            Some(existing) => {
                *existing = process.clone();
                Ok(())
            }
            None => Err(RegistryError::NotFound { kind: "process", id: process.id }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{actions, ServiceStatus};
    use chrono::Duration;

    #[tokio::test]
    async fn test_append_assigns_increasing_ids() {
        let registry = InMemoryRegistry::new();
        let a = registry
            .append_event(EventLogEntry::new(Some(1), actions::STATUS_CHANGE, "a"))
            .await
            .expect("append");
        let b = registry
            .append_event(EventLogEntry::new(None, "Settings Updated", "b"))
            .await
            .expect("append");
        assert_eq!(a.id + 1, b.id);
    }

    #[tokio::test]
    async fn test_query_is_windowed_and_sorted() {
        let now = Utc::now();
        let registry = InMemoryRegistry::new().with_events([
            EventLogEntry::new(Some(1), actions::STATUS_CHANGE, "new")
                .with_status(ServiceStatus::Running)
                .at(now - Duration::hours(1)),
            EventLogEntry::new(Some(1), actions::STATUS_CHANGE, "ancient")
                .at(now - Duration::days(30)),
            EventLogEntry::new(Some(1), actions::STATUS_CHANGE, "old")
                .at(now - Duration::days(2)),
            EventLogEntry::new(Some(2), actions::STATUS_CHANGE, "other service")
                .at(now - Duration::hours(2)),
        ]);

        let events = registry
            .query_events(1, now - Duration::days(7))
            .await
            .expect("query");
        let details: Vec<_> = events.iter().map(|e| e.details.as_str()).collect();
        assert_eq!(details, vec!["old", "new"]);
    }

    #[tokio::test]
    async fn test_update_unknown_service_is_not_found() {
        let registry = InMemoryRegistry::new();
        let svc = MonitoredService::new(9, "ghost", "localhost", 1);
        assert!(matches!(
            registry.update_service(&svc).await,
            Err(RegistryError::NotFound { id: 9, .. })
        ));
    }
}
