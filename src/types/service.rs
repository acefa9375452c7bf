//! Service registry records: MonitoredService, TrackedPort, TrackedProcess

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Service Status
// ============================================================================

/// Last observed reachability of a monitored service
///
/// Deserializes case-insensitively so fleet files and external writers may
/// use `"running"` as well as `"Running"`.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash, Default)]
pub enum ServiceStatus {
    #[default]
    Stopped,
    Running,
    Unreachable,
    Error,
}

impl ServiceStatus {
    /// Statuses that trigger auto-restart when the scheduler observes them
    pub const fn is_down(self) -> bool {
        matches!(self, Self::Stopped | Self::Unreachable | Self::Error)
    }

    /// Error and Unreachable always escalate urgency to critical
    pub const fn is_critical(self) -> bool {
        matches!(self, Self::Unreachable | Self::Error)
    }

    /// Parse the status text recorded on an event log entry.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stopped" => Some(Self::Stopped),
            "running" => Some(Self::Running),
            "unreachable" => Some(Self::Unreachable),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stopped => "Stopped",
            Self::Running => "Running",
            Self::Unreachable => "Unreachable",
            Self::Error => "Error",
        }
    }
}

impl<'de> Deserialize<'de> for ServiceStatus {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).ok_or_else(|| {
            serde::de::Error::unknown_variant(raw.trim(), &["Stopped", "Running", "Unreachable", "Error"])
        })
    }
}

impl std::fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of service, used to tailor probes and recommended actions
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum ServiceType {
    Frontend,
    Backend,
    Database,
    #[default]
    Other,
}

impl std::fmt::Display for ServiceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceType::Frontend => write!(f, "Frontend"),
            ServiceType::Backend => write!(f, "Backend"),
            ServiceType::Database => write!(f, "Database"),
            ServiceType::Other => write!(f, "Other"),
        }
    }
}

// ============================================================================
// Monitored Service
// ============================================================================

/// A registered network service. Owned by the registry; the core only
/// reads it and requests updates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonitoredService {
    pub id: u64,
    pub name: String,
    pub url: String,
    pub port: u16,
    #[serde(default)]
    pub additional_ports: Vec<u16>,
    #[serde(default)]
    pub service_type: ServiceType,
    #[serde(default)]
    pub status: ServiceStatus,
    #[serde(default)]
    pub last_checked: Option<DateTime<Utc>>,
    #[serde(default)]
    pub health_check_path: Option<String>,
    #[serde(default = "default_true")]
    pub ghost_detection: bool,
}

const fn default_true() -> bool {
    true
}

impl MonitoredService {
    pub fn new(id: u64, name: impl Into<String>, url: impl Into<String>, port: u16) -> Self {
        Self {
            id,
            name: name.into(),
            url: url.into(),
            port,
            additional_ports: Vec::new(),
            service_type: ServiceType::Other,
            status: ServiceStatus::Stopped,
            last_checked: None,
            health_check_path: None,
            ghost_detection: true,
        }
    }

    pub fn with_type(mut self, service_type: ServiceType) -> Self {
        self.service_type = service_type;
        self
    }

    pub fn with_status(mut self, status: ServiceStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_additional_ports(mut self, ports: Vec<u16>) -> Self {
        self.additional_ports = ports;
        self
    }

    /// Primary port followed by the additional ports.
    pub fn all_ports(&self) -> impl Iterator<Item = u16> + '_ {
        std::iter::once(self.port).chain(self.additional_ports.iter().copied())
    }
}

// ============================================================================
// Tracked Ports and Processes
// ============================================================================

/// A port the registry tracks for occupancy, optionally owned by a service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrackedPort {
    pub port: u16,
    #[serde(default)]
    pub service_id: Option<u64>,
    #[serde(default)]
    pub in_use: bool,
    #[serde(default)]
    pub pid: Option<u32>,
    #[serde(default)]
    pub process_name: Option<String>,
    #[serde(default)]
    pub last_checked: Option<DateTime<Utc>>,
}

impl TrackedPort {
    pub fn new(port: u16, service_id: Option<u64>) -> Self {
        Self {
            port,
            service_id,
            in_use: false,
            pid: None,
            process_name: None,
            last_checked: None,
        }
    }
}

/// Recorded state of a tracked OS process
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum ProcessStatus {
    #[default]
    Running,
    Stopped,
    Terminated,
}

impl std::fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessStatus::Running => write!(f, "Running"),
            ProcessStatus::Stopped => write!(f, "Stopped"),
            ProcessStatus::Terminated => write!(f, "Terminated"),
        }
    }
}

/// A process the registry believes belongs to a service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrackedProcess {
    pub id: u64,
    pub service_id: u64,
    #[serde(default)]
    pub pid: Option<u32>,
    pub name: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub status: ProcessStatus,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse_is_case_insensitive() {
        assert_eq!(ServiceStatus::parse("running"), Some(ServiceStatus::Running));
        assert_eq!(ServiceStatus::parse(" Unreachable "), Some(ServiceStatus::Unreachable));
        assert_eq!(ServiceStatus::parse("ERROR"), Some(ServiceStatus::Error));
        assert_eq!(ServiceStatus::parse("starting"), None);
    }

    #[test]
    fn test_status_deserializes_leniently() {
        let status: ServiceStatus = serde_json::from_str("\"running\"").expect("lowercase");
        assert_eq!(status, ServiceStatus::Running);
        let status: ServiceStatus = serde_json::from_str("\"Unreachable\"").expect("canonical");
        assert_eq!(status, ServiceStatus::Unreachable);
        assert!(serde_json::from_str::<ServiceStatus>("\"starting\"").is_err());
        assert_eq!(serde_json::to_string(&ServiceStatus::Error).expect("serialize"), "\"Error\"");
    }

    #[test]
    fn test_down_and_critical_sets() {
        assert!(ServiceStatus::Stopped.is_down());
        assert!(!ServiceStatus::Stopped.is_critical());
        assert!(ServiceStatus::Error.is_critical());
        assert!(!ServiceStatus::Running.is_down());
    }

    #[test]
    fn test_all_ports_lists_primary_first() {
        let svc = MonitoredService::new(1, "api", "localhost", 8080)
            .with_additional_ports(vec![9090, 9091]);
        assert_eq!(svc.all_ports().collect::<Vec<_>>(), vec![8080, 9090, 9091]);
    }
}
