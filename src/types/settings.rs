//! Registry-owned global settings, read by the scheduler on every tick

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Singleton monitoring settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GlobalSettings {
    pub service_check_interval_secs: u64,
    pub endpoint_check_interval_secs: u64,
    pub port_check_interval_secs: u64,
    pub process_check_interval_secs: u64,
    pub auto_restart: bool,
    pub ghost_detection_enabled: bool,
    pub auto_cleanup_ghosts: bool,
    pub endpoint_timeout_ms: u64,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            service_check_interval_secs: 30,
            endpoint_check_interval_secs: 60,
            port_check_interval_secs: 60,
            process_check_interval_secs: 120,
            auto_restart: false,
            ghost_detection_enabled: true,
            auto_cleanup_ghosts: false,
            endpoint_timeout_ms: 5_000,
        }
    }
}

impl GlobalSettings {
    pub fn service_check_interval(&self) -> Duration {
        Duration::from_secs(self.service_check_interval_secs.max(1))
    }

    pub fn endpoint_check_interval(&self) -> Duration {
        Duration::from_secs(self.endpoint_check_interval_secs.max(1))
    }

    pub fn port_check_interval(&self) -> Duration {
        Duration::from_secs(self.port_check_interval_secs.max(1))
    }

    pub fn process_check_interval(&self) -> Duration {
        Duration::from_secs(self.process_check_interval_secs.max(1))
    }

    /// Whether any timer interval differs, which forces a scheduler restart.
    pub fn intervals_differ(&self, other: &Self) -> bool {
        self.service_check_interval_secs != other.service_check_interval_secs
            || self.endpoint_check_interval_secs != other.endpoint_check_interval_secs
            || self.port_check_interval_secs != other.port_check_interval_secs
            || self.process_check_interval_secs != other.process_check_interval_secs
    }
}
