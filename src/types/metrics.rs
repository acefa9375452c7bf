//! Derived health metrics (recomputed from the event log on every request)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Direction of error frequency between the older and newer half of the window
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ErrorTrend {
    Increasing,
    Decreasing,
    #[default]
    Stable,
}

impl std::fmt::Display for ErrorTrend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorTrend::Increasing => write!(f, "increasing"),
            ErrorTrend::Decreasing => write!(f, "decreasing"),
            ErrorTrend::Stable => write!(f, "stable"),
        }
    }
}

/// One contiguous interval during which the service was recorded Running
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct UptimeSession {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Still open (service currently Running), end extended to "now"
    pub open: bool,
}

impl UptimeSession {
    pub fn duration_minutes(&self) -> f64 {
        (self.end - self.start).num_milliseconds().max(0) as f64 / 60_000.0
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts <= self.end
    }
}

/// A recurring (hour-of-day, day-of-week) slot with elevated failures
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TimeBasedPattern {
    /// UTC hour, 0-23
    pub hour: u32,
    /// 0 = Sunday .. 6 = Saturday
    pub day_of_week: u32,
    /// Percent of log entries in this slot that were errors
    pub failure_rate: f64,
    /// 0-100
    pub confidence: f64,
    pub error_count: usize,
}

impl TimeBasedPattern {
    pub fn matches(&self, hour: u32, day_of_week: u32) -> bool {
        self.hour == hour && self.day_of_week == day_of_week
    }
}

/// Quantitative health picture for one service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthMetrics {
    pub service_id: u64,
    /// errors / status changes x 100
    pub failure_rate: f64,
    /// Mean uptime session length (minutes)
    pub average_uptime: f64,
    /// Restarts per observed day
    pub restart_frequency: f64,
    pub status_transitions: usize,
    pub error_occurrences: usize,
    pub last_restarted: Option<DateTime<Utc>>,
    pub error_frequency_trend: ErrorTrend,
    pub time_based_patterns: Vec<TimeBasedPattern>,
    /// Errors per operating hour
    pub error_density: f64,
    /// Coefficient of variation of session durations
    pub uptime_stability: f64,
    /// 0-100
    pub performance_degradation: f64,
    /// 0-100
    pub memory_leak_likelihood: f64,
    pub days_since_last_restart: f64,
    /// Length of the open session, 0 when not Running (minutes)
    pub current_uptime: f64,
    /// Sum of all session durations (minutes)
    pub total_uptime: f64,
    pub session_count: usize,
    pub log_count: usize,
}

impl HealthMetrics {
    pub fn average_uptime_hours(&self) -> f64 {
        self.average_uptime / 60.0
    }

    /// Highest-confidence pattern, patterns are kept sorted descending.
    pub fn strongest_pattern(&self) -> Option<&TimeBasedPattern> {
        self.time_based_patterns.first()
    }
}
