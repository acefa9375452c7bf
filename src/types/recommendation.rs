//! Restart recommendation DTO and urgency buckets

use serde::{Deserialize, Serialize};

/// Qualitative urgency bucket derived from score and current status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    #[default]
    Low = 0,
    Medium = 1,
    High = 2,
    Critical = 3,
}

impl std::fmt::Display for Urgency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Urgency::Low => write!(f, "low"),
            Urgency::Medium => write!(f, "medium"),
            Urgency::High => write!(f, "high"),
            Urgency::Critical => write!(f, "critical"),
        }
    }
}

/// The factor that drove the recommendation's reason text
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PrimaryFactor {
    CriticalStatus,
    MemoryLeak,
    TimePattern,
    PerformanceDegradation,
    RisingFailureRate,
    ExtendedUptime,
    HighFailureRate,
    ErraticTransitions,
    HighErrorDensity,
    Composite,
}

impl std::fmt::Display for PrimaryFactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PrimaryFactor::CriticalStatus => "critical status",
            PrimaryFactor::MemoryLeak => "memory leak",
            PrimaryFactor::TimePattern => "time-based pattern",
            PrimaryFactor::PerformanceDegradation => "performance degradation",
            PrimaryFactor::RisingFailureRate => "rising failure rate",
            PrimaryFactor::ExtendedUptime => "extended uptime",
            PrimaryFactor::HighFailureRate => "high failure rate",
            PrimaryFactor::ErraticTransitions => "erratic transitions",
            PrimaryFactor::HighErrorDensity => "high error density",
            PrimaryFactor::Composite => "composite score",
        };
        f.write_str(s)
    }
}

/// Restart recommendation for one service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RestartRecommendation {
    pub service_id: u64,
    pub service_name: String,
    /// 0-100
    pub score: u32,
    pub reason: String,
    pub urgency: Urgency,
    pub primary_factor: PrimaryFactor,
    pub predicted_issues: Vec<String>,
    pub recommended_time_window: String,
    /// 0-100
    pub memory_leak_probability: f64,
    /// Labels of the scoring rules that fired
    pub contributing_factors: Vec<String>,
}
