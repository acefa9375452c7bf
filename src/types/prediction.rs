//! Failure forecast types: hourly slots, high-risk periods, per-service prediction

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Risk label for a failure probability
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    #[default]
    Low = 0,
    Medium = 1,
    High = 2,
    Critical = 3,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "LOW"),
            RiskLevel::Medium => write!(f, "MEDIUM"),
            RiskLevel::High => write!(f, "HIGH"),
            RiskLevel::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Service metrics projected for a risky slot
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PredictedMetrics {
    /// Multiplier on baseline response time, 1-3
    pub response_time_multiplier: f64,
    /// Percent of failing requests
    pub error_rate: f64,
    /// Percent availability
    pub availability: f64,
    /// Percent resource utilisation
    pub resource_utilization: f64,
}

/// One hour of the forecast horizon
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PredictionTimeSlot {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// 0-1
    pub failure_probability: f64,
    /// 0-100
    pub confidence: f64,
    pub predicted_metrics: Option<PredictedMetrics>,
    pub contributing_factors: Vec<String>,
}

/// A slot whose probability crossed the alerting threshold
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HighRiskPeriod {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub failure_probability: f64,
    pub risk_level: RiskLevel,
    pub contributing_factors: Vec<String>,
}

/// 24-hour failure forecast for one service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServicePrediction {
    pub service_id: u64,
    pub service_name: String,
    pub generated_at: DateTime<Utc>,
    pub time_slots: Vec<PredictionTimeSlot>,
    /// Confidence-weighted mean of slot probabilities, 0-1
    pub aggregated_failure_probability: f64,
    /// Mean slot confidence, 0-100
    pub confidence: f64,
    pub risk_level: RiskLevel,
    pub high_risk_periods: Vec<HighRiskPeriod>,
    pub recommended_actions: Vec<String>,
    /// Index into `time_slots` of the most likely failure hour
    pub peak_slot: Option<usize>,
}
