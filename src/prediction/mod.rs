//! Prediction Engine
//!
//! Projects failure probability over a rolling horizon of hourly slots
//! starting one hour from now. Each slot sums weighted contributions from
//! the current status and the mined health signals; every contribution
//! also records a confidence sample.
//!
//! | Contribution | Weight | Confidence |
//! |--------------|--------|------------|
//! | Status Error / Unreachable / Stopped | 0.8 / 0.9 / 0.1 | 90 / 95 / 80 |
//! | Failure rate >15% / >5% | 0.3 / 0.15 x 0.8 history | 70 |
//! | Memory leak >20 | leak/100 x 0.4 (x0.7 below 1.5x threshold) | leak |
//! | Matching time pattern | rate x confidence x 0.6 | pattern |
//! | Increasing error trend | 0.15 | 65 |
//! | Degradation >10 | pd/100 x 0.3 | 60 |
//! | Error density >0.5/h | min(1, d/5) x 0.2 | 60 |
//! | Days since restart > interval | min(1, days/4 interval) x 0.15 | 55 |

pub mod actions;

pub use actions::{recommended_actions, ActionContext, ActionRule, ACTION_RULES};

use chrono::{DateTime, Datelike, Duration, Timelike, Utc};

use crate::config::{defaults, AnalysisConfig, PredictionConfig};
use crate::types::{
    ErrorTrend, HealthMetrics, HighRiskPeriod, MonitoredService, PredictedMetrics, PredictionTimeSlot,
    RiskLevel, ServicePrediction, ServiceStatus,
};

// ============================================================================
// Weights
// ============================================================================

const HISTORY_WEIGHT: f64 = 0.8;
const LEAK_WEIGHT: f64 = 0.4;
const LEAK_EARLY_FACTOR: f64 = 0.7;
const LEAK_FULL_WEIGHT_MULTIPLIER: f64 = 1.5;
const PATTERN_WEIGHT: f64 = 0.6;
const TREND_WEIGHT: f64 = 0.15;
const DEGRADATION_WEIGHT: f64 = 0.3;
const DENSITY_WEIGHT: f64 = 0.2;
const RESTART_AGE_WEIGHT: f64 = 0.15;

/// Probability at which the classifier reports medium risk
pub const MEDIUM_RISK_THRESHOLD: f64 = 0.5;

/// A single weighted contribution to one slot
#[derive(Debug, Clone, PartialEq)]
struct Contribution {
    label: String,
    probability: f64,
    confidence: f64,
}

impl Contribution {
    fn new(label: impl Into<String>, probability: f64, confidence: f64) -> Self {
        Self {
            label: label.into(),
            probability,
            confidence,
        }
    }
}

pub struct PredictionEngine {
    config: PredictionConfig,
    leak_threshold_hours: f64,
    restart_interval_days: f64,
}

impl PredictionEngine {
    pub fn new(prediction: &PredictionConfig, analysis: &AnalysisConfig) -> Self {
        Self {
            config: prediction.clone(),
            leak_threshold_hours: analysis.leak_threshold_hours,
            restart_interval_days: analysis.restart_interval_days,
        }
    }

    /// Risk label for a probability.
    pub fn classify(&self, probability: f64) -> RiskLevel {
        if probability >= self.config.critical_threshold {
            RiskLevel::Critical
        } else if probability >= self.config.high_risk_threshold {
            RiskLevel::High
        } else if probability >= MEDIUM_RISK_THRESHOLD {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    pub fn predict(&self, service: &MonitoredService, metrics: &HealthMetrics, now: DateTime<Utc>) -> ServicePrediction {
        let time_slots: Vec<PredictionTimeSlot> = (1..=self.config.horizon_hours)
            .map(|hours_ahead| self.build_slot(service, metrics, now, hours_ahead))
            .collect();

        let aggregated_failure_probability = aggregate_probability(&time_slots);
        let confidence = if time_slots.is_empty() {
            defaults::DEFAULT_SLOT_CONFIDENCE
        } else {
            time_slots.iter().map(|s| s.confidence).sum::<f64>() / time_slots.len() as f64
        };

        let high_risk_periods: Vec<HighRiskPeriod> = time_slots
            .iter()
            .filter(|s| s.failure_probability >= self.config.high_risk_threshold)
            .map(|s| HighRiskPeriod {
                start_time: s.start_time,
                end_time: s.end_time,
                failure_probability: s.failure_probability,
                risk_level: self.classify(s.failure_probability),
                contributing_factors: s.contributing_factors.clone(),
            })
            .collect();

        let peak_slot = time_slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.failure_probability > 0.0)
            .fold(None::<(usize, f64)>, |best, (i, s)| match best {
                Some((_, p)) if p >= s.failure_probability => best,
                _ => Some((i, s.failure_probability)),
            })
            .map(|(i, _)| i);

        let mut prediction = ServicePrediction {
            service_id: service.id,
            service_name: service.name.clone(),
            generated_at: now,
            time_slots,
            aggregated_failure_probability,
            confidence,
            risk_level: self.classify(aggregated_failure_probability),
            high_risk_periods,
            recommended_actions: Vec::new(),
            peak_slot,
        };

        prediction.recommended_actions = recommended_actions(&ActionContext {
            service,
            metrics,
            prediction: &prediction,
            restart_interval_days: self.restart_interval_days,
        });

        tracing::debug!(
            service = %service.name,
            probability = prediction.aggregated_failure_probability,
            risk = %prediction.risk_level,
            high_risk_periods = prediction.high_risk_periods.len(),
            "Prediction generated"
        );

        prediction
    }

    fn build_slot(
        &self,
        service: &MonitoredService,
        metrics: &HealthMetrics,
        now: DateTime<Utc>,
        hours_ahead: u32,
    ) -> PredictionTimeSlot {
        let start_time = now + Duration::hours(i64::from(hours_ahead));
        let end_time = start_time + Duration::hours(1);
        let contributions = self.contributions(service.status, metrics, start_time, hours_ahead);

        let failure_probability = contributions
            .iter()
            .map(|c| c.probability)
            .sum::<f64>()
            .clamp(0.0, 1.0);
        let confidence = if contributions.is_empty() {
            defaults::DEFAULT_SLOT_CONFIDENCE
        } else {
            contributions.iter().map(|c| c.confidence).sum::<f64>() / contributions.len() as f64
        };
        let predicted_metrics =
            (failure_probability > self.config.predicted_metrics_threshold).then(|| predicted_metrics(failure_probability));

        PredictionTimeSlot {
            start_time,
            end_time,
            failure_probability,
            confidence,
            predicted_metrics,
            contributing_factors: contributions.into_iter().map(|c| c.label).collect(),
        }
    }

    fn contributions(
        &self,
        status: ServiceStatus,
        metrics: &HealthMetrics,
        slot_start: DateTime<Utc>,
        hours_ahead: u32,
    ) -> Vec<Contribution> {
        let mut out = Vec::new();

        match status {
            ServiceStatus::Error => out.push(Contribution::new("service in error state", 0.8, 90.0)),
            ServiceStatus::Unreachable => out.push(Contribution::new("service unreachable", 0.9, 95.0)),
            ServiceStatus::Stopped => out.push(Contribution::new("service stopped", 0.1, 80.0)),
            ServiceStatus::Running => {}
        }

        if metrics.failure_rate > 15.0 {
            out.push(Contribution::new("high historical failure rate", 0.3 * HISTORY_WEIGHT, 70.0));
        } else if metrics.failure_rate > 5.0 {
            out.push(Contribution::new("elevated historical failure rate", 0.15 * HISTORY_WEIGHT, 70.0));
        }

        if metrics.memory_leak_likelihood > 20.0 {
            let projected_hours = metrics.current_uptime / 60.0 + f64::from(hours_ahead);
            let mut weight = metrics.memory_leak_likelihood / 100.0 * LEAK_WEIGHT;
            if projected_hours <= LEAK_FULL_WEIGHT_MULTIPLIER * self.leak_threshold_hours {
                weight *= LEAK_EARLY_FACTOR;
            }
            out.push(Contribution::new(
                format!("memory leak at {projected_hours:.0}h projected uptime"),
                weight,
                metrics.memory_leak_likelihood,
            ));
        }

        let (hour, day) = (slot_start.hour(), slot_start.weekday().num_days_from_sunday());
        if let Some(p) = metrics.time_based_patterns.iter().find(|p| p.matches(hour, day)) {
            out.push(Contribution::new(
                format!("recurring failures at {:02}:00 UTC", p.hour),
                p.failure_rate / 100.0 * p.confidence / 100.0 * PATTERN_WEIGHT,
                p.confidence,
            ));
        }

        if metrics.error_frequency_trend == ErrorTrend::Increasing {
            out.push(Contribution::new("increasing error frequency", TREND_WEIGHT, 65.0));
        }

        if metrics.performance_degradation > 10.0 {
            out.push(Contribution::new(
                "performance degradation",
                metrics.performance_degradation / 100.0 * DEGRADATION_WEIGHT,
                60.0,
            ));
        }

        if metrics.error_density > 0.5 {
            out.push(Contribution::new(
                "high error density",
                (metrics.error_density / 5.0).min(1.0) * DENSITY_WEIGHT,
                60.0,
            ));
        }

        let days = metrics.days_since_last_restart;
        if days > self.restart_interval_days {
            out.push(Contribution::new(
                "restart overdue",
                (days / (4.0 * self.restart_interval_days)).min(1.0) * RESTART_AGE_WEIGHT,
                55.0,
            ));
        }

        out
    }
}

/// Confidence-weighted mean of slot probabilities, clamped to [0, 1].
pub fn aggregate_probability(slots: &[PredictionTimeSlot]) -> f64 {
    let total_confidence: f64 = slots.iter().map(|s| s.confidence).sum();
    if total_confidence <= 0.0 {
        return 0.0;
    }
    let weighted: f64 = slots.iter().map(|s| s.failure_probability * s.confidence).sum();
    (weighted / total_confidence).clamp(0.0, 1.0)
}

fn predicted_metrics(p: f64) -> PredictedMetrics {
    PredictedMetrics {
        response_time_multiplier: (1.0 + 2.0 * p).min(3.0),
        error_rate: p * 50.0,
        availability: 100.0 - p * 40.0,
        resource_utilization: (40.0 + p * 60.0).min(100.0),
    }
}
