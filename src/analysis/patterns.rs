//! Pattern Miner
//!
//! Derives second-order signals from the aggregates: error-frequency trend,
//! error density, uptime stability, recurring time-of-day failure slots,
//! performance degradation and memory-leak likelihood.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Timelike, Utc};
use statrs::statistics::Statistics;

use super::aggregator::AggregateMetrics;
use super::leak::{correlation_points, strategy_for, LeakCorrelation};
use crate::config::AnalysisConfig;
use crate::types::{ErrorTrend, ServiceStatus, TimeBasedPattern, UptimeSession};

/// Slot failure rate must exceed the overall rate by this factor
const PATTERN_RATE_MULTIPLIER: f64 = 1.5;

/// Output of one mining pass
#[derive(Debug, Clone, PartialEq)]
pub struct MinedPatterns {
    pub error_frequency_trend: ErrorTrend,
    pub error_density: f64,
    pub uptime_stability: f64,
    pub time_based_patterns: Vec<TimeBasedPattern>,
    pub performance_degradation: f64,
    pub memory_leak_likelihood: f64,
}

pub struct PatternMiner {
    config: AnalysisConfig,
    leak: Box<dyn LeakCorrelation>,
}

impl PatternMiner {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            config: config.clone(),
            leak: strategy_for(config.leak_correlation),
        }
    }

    /// Replace the uptime/error correlation strategy.
    pub fn with_leak_strategy(mut self, leak: Box<dyn LeakCorrelation>) -> Self {
        self.leak = leak;
        self
    }

    pub fn leak_strategy(&self) -> &'static str {
        self.leak.name()
    }

    pub fn mine(&self, agg: &AggregateMetrics) -> MinedPatterns {
        let error_frequency_trend = self.error_trend(&agg.error_times);
        let error_density = error_density(agg.error_count, agg.total_uptime);
        let uptime_stability = uptime_stability(&agg.sessions);
        let time_based_patterns = self.time_patterns(agg);
        let performance_degradation =
            self.performance_degradation(agg.average_uptime_hours(), error_frequency_trend, uptime_stability);
        let memory_leak_likelihood = self.memory_leak_likelihood(agg);

        MinedPatterns {
            error_frequency_trend,
            error_density,
            uptime_stability,
            time_based_patterns,
            performance_degradation,
            memory_leak_likelihood,
        }
    }

    /// Compare errors/hour between the older and newer half of the errors.
    pub fn error_trend(&self, error_times: &[DateTime<Utc>]) -> ErrorTrend {
        if error_times.len() < self.config.min_errors_for_trend {
            return ErrorTrend::Stable;
        }
        let mid = error_times.len() / 2;
        let older = errors_per_hour(&error_times[..mid]);
        let newer = errors_per_hour(&error_times[mid..]);
        if older <= 0.0 {
            return ErrorTrend::Stable;
        }

        let change = (newer - older) / older;
        if change > self.config.trend_change_threshold {
            ErrorTrend::Increasing
        } else if change < -self.config.trend_change_threshold {
            ErrorTrend::Decreasing
        } else {
            ErrorTrend::Stable
        }
    }

    /// (hour, weekday) slots whose error share is well above the overall failure rate.
    pub fn time_patterns(&self, agg: &AggregateMetrics) -> Vec<TimeBasedPattern> {
        let mut slot_entries: BTreeMap<(u32, u32), usize> = BTreeMap::new();
        for ts in &agg.entry_times {
            *slot_entries.entry(slot_of(*ts)).or_default() += 1;
        }
        let mut slot_errors: BTreeMap<(u32, u32), usize> = BTreeMap::new();
        for ts in &agg.error_times {
            *slot_errors.entry(slot_of(*ts)).or_default() += 1;
        }

        let mut patterns: Vec<TimeBasedPattern> = slot_errors
            .into_iter()
            .filter(|&(_, count)| count >= self.config.min_errors_for_pattern)
            .filter_map(|((hour, day_of_week), count)| {
                let total = slot_entries.get(&(hour, day_of_week)).copied().unwrap_or(count);
                let failure_rate = count as f64 / total.max(1) as f64 * 100.0;
                (failure_rate > agg.failure_rate * PATTERN_RATE_MULTIPLIER).then(|| TimeBasedPattern {
                    hour,
                    day_of_week,
                    failure_rate,
                    confidence: (40.0 + 10.0 * count as f64).min(100.0),
                    error_count: count,
                })
            })
            .collect();

        patterns.sort_by(|a, b| {
            b.confidence
                .total_cmp(&a.confidence)
                .then(b.failure_rate.total_cmp(&a.failure_rate))
                .then((a.day_of_week, a.hour).cmp(&(b.day_of_week, b.hour)))
        });
        patterns
    }

    /// Log-scaled penalty for long average uptime plus trend/instability bonuses.
    pub fn performance_degradation(&self, average_uptime_hours: f64, trend: ErrorTrend, stability: f64) -> f64 {
        let threshold = self.config.leak_threshold_hours;
        let mut degradation = 0.0;
        if average_uptime_hours > threshold {
            let hours_over = average_uptime_hours - threshold;
            degradation += (10.0 * (1.0 + hours_over / 12.0).ln()).min(50.0);
        }
        if trend == ErrorTrend::Increasing {
            degradation += 20.0;
        }
        if stability > 0.5 {
            degradation += 15.0;
        }
        degradation.clamp(0.0, 100.0)
    }

    pub fn memory_leak_likelihood(&self, agg: &AggregateMetrics) -> f64 {
        let threshold = self.config.leak_threshold_hours;
        let correlation = self.leak.correlate(&agg.sessions, &agg.error_times);
        let mut likelihood = correlation_points(correlation);

        let hours_over = agg.average_uptime_hours() - threshold;
        if hours_over > 0.0 {
            likelihood += (hours_over / 2.0).min(40.0);
        }

        let down_after_long_session = agg.current_status != ServiceStatus::Running
            && agg
                .sessions
                .last()
                .is_some_and(|s| !s.open && s.duration_minutes() > threshold * 60.0);
        if down_after_long_session {
            likelihood += 20.0;
        }

        likelihood.clamp(0.0, 100.0)
    }
}

/// UTC (hour, weekday) with Sunday = 0.
pub fn slot_of(ts: DateTime<Utc>) -> (u32, u32) {
    (ts.hour(), ts.weekday().num_days_from_sunday())
}

fn errors_per_hour(times: &[DateTime<Utc>]) -> f64 {
    let (Some(first), Some(last)) = (times.first(), times.last()) else {
        return 0.0;
    };
    let hours = ((*last - *first).num_milliseconds() as f64 / 3_600_000.0).max(1.0);
    times.len() as f64 / hours
}

/// Errors per operating hour, 0 without uptime.
pub fn error_density(error_count: usize, total_uptime_minutes: f64) -> f64 {
    if total_uptime_minutes > 0.0 {
        error_count as f64 / (total_uptime_minutes / 60.0)
    } else {
        0.0
    }
}

/// Coefficient of variation of session durations, 0 below two sessions.
pub fn uptime_stability(sessions: &[UptimeSession]) -> f64 {
    if sessions.len() < 2 {
        return 0.0;
    }
    let durations: Vec<f64> = sessions.iter().map(UptimeSession::duration_minutes).collect();
    let mean = durations.iter().mean();
    if mean <= 0.0 {
        return 0.0;
    }
    durations.iter().population_std_dev() / mean
}
