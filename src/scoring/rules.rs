//! Restart score rule table
//!
//! Each factor contributes through an ordered set of tiers, highest first.
//! Only the first matching tier of a factor scores; factors are independent
//! and their points are summed, then clamped to 100 by the scorer.
//!
//! | Factor | Tiers (points) |
//! |--------|----------------|
//! | failure rate | >15% (20), >8% (10), >3% (5) |
//! | average uptime | >48h (15), >24h (10) |
//! | status transitions | >10 (15), >5 (10), >2 (5) |
//! | current status | Unreachable (25), Error (20) |
//! | error occurrences | >5 (10), >2 (5) |
//! | memory leak | >70 (25), >40 (15), >20 (5) |
//! | error trend | increasing (20) |
//! | degradation | >50 (20), >25 (10), >10 (5) |
//! | time pattern | confidence >80 (15), any (10) |
//! | inside pattern slot | currently in the >80 slot (15) |
//! | days since restart | >2x interval (15), >interval (10) |
//! | error density | >2/h (15), >1/h (10), >0.5/h (5) |
//! | uptime stability | >0.8 (10), >0.5 (5) |

use chrono::{DateTime, Utc};

use crate::analysis::slot_of;
use crate::types::{ErrorTrend, HealthMetrics, ServiceStatus, TimeBasedPattern};

/// Confidence above which a time pattern counts as high-confidence
pub const HIGH_CONFIDENCE_PATTERN: f64 = 80.0;

/// Inputs a rule predicate may look at
#[derive(Debug, Clone, Copy)]
pub struct ScoreContext<'a> {
    pub metrics: &'a HealthMetrics,
    pub status: ServiceStatus,
    pub restart_interval_days: f64,
    pub now: DateTime<Utc>,
}

impl ScoreContext<'_> {
    pub fn high_confidence_pattern(&self) -> Option<&TimeBasedPattern> {
        self.metrics
            .time_based_patterns
            .iter()
            .find(|p| p.confidence > HIGH_CONFIDENCE_PATTERN)
    }

    /// True when `now` falls inside the slot of a high-confidence pattern.
    pub fn inside_high_confidence_slot(&self) -> bool {
        let (hour, day) = slot_of(self.now);
        self.metrics
            .time_based_patterns
            .iter()
            .any(|p| p.confidence > HIGH_CONFIDENCE_PATTERN && p.matches(hour, day))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScoreFactor {
    FailureRate,
    AverageUptime,
    StatusTransitions,
    CurrentStatus,
    ErrorOccurrences,
    MemoryLeak,
    ErrorTrend,
    PerformanceDegradation,
    TimePattern,
    InsidePatternSlot,
    DaysSinceRestart,
    ErrorDensity,
    UptimeStability,
}

/// One scoring tier
pub struct ScoreRule {
    pub factor: ScoreFactor,
    pub label: &'static str,
    pub points: u32,
    pub predicate: fn(&ScoreContext<'_>) -> bool,
}

impl std::fmt::Debug for ScoreRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScoreRule")
            .field("factor", &self.factor)
            .field("label", &self.label)
            .field("points", &self.points)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Rule table
// ============================================================================

pub const SCORE_RULES: &[ScoreRule] = &[
    // Failure rate
    ScoreRule { factor: ScoreFactor::FailureRate, label: "failure rate above 15%", points: 20, predicate: |c| c.metrics.failure_rate > 15.0 },
    ScoreRule { factor: ScoreFactor::FailureRate, label: "failure rate above 8%", points: 10, predicate: |c| c.metrics.failure_rate > 8.0 },
    ScoreRule { factor: ScoreFactor::FailureRate, label: "failure rate above 3%", points: 5, predicate: |c| c.metrics.failure_rate > 3.0 },
    // Average uptime
    ScoreRule { factor: ScoreFactor::AverageUptime, label: "average uptime above 48h", points: 15, predicate: |c| c.metrics.average_uptime_hours() > 48.0 },
    ScoreRule { factor: ScoreFactor::AverageUptime, label: "average uptime above 24h", points: 10, predicate: |c| c.metrics.average_uptime_hours() > 24.0 },
    // Status transitions
    ScoreRule { factor: ScoreFactor::StatusTransitions, label: "more than 10 status transitions", points: 15, predicate: |c| c.metrics.status_transitions > 10 },
    ScoreRule { factor: ScoreFactor::StatusTransitions, label: "more than 5 status transitions", points: 10, predicate: |c| c.metrics.status_transitions > 5 },
    ScoreRule { factor: ScoreFactor::StatusTransitions, label: "more than 2 status transitions", points: 5, predicate: |c| c.metrics.status_transitions > 2 },
    // Current status
    ScoreRule { factor: ScoreFactor::CurrentStatus, label: "currently unreachable", points: 25, predicate: |c| c.status == ServiceStatus::Unreachable },
    ScoreRule { factor: ScoreFactor::CurrentStatus, label: "currently in error", points: 20, predicate: |c| c.status == ServiceStatus::Error },
    // Error occurrences
    ScoreRule { factor: ScoreFactor::ErrorOccurrences, label: "more than 5 errors", points: 10, predicate: |c| c.metrics.error_occurrences > 5 },
    ScoreRule { factor: ScoreFactor::ErrorOccurrences, label: "more than 2 errors", points: 5, predicate: |c| c.metrics.error_occurrences > 2 },
    // Memory leak likelihood
    ScoreRule { factor: ScoreFactor::MemoryLeak, label: "memory leak likelihood above 70%", points: 25, predicate: |c| c.metrics.memory_leak_likelihood > 70.0 },
    ScoreRule { factor: ScoreFactor::MemoryLeak, label: "memory leak likelihood above 40%", points: 15, predicate: |c| c.metrics.memory_leak_likelihood > 40.0 },
    ScoreRule { factor: ScoreFactor::MemoryLeak, label: "memory leak likelihood above 20%", points: 5, predicate: |c| c.metrics.memory_leak_likelihood > 20.0 },
    // Error trend
    ScoreRule { factor: ScoreFactor::ErrorTrend, label: "error frequency increasing", points: 20, predicate: |c| c.metrics.error_frequency_trend == ErrorTrend::Increasing },
    // Performance degradation
    ScoreRule { factor: ScoreFactor::PerformanceDegradation, label: "performance degradation above 50%", points: 20, predicate: |c| c.metrics.performance_degradation > 50.0 },
    ScoreRule { factor: ScoreFactor::PerformanceDegradation, label: "performance degradation above 25%", points: 10, predicate: |c| c.metrics.performance_degradation > 25.0 },
    ScoreRule { factor: ScoreFactor::PerformanceDegradation, label: "performance degradation above 10%", points: 5, predicate: |c| c.metrics.performance_degradation > 10.0 },
    // Time-based patterns
    ScoreRule { factor: ScoreFactor::TimePattern, label: "high-confidence failure pattern", points: 15, predicate: |c| c.high_confidence_pattern().is_some() },
    ScoreRule { factor: ScoreFactor::TimePattern, label: "recurring failure pattern", points: 10, predicate: |c| !c.metrics.time_based_patterns.is_empty() },
    ScoreRule { factor: ScoreFactor::InsidePatternSlot, label: "inside a high-risk time slot", points: 15, predicate: |c| c.inside_high_confidence_slot() },
    // Days since restart
    ScoreRule { factor: ScoreFactor::DaysSinceRestart, label: "restart overdue (over twice the interval)", points: 15, predicate: |c| c.metrics.days_since_last_restart > 2.0 * c.restart_interval_days },
    ScoreRule { factor: ScoreFactor::DaysSinceRestart, label: "restart interval exceeded", points: 10, predicate: |c| c.metrics.days_since_last_restart > c.restart_interval_days },
    // Error density
    ScoreRule { factor: ScoreFactor::ErrorDensity, label: "error density above 2/h", points: 15, predicate: |c| c.metrics.error_density > 2.0 },
    ScoreRule { factor: ScoreFactor::ErrorDensity, label: "error density above 1/h", points: 10, predicate: |c| c.metrics.error_density > 1.0 },
    ScoreRule { factor: ScoreFactor::ErrorDensity, label: "error density above 0.5/h", points: 5, predicate: |c| c.metrics.error_density > 0.5 },
    // Uptime stability
    ScoreRule { factor: ScoreFactor::UptimeStability, label: "highly erratic uptime", points: 10, predicate: |c| c.metrics.uptime_stability > 0.8 },
    ScoreRule { factor: ScoreFactor::UptimeStability, label: "erratic uptime", points: 5, predicate: |c| c.metrics.uptime_stability > 0.5 },
];

/// Rules that fire, at most one per factor, in table order.
pub fn fired_rules<'r>(rules: &'r [ScoreRule], ctx: &ScoreContext<'_>) -> Vec<&'r ScoreRule> {
    let mut fired: Vec<&ScoreRule> = Vec::new();
    for rule in rules {
        if fired.iter().any(|f| f.factor == rule.factor) {
            continue;
        }
        if (rule.predicate)(ctx) {
            fired.push(rule);
        }
    }
    fired
}

/// Sum of the fired tiers, clamped to 100.
pub fn total_points(fired: &[&ScoreRule]) -> u32 {
    fired.iter().map(|r| r.points).sum::<u32>().min(100)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn metrics() -> HealthMetrics {
        HealthMetrics {
            service_id: 1,
            failure_rate: 0.0,
            average_uptime: 0.0,
            restart_frequency: 0.0,
            status_transitions: 0,
            error_occurrences: 0,
            last_restarted: None,
            error_frequency_trend: ErrorTrend::Stable,
            time_based_patterns: Vec::new(),
            error_density: 0.0,
            uptime_stability: 0.0,
            performance_degradation: 0.0,
            memory_leak_likelihood: 0.0,
            days_since_last_restart: 0.0,
            current_uptime: 0.0,
            total_uptime: 0.0,
            session_count: 0,
            log_count: 1,
        }
    }

    fn ctx(m: &HealthMetrics, status: ServiceStatus) -> ScoreContext<'_> {
        ScoreContext {
            metrics: m,
            status,
            restart_interval_days: 3.0,
            // Sunday 12:00 UTC
            now: Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).single().expect("valid"),
        }
    }

    #[test]
    fn test_only_first_tier_per_factor() {
        let mut m = metrics();
        m.failure_rate = 50.0;
        let fired = fired_rules(SCORE_RULES, &ctx(&m, ServiceStatus::Running));
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].points, 20);
    }

    #[test]
    fn test_tier_boundaries_are_exclusive() {
        let mut m = metrics();
        m.failure_rate = 15.0;
        m.days_since_last_restart = 6.0;
        let fired = fired_rules(SCORE_RULES, &ctx(&m, ServiceStatus::Running));
        assert_eq!(total_points(&fired), 20);
    }

    #[test]
    fn test_inside_slot_bonus_stacks_with_pattern() {
        let mut m = metrics();
        m.time_based_patterns = vec![TimeBasedPattern {
            hour: 12,
            day_of_week: 0,
            failure_rate: 100.0,
            confidence: 90.0,
            error_count: 5,
        }];
        let fired = fired_rules(SCORE_RULES, &ctx(&m, ServiceStatus::Running));
        assert_eq!(total_points(&fired), 30);

        m.time_based_patterns[0].hour = 3;
        let fired = fired_rules(SCORE_RULES, &ctx(&m, ServiceStatus::Running));
        assert_eq!(total_points(&fired), 15);
    }

    #[test]
    fn test_total_is_clamped() {
        let mut m = metrics();
        m.failure_rate = 90.0;
        m.average_uptime = 100.0 * 60.0;
        m.status_transitions = 20;
        m.error_occurrences = 20;
        m.memory_leak_likelihood = 90.0;
        m.error_frequency_trend = ErrorTrend::Increasing;
        m.performance_degradation = 80.0;
        m.days_since_last_restart = 7.0;
        m.error_density = 5.0;
        m.uptime_stability = 1.0;
        let fired = fired_rules(SCORE_RULES, &ctx(&m, ServiceStatus::Unreachable));
        assert!(fired.iter().map(|r| r.points).sum::<u32>() > 100);
        assert_eq!(total_points(&fired), 100);
    }
}
