//! Restart recommendation scoring
//!
//! `rules` holds the additive rule table; `RecommendationScorer` turns the
//! fired rules into a score, urgency, reason and recommended action window.

pub mod rules;

pub use rules::{fired_rules, total_points, ScoreContext, ScoreFactor, ScoreRule, SCORE_RULES};

use chrono::{DateTime, Duration, Utc};

use crate::analysis::slot_of;
use crate::config::{AnalysisConfig, ScoringConfig};
use crate::types::{
    ErrorTrend, HealthMetrics, MonitoredService, PrimaryFactor, RestartRecommendation, ServiceStatus,
    TimeBasedPattern, Urgency,
};

const WEEKDAYS: [&str; 7] = ["Sunday", "Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday"];

pub fn weekday_name(day_of_week: u32) -> &'static str {
    WEEKDAYS.get(day_of_week as usize).copied().unwrap_or("Unknown")
}

/// Urgency from score, escalated to critical for Unreachable/Error.
pub fn urgency_for(score: u32, status: ServiceStatus) -> Urgency {
    if score >= 80 || status.is_critical() {
        Urgency::Critical
    } else if score >= 60 {
        Urgency::High
    } else if score >= 40 {
        Urgency::Medium
    } else {
        Urgency::Low
    }
}

pub fn window_for(urgency: Urgency) -> &'static str {
    match urgency {
        Urgency::Critical => "Immediately",
        Urgency::High => "Within the next hour",
        Urgency::Medium => "Within 24 hours",
        Urgency::Low => "During the next maintenance window",
    }
}

/// Pattern whose slot is the current hour or the next UTC hour.
///
/// The next slot rolls over midnight into the following weekday.
pub fn current_or_imminent_pattern(metrics: &HealthMetrics, now: DateTime<Utc>) -> Option<&TimeBasedPattern> {
    let (hour, day) = slot_of(now);
    let (next_hour, next_day) = slot_of(now + Duration::hours(1));
    metrics
        .time_based_patterns
        .iter()
        .find(|p| p.matches(hour, day) || p.matches(next_hour, next_day))
}

pub struct RecommendationScorer {
    min_score: u32,
    restart_interval_days: f64,
    rules: &'static [ScoreRule],
}

impl RecommendationScorer {
    pub fn new(scoring: &ScoringConfig, analysis: &AnalysisConfig) -> Self {
        Self {
            min_score: scoring.min_recommendation_score,
            restart_interval_days: analysis.restart_interval_days,
            rules: SCORE_RULES,
        }
    }

    fn context<'a>(&self, service: &MonitoredService, metrics: &'a HealthMetrics, now: DateTime<Utc>) -> ScoreContext<'a> {
        ScoreContext {
            metrics,
            status: service.status,
            restart_interval_days: self.restart_interval_days,
            now,
        }
    }

    /// Additive restart score in [0, 100].
    pub fn calculate_score(&self, service: &MonitoredService, metrics: &HealthMetrics, now: DateTime<Utc>) -> u32 {
        let ctx = self.context(service, metrics, now);
        total_points(&fired_rules(self.rules, &ctx))
    }

    /// Build a recommendation; `None` when the score is below the minimum.
    pub fn recommend(
        &self,
        service: &MonitoredService,
        metrics: &HealthMetrics,
        now: DateTime<Utc>,
    ) -> Option<RestartRecommendation> {
        let ctx = self.context(service, metrics, now);
        let fired = fired_rules(self.rules, &ctx);
        let score = total_points(&fired);
        if score < self.min_score {
            tracing::debug!(service = %service.name, score, "Score below recommendation threshold");
            return None;
        }

        let urgency = urgency_for(score, service.status);
        let (primary_factor, reason) = self.primary_reason(service, metrics, score, now);
        let recommended_time_window = if primary_factor == PrimaryFactor::TimePattern {
            current_or_imminent_pattern(metrics, now)
                .map_or_else(|| window_for(urgency).to_string(), |p| format!("Before {:02}:00 UTC", p.hour))
        } else {
            window_for(urgency).to_string()
        };

        Some(RestartRecommendation {
            service_id: service.id,
            service_name: service.name.clone(),
            score,
            reason,
            urgency,
            primary_factor,
            predicted_issues: predicted_issues(&fired, metrics),
            recommended_time_window,
            memory_leak_probability: metrics.memory_leak_likelihood,
            contributing_factors: fired.iter().map(|r| r.label.to_string()).collect(),
        })
    }

    /// Fixed-priority choice of the headline factor.
    fn primary_reason(
        &self,
        service: &MonitoredService,
        metrics: &HealthMetrics,
        score: u32,
        now: DateTime<Utc>,
    ) -> (PrimaryFactor, String) {
        if service.status.is_critical() {
            return (
                PrimaryFactor::CriticalStatus,
                format!("Service is currently {} and needs immediate attention", service.status),
            );
        }
        if metrics.memory_leak_likelihood > 70.0 {
            return (
                PrimaryFactor::MemoryLeak,
                format!(
                    "Probable memory leak ({:.0}% likelihood) after {:.1}h average uptime",
                    metrics.memory_leak_likelihood,
                    metrics.average_uptime_hours()
                ),
            );
        }
        if let Some(p) = current_or_imminent_pattern(metrics, now) {
            let (hour, day) = slot_of(now);
            let when = if p.matches(hour, day) { "now" } else { "within the hour" };
            return (
                PrimaryFactor::TimePattern,
                format!(
                    "Recurring failures around {:02}:00 UTC on {} ({:.0}% failure rate) expected {}",
                    p.hour,
                    weekday_name(p.day_of_week),
                    p.failure_rate,
                    when
                ),
            );
        }
        if metrics.performance_degradation > 40.0 {
            return (
                PrimaryFactor::PerformanceDegradation,
                format!("Performance degraded by an estimated {:.0}%", metrics.performance_degradation),
            );
        }
        if metrics.error_frequency_trend == ErrorTrend::Increasing {
            return (
                PrimaryFactor::RisingFailureRate,
                format!("Error frequency is rising ({:.1}% failure rate)", metrics.failure_rate),
            );
        }
        let overdue = 2.0 * self.restart_interval_days;
        if metrics.average_uptime_hours() > 48.0 || metrics.days_since_last_restart > overdue {
            return (
                PrimaryFactor::ExtendedUptime,
                format!(
                    "Running {:.1} days without a restart (recommended every {:.0} days)",
                    metrics.days_since_last_restart, self.restart_interval_days
                ),
            );
        }
        if metrics.failure_rate > 15.0 {
            return (
                PrimaryFactor::HighFailureRate,
                format!("High failure rate of {:.1}%", metrics.failure_rate),
            );
        }
        if metrics.status_transitions > 5 {
            return (
                PrimaryFactor::ErraticTransitions,
                format!("Erratic behaviour: {} status transitions in the window", metrics.status_transitions),
            );
        }
        if metrics.error_density > 2.0 {
            return (
                PrimaryFactor::HighErrorDensity,
                format!("{:.1} errors per operating hour", metrics.error_density),
            );
        }
        (
            PrimaryFactor::Composite,
            format!("Combined health indicators give a restart score of {score}"),
        )
    }
}

fn predicted_issues(fired: &[&ScoreRule], metrics: &HealthMetrics) -> Vec<String> {
    let has = |factor: ScoreFactor| fired.iter().any(|r| r.factor == factor);
    let mut issues = Vec::new();

    if has(ScoreFactor::MemoryLeak) {
        issues.push(format!(
            "Memory usage likely to keep growing ({:.0}% leak likelihood)",
            metrics.memory_leak_likelihood
        ));
    }
    if has(ScoreFactor::PerformanceDegradation) {
        issues.push(format!(
            "Response times likely degraded by around {:.0}%",
            metrics.performance_degradation
        ));
    }
    if let Some(p) = metrics.strongest_pattern() {
        issues.push(format!(
            "Failures recur around {:02}:00 UTC on {}",
            p.hour,
            weekday_name(p.day_of_week)
        ));
    }
    if has(ScoreFactor::ErrorTrend) {
        issues.push("Error frequency is increasing".to_string());
    }
    if has(ScoreFactor::UptimeStability) || has(ScoreFactor::StatusTransitions) {
        issues.push(format!(
            "Unstable uptime ({} transitions, variation {:.2})",
            metrics.status_transitions, metrics.uptime_stability
        ));
    }
    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        // Sunday 12:00 UTC
        Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).single().expect("valid")
    }

    fn scorer() -> RecommendationScorer {
        RecommendationScorer::new(&ScoringConfig::default(), &AnalysisConfig::default())
    }

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

    fn service(status: ServiceStatus) -> MonitoredService {
        MonitoredService::new(1, "api", "http://localhost", 8080).with_status(status)
    }

    #[test]
    fn test_urgency_thresholds() {
        assert_eq!(urgency_for(10, ServiceStatus::Running), Urgency::Low);
        assert_eq!(urgency_for(40, ServiceStatus::Running), Urgency::Medium);
        assert_eq!(urgency_for(60, ServiceStatus::Stopped), Urgency::High);
        assert_eq!(urgency_for(80, ServiceStatus::Running), Urgency::Critical);
        assert_eq!(urgency_for(0, ServiceStatus::Error), Urgency::Critical);
        assert_eq!(urgency_for(0, ServiceStatus::Unreachable), Urgency::Critical);
    }

    #[test]
    fn test_below_minimum_is_none() {
        let mut m = metrics();
        m.failure_rate = 10.0; // 10 points
        assert!(scorer().recommend(&service(ServiceStatus::Running), &m, now()).is_none());
    }

    #[test]
    fn test_unreachable_single_change() {
        let mut m = metrics();
        m.failure_rate = 100.0;
        m.days_since_last_restart = 7.0;
        let rec = scorer()
            .recommend(&service(ServiceStatus::Unreachable), &m, now())
            .expect("recommendation");
        assert_eq!(rec.score, 60);
        assert_eq!(rec.urgency, Urgency::Critical);
        assert_eq!(rec.primary_factor, PrimaryFactor::CriticalStatus);
        assert_eq!(rec.recommended_time_window, "Immediately");
    }

    #[test]
    fn test_memory_leak_outranks_pattern() {
        let mut m = metrics();
        m.memory_leak_likelihood = 75.0;
        m.time_based_patterns = vec![TimeBasedPattern {
            hour: 12,
            day_of_week: 0,
            failure_rate: 60.0,
            confidence: 70.0,
            error_count: 3,
        }];
        let rec = scorer()
            .recommend(&service(ServiceStatus::Running), &m, now())
            .expect("recommendation");
        assert_eq!(rec.primary_factor, PrimaryFactor::MemoryLeak);
        assert_eq!(rec.score, 35);
        assert_eq!(rec.urgency, Urgency::Low);
    }

    #[test]
    fn test_imminent_pattern_names_window() {
        let mut m = metrics();
        m.time_based_patterns = vec![TimeBasedPattern {
            hour: 13,
            day_of_week: 0,
            failure_rate: 80.0,
            confidence: 90.0,
            error_count: 5,
        }];
        m.failure_rate = 20.0;
        let rec = scorer()
            .recommend(&service(ServiceStatus::Running), &m, now())
            .expect("recommendation");
        assert_eq!(rec.primary_factor, PrimaryFactor::TimePattern);
        assert_eq!(rec.recommended_time_window, "Before 13:00 UTC");
        assert_eq!(rec.score, 35);
        assert!(rec.predicted_issues.iter().any(|i| i.contains("13:00 UTC on Sunday")));
    }

    #[test]
    fn test_imminent_pattern_rolls_over_midnight() {
        // Saturday 23:30 UTC: the next slot is Sunday 00:00
        let late_saturday = Utc.with_ymd_and_hms(2026, 10, 17, 23, 30, 0).single().expect("valid");
        let pattern = |day_of_week| TimeBasedPattern {
            hour: 0,
            day_of_week,
            failure_rate: 80.0,
            confidence: 90.0,
            error_count: 5,
        };

        let mut m = metrics();
        m.time_based_patterns = vec![pattern(6)];
        assert!(current_or_imminent_pattern(&m, late_saturday).is_none());

        m.time_based_patterns = vec![pattern(0)];
        assert_eq!(current_or_imminent_pattern(&m, late_saturday), Some(&pattern(0)));

        m.failure_rate = 20.0;
        let rec = scorer()
            .recommend(&service(ServiceStatus::Running), &m, late_saturday)
            .expect("recommendation");
        assert_eq!(rec.primary_factor, PrimaryFactor::TimePattern);
        assert_eq!(rec.recommended_time_window, "Before 00:00 UTC");
        assert!(rec.reason.contains("within the hour"));
    }

    #[test]
    fn test_composite_fallback() {
        let mut m = metrics();
        m.failure_rate = 10.0;
        m.error_occurrences = 3;
        m.error_density = 1.5;
        let rec = scorer()
            .recommend(&service(ServiceStatus::Running), &m, now())
            .expect("recommendation");
        assert_eq!(rec.score, 25);
        assert_eq!(rec.primary_factor, PrimaryFactor::Composite);
        assert!(rec.reason.contains("25"));
        assert_eq!(rec.recommended_time_window, "During the next maintenance window");
    }
}
