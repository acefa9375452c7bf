//! Health analysis: replays a service's event log into `HealthMetrics`.
//!
//! Two stages run over the analysis window:
//! 1. `MetricsAggregator` - classification, failure rate, sessions, restarts
//! 2. `PatternMiner` - trend, density, stability, time slots, leak likelihood
//!
//! Nothing here is persisted; metrics are recomputed on every request.

pub mod aggregator;
pub mod leak;
pub mod patterns;

pub use aggregator::{AggregateMetrics, MetricsAggregator};
pub use leak::{LeakCorrelation, SessionTimestampCorrelation, SyntheticUptimeCorrelation};
pub use patterns::{slot_of, MinedPatterns, PatternMiner};

use chrono::{DateTime, Duration, Utc};

use crate::config::AnalysisConfig;
use crate::types::{EventLogEntry, HealthMetrics, MonitoredService};

pub struct HealthAnalyzer {
    window_days: u32,
    aggregator: MetricsAggregator,
    miner: PatternMiner,
}

impl HealthAnalyzer {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            window_days: config.window_days,
            aggregator: MetricsAggregator::new(config),
            miner: PatternMiner::new(config),
        }
    }

    pub fn with_leak_strategy(mut self, leak: Box<dyn LeakCorrelation>) -> Self {
        self.miner = self.miner.with_leak_strategy(leak);
        self
    }

    /// Oldest timestamp considered at `now`.
    pub fn window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::days(i64::from(self.window_days))
    }

    /// Compute metrics from `logs`; entries outside `[window_start, now]` are ignored.
    ///
    /// Returns `None` when the window holds no entries.
    pub fn analyze(
        &self,
        service: &MonitoredService,
        logs: &[EventLogEntry],
        now: DateTime<Utc>,
    ) -> Option<HealthMetrics> {
        let since = self.window_start(now);
        let window: Vec<EventLogEntry> = logs
            .iter()
            .filter(|e| e.timestamp >= since && e.timestamp <= now)
            .filter(|e| e.service_id.map_or(true, |id| id == service.id))
            .cloned()
            .collect();

        let agg = self.aggregator.aggregate(service, &window, now)?;
        let mined = self.miner.mine(&agg);

        tracing::debug!(
            service = %service.name,
            entries = window.len(),
            failure_rate = agg.failure_rate,
            leak = mined.memory_leak_likelihood,
            leak_model = self.miner.leak_strategy(),
            "Health metrics computed"
        );

        Some(HealthMetrics {
            service_id: service.id,
            failure_rate: agg.failure_rate,
            average_uptime: agg.average_uptime,
            restart_frequency: agg.restart_frequency,
            status_transitions: agg.status_transitions,
            error_occurrences: agg.error_count,
            last_restarted: agg.last_restarted,
            error_frequency_trend: mined.error_frequency_trend,
            time_based_patterns: mined.time_based_patterns,
            error_density: mined.error_density,
            uptime_stability: mined.uptime_stability,
            performance_degradation: mined.performance_degradation,
            memory_leak_likelihood: mined.memory_leak_likelihood,
            days_since_last_restart: agg.days_since_last_restart,
            current_uptime: agg.current_uptime,
            total_uptime: agg.total_uptime,
            session_count: agg.sessions.len(),
            log_count: window.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{actions, ServiceStatus};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).single().expect("valid")
    }

    fn service(status: ServiceStatus) -> MonitoredService {
        MonitoredService::new(1, "api", "http://localhost", 8080).with_status(status)
    }

    #[test]
    fn test_empty_window_is_none() {
        let analyzer = HealthAnalyzer::new(&AnalysisConfig::default());
        assert!(analyzer.analyze(&service(ServiceStatus::Running), &[], now()).is_none());

        // only entries older than the window
        let old = EventLogEntry::new(Some(1), actions::STATUS_CHANGE, "old")
            .with_status(ServiceStatus::Running)
            .at(now() - Duration::days(30));
        assert!(analyzer.analyze(&service(ServiceStatus::Running), &[old], now()).is_none());
    }

    #[test]
    fn test_single_unreachable_change() {
        let analyzer = HealthAnalyzer::new(&AnalysisConfig::default());
        let entry = EventLogEntry::new(Some(1), actions::STATUS_CHANGE, "Status changed to unreachable")
            .with_status(ServiceStatus::Unreachable)
            .at(now() - Duration::hours(1));
        let m = analyzer
            .analyze(&service(ServiceStatus::Unreachable), &[entry], now())
            .expect("metrics");

        assert!((m.failure_rate - 100.0).abs() < f64::EPSILON);
        assert_eq!(m.status_transitions, 0);
        assert!((m.days_since_last_restart - 7.0).abs() < f64::EPSILON);
        assert!(m.error_density.abs() < f64::EPSILON);
        assert_eq!(m.log_count, 1);
    }

    #[test]
    fn test_analyze_is_idempotent() {
        let analyzer = HealthAnalyzer::new(&AnalysisConfig::default());
        let logs: Vec<EventLogEntry> = (0..6)
            .map(|i| {
                let status = if i % 2 == 0 { ServiceStatus::Running } else { ServiceStatus::Error };
                EventLogEntry::new(Some(1), actions::STATUS_CHANGE, "flap")
                    .with_status(status)
                    .at(now() - Duration::hours(30 - i * 4))
            })
            .collect();
        let before = logs.clone();
        let svc = service(ServiceStatus::Running);
        let a = analyzer.analyze(&svc, &logs, now());
        let b = analyzer.analyze(&svc, &logs, now());
        assert_eq!(a, b);
        assert_eq!(logs, before);
    }
}
