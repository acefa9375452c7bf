//! Metrics Aggregator
//!
//! Replays one service's event log (oldest first) into quantitative
//! metrics: failure rate, restart frequency, status transitions and uptime
//! sessions. Entry order by timestamp is the only basis for session
//! reconstruction.

use chrono::{DateTime, Utc};

use crate::config::AnalysisConfig;
use crate::types::{EventLogEntry, MonitoredService, ServiceStatus, UptimeSession};

/// Raw aggregates the pattern miner builds on
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateMetrics {
    pub failure_rate: f64,
    /// Minutes
    pub average_uptime: f64,
    pub restart_frequency: f64,
    pub status_transitions: usize,
    pub status_change_count: usize,
    pub error_count: usize,
    pub restart_count: usize,
    pub last_restarted: Option<DateTime<Utc>>,
    pub days_since_last_restart: f64,
    pub sessions: Vec<UptimeSession>,
    /// Minutes
    pub current_uptime: f64,
    /// Minutes
    pub total_uptime: f64,
    /// Timestamps of error entries, oldest first
    pub error_times: Vec<DateTime<Utc>>,
    /// Timestamps of every entry, oldest first
    pub entry_times: Vec<DateTime<Utc>>,
    pub current_status: ServiceStatus,
}

impl AggregateMetrics {
    pub fn average_uptime_hours(&self) -> f64 {
        self.average_uptime / 60.0
    }
}

pub struct MetricsAggregator {
    window_days: u32,
}

impl MetricsAggregator {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            window_days: config.window_days,
        }
    }

    /// Aggregate the window's entries. `None` when there are no entries.
    pub fn aggregate(
        &self,
        service: &MonitoredService,
        logs: &[EventLogEntry],
        now: DateTime<Utc>,
    ) -> Option<AggregateMetrics> {
        if logs.is_empty() {
            return None;
        }

        let mut sorted: Vec<&EventLogEntry> = logs.iter().collect();
        sorted.sort_by_key(|e| e.timestamp);

        let status_changes: Vec<&EventLogEntry> =
            sorted.iter().copied().filter(|e| e.is_status_change()).collect();
        let errors: Vec<&EventLogEntry> = sorted.iter().copied().filter(|e| e.is_error()).collect();
        let restarts: Vec<&EventLogEntry> = sorted.iter().copied().filter(|e| e.is_restart()).collect();

        let failure_rate = if status_changes.is_empty() {
            0.0
        } else {
            errors.len() as f64 / status_changes.len() as f64 * 100.0
        };

        let status_transitions = count_transitions(&status_changes);
        let last_restarted = restarts.iter().map(|e| e.timestamp).max();

        let sessions = reconstruct_sessions(&status_changes, service.status, now);
        let durations: Vec<f64> = sessions.iter().map(UptimeSession::duration_minutes).collect();
        let total_uptime: f64 = durations.iter().sum();
        let average_uptime = if durations.is_empty() {
            0.0
        } else {
            total_uptime / durations.len() as f64
        };
        let current_uptime = sessions
            .last()
            .filter(|s| s.open)
            .map_or(0.0, UptimeSession::duration_minutes);

        let first = sorted.first().map(|e| e.timestamp)?;
        let last = sorted.last().map(|e| e.timestamp)?;
        let span_days = days_between(first, last).max(1.0);
        let restart_frequency = restarts.len() as f64 / span_days;

        let days_since_last_restart = last_restarted
            .map_or(f64::from(self.window_days), |t| days_between(t, now).max(0.0));

        Some(AggregateMetrics {
            failure_rate,
            average_uptime,
            restart_frequency,
            status_transitions,
            status_change_count: status_changes.len(),
            error_count: errors.len(),
            restart_count: restarts.len(),
            last_restarted,
            days_since_last_restart,
            sessions,
            current_uptime,
            total_uptime,
            error_times: errors.iter().map(|e| e.timestamp).collect(),
            entry_times: sorted.iter().map(|e| e.timestamp).collect(),
            current_status: service.status,
        })
    }
}

pub(crate) fn days_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds() as f64 / 86_400_000.0
}

/// Count entries whose status differs from the preceding non-empty status.
fn count_transitions(status_changes: &[&EventLogEntry]) -> usize {
    let mut previous: Option<ServiceStatus> = None;
    let mut transitions = 0;
    for status in status_changes.iter().filter_map(|e| e.status) {
        if previous.is_some_and(|p| p != status) {
            transitions += 1;
        }
        previous = Some(status);
    }
    transitions
}

/// A session opens on a transition into Running and closes on the first
/// transition out. An unterminated session is extended to `now` only when
/// the service is still Running; otherwise its end is unknown and it is dropped.
fn reconstruct_sessions(
    status_changes: &[&EventLogEntry],
    current: ServiceStatus,
    now: DateTime<Utc>,
) -> Vec<UptimeSession> {
    let mut sessions = Vec::new();
    let mut open: Option<DateTime<Utc>> = None;

    for entry in status_changes {
        let Some(status) = entry.status else { continue };
        match (status, open) {
            (ServiceStatus::Running, None) => open = Some(entry.timestamp),
            (ServiceStatus::Running, Some(_)) => {}
            (_, Some(start)) => {
                sessions.push(UptimeSession {
                    start,
                    end: entry.timestamp,
                    open: false,
                });
                open = None;
            }
            (_, None) => {}
        }
    }

    if let Some(start) = open {
        if current == ServiceStatus::Running {
            sessions.push(UptimeSession {
                start,
                end: now.max(start),
                open: true,
            });
        }
    }

    sessions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::actions;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).single().expect("valid")
    }

    fn change(hours_ago: i64, status: ServiceStatus) -> EventLogEntry {
        EventLogEntry::new(Some(1), actions::STATUS_CHANGE, "")
            .with_status(status)
            .at(now() - Duration::hours(hours_ago))
    }

    fn aggregator() -> MetricsAggregator {
        MetricsAggregator::new(&AnalysisConfig::default())
    }

    #[test]
    fn test_empty_log_yields_none() {
        let svc = MonitoredService::new(1, "api", "localhost", 80);
        assert!(aggregator().aggregate(&svc, &[], now()).is_none());
    }

    #[test]
    fn test_sessions_close_on_exit_and_extend_when_running() {
        let svc = MonitoredService::new(1, "api", "localhost", 80).with_status(ServiceStatus::Running);
        let logs = vec![
            change(50, ServiceStatus::Running),
            change(40, ServiceStatus::Stopped),
            change(10, ServiceStatus::Running),
        ];
        let m = aggregator().aggregate(&svc, &logs, now()).expect("metrics");

        assert_eq!(m.sessions.len(), 2);
        assert!((m.sessions[0].duration_minutes() - 600.0).abs() < 1e-9);
        assert!(m.sessions[1].open);
        assert!((m.current_uptime - 600.0).abs() < 1e-9);
        assert!((m.average_uptime - 600.0).abs() < 1e-9);
        assert_eq!(m.status_transitions, 2);
    }

    #[test]
    fn test_unterminated_session_dropped_when_not_running() {
        let svc = MonitoredService::new(1, "api", "localhost", 80).with_status(ServiceStatus::Stopped);
        let logs = vec![change(5, ServiceStatus::Running)];
        let m = aggregator().aggregate(&svc, &logs, now()).expect("metrics");
        assert!(m.sessions.is_empty());
        assert!(m.average_uptime.abs() < f64::EPSILON);
    }

    #[test]
    fn test_transitions_ignore_repeats_and_empty_statuses() {
        let svc = MonitoredService::new(1, "api", "localhost", 80);
        let logs = vec![
            change(6, ServiceStatus::Running),
            change(5, ServiceStatus::Running),
            EventLogEntry::new(Some(1), actions::STATUS_CHANGE, "no status").at(now() - Duration::hours(4)),
            change(3, ServiceStatus::Error),
            change(2, ServiceStatus::Error),
            change(1, ServiceStatus::Running),
        ];
        let m = aggregator().aggregate(&svc, &logs, now()).expect("metrics");
        assert_eq!(m.status_transitions, 2);
    }

    #[test]
    fn test_failure_rate_and_restart_tracking() {
        let svc = MonitoredService::new(1, "api", "localhost", 80);
        let logs = vec![
            change(72, ServiceStatus::Running),
            change(48, ServiceStatus::Unreachable),
            EventLogEntry::new(Some(1), actions::RESTART_SUCCEEDED, "").at(now() - Duration::hours(47)),
            change(47, ServiceStatus::Running),
            EventLogEntry::new(Some(1), actions::START_FAILED, "").at(now() - Duration::hours(24)),
        ];
        let m = aggregator().aggregate(&svc, &logs, now()).expect("metrics");

        // errors: Unreachable change + Start Failed; status changes: 3
        assert_eq!(m.error_count, 2);
        assert!((m.failure_rate - 200.0 / 3.0).abs() < 1e-9);
        assert_eq!(m.restart_count, 1);
        assert_eq!(m.last_restarted, Some(now() - Duration::hours(47)));
        assert!((m.days_since_last_restart - 47.0 / 24.0).abs() < 1e-9);
        // 1 restart over a 2-day span
        assert!((m.restart_frequency - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_no_restart_defaults_to_window_length() {
        let svc = MonitoredService::new(1, "api", "localhost", 80);
        let m = aggregator()
            .aggregate(&svc, &[change(1, ServiceStatus::Running)], now())
            .expect("metrics");
        assert!((m.days_since_last_restart - 7.0).abs() < f64::EPSILON);
        assert!(m.last_restarted.is_none());
    }

    #[test]
    fn test_input_order_does_not_matter() {
        let svc = MonitoredService::new(1, "api", "localhost", 80).with_status(ServiceStatus::Running);
        let mut logs = vec![
            change(30, ServiceStatus::Running),
            change(20, ServiceStatus::Error),
            change(10, ServiceStatus::Running),
        ];
        let forward = aggregator().aggregate(&svc, &logs, now());
        logs.reverse();
        let reversed = aggregator().aggregate(&svc, &logs, now());
        assert_eq!(forward, reversed);
    }
}
