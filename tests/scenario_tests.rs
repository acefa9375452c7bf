//! Scenario Tests
//!
//! End-to-end checks of the intelligence and control paths against the
//! in-memory registry: fleet scenarios plus the scoring/prediction bounds
//! that must hold for any input.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};

use service_sentinel::config::{ControlConfig, SentinelConfig};
use service_sentinel::inspector::{InspectorError, ProcessInfo};
use service_sentinel::types::{actions, ProcessStatus, TrackedProcess};
use service_sentinel::{
    EventLogEntry, GhostProcessReconciler, HealthIntelligence, InMemoryRegistry, MonitoredService,
    ProcessInspector, Registry, RestartController, ServiceStatus, Urgency,
};

struct NoopInspector;

#[async_trait]
impl ProcessInspector for NoopInspector {
    async fn find_process_by_port(&self, _port: u16) -> Result<Option<ProcessInfo>, InspectorError> {
        Ok(None)
    }

    async fn kill_process(&self, _pid: u32) -> Result<bool, InspectorError> {
        Ok(true)
    }
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).single().expect("valid timestamp")
}

fn control_config() -> ControlConfig {
    ControlConfig {
        restart_delay_ms: 0,
        ..ControlConfig::default()
    }
}

fn status_change(service_id: u64, status: ServiceStatus, at: DateTime<Utc>) -> EventLogEntry {
    EventLogEntry::new(Some(service_id), actions::STATUS_CHANGE, format!("Status changed to {status}"))
        .with_status(status)
        .at(at)
}

/// A noisy week: flapping between Running and Error with long sessions.
fn noisy_log(service_id: u64) -> Vec<EventLogEntry> {
    let mut log = Vec::new();
    for i in 0..40 {
        let at = now() - Duration::hours(160) + Duration::hours(i * 4);
        let status = match i % 4 {
            0 | 1 => ServiceStatus::Running,
            2 => ServiceStatus::Error,
            _ => ServiceStatus::Unreachable,
        };
        log.push(status_change(service_id, status, at));
        if i % 5 == 0 {
            log.push(
                EventLogEntry::new(Some(service_id), "Request Failed", "upstream timeout")
                    .at(at + Duration::minutes(30)),
            );
        }
    }
    log
}

// ============================================================================
// Scenario A: single unreachable status change
// ============================================================================

#[tokio::test]
async fn single_unreachable_change_scores_sixty_and_is_critical() {
    let registry = InMemoryRegistry::new()
        .with_services(vec![
            MonitoredService::new(1, "api", "localhost", 8080).with_status(ServiceStatus::Unreachable)
        ])
        .with_events(vec![status_change(1, ServiceStatus::Unreachable, now() - Duration::hours(3))]);
    let intelligence = HealthIntelligence::new(Arc::new(registry), &SentinelConfig::default());

    let metrics = intelligence.health_metrics_at(1, now()).await.expect("metrics").expect("some");
    assert!((metrics.failure_rate - 100.0).abs() < f64::EPSILON);
    assert!((metrics.days_since_last_restart - 7.0).abs() < f64::EPSILON);

    let rec = intelligence
        .get_recommendation_at(1, now())
        .await
        .expect("query")
        .expect("recommendation");
    assert_eq!(rec.score, 60);
    assert_eq!(rec.urgency, Urgency::Critical);
}

// ============================================================================
// Scenario B: ghost processes
// ============================================================================

#[tokio::test]
async fn ghost_of_stopped_service_is_terminated_and_running_owner_untouched() {
    let process = |id, service_id| TrackedProcess {
        id,
        service_id,
        pid: Some(10_000 + id as u32),
        name: format!("proc-{id}"),
        port: None,
        status: ProcessStatus::Running,
        updated_at: None,
    };
    let registry = Arc::new(
        InMemoryRegistry::new()
            .with_services(vec![
                MonitoredService::new(1, "stopped", "localhost", 3000),
                MonitoredService::new(2, "running", "localhost", 3001).with_status(ServiceStatus::Running),
            ])
            .with_processes(vec![process(1, 1), process(2, 2)]),
    );
    let reconciler = GhostProcessReconciler::new(registry.clone(), Arc::new(NoopInspector), true);

    let result = reconciler.terminate_ghost_processes(1).await;
    assert!(result.success);
    assert_eq!(result.terminated, Some(1));

    let processes = registry.list_tracked_processes().await.expect("list");
    assert_eq!(processes[0].status, ProcessStatus::Terminated);
    assert_eq!(processes[1].status, ProcessStatus::Running);
}

// ============================================================================
// Scenario C: port conflict on start
// ============================================================================

#[tokio::test]
async fn start_on_occupied_port_fails_and_leaves_status() {
    let registry = Arc::new(InMemoryRegistry::new().with_services(vec![
        MonitoredService::new(1, "A", "localhost", 3000).with_status(ServiceStatus::Running),
        MonitoredService::new(2, "B", "localhost", 3000).with_status(ServiceStatus::Stopped),
    ]));
    let controller = RestartController::new(registry.clone(), Arc::new(NoopInspector), &control_config());

    let result = controller.start(2).await;
    assert!(!result.success);
    assert!(result.simulation);
    assert!(result.error.as_deref().expect("error").contains("Port conflict"));

    let b = registry.get_service(2).await.expect("get").expect("exists");
    assert_eq!(b.status, ServiceStatus::Stopped);

    let json = serde_json::to_value(&result).expect("serialize");
    assert_eq!(json["success"], false);
}

// ============================================================================
// Scenario D: restart from Error
// ============================================================================

#[tokio::test]
async fn restart_from_error_records_stopped_before_running() {
    let registry = Arc::new(InMemoryRegistry::new().with_services(vec![
        MonitoredService::new(1, "api", "localhost", 8080).with_status(ServiceStatus::Error),
    ]));
    let controller = RestartController::new(registry.clone(), Arc::new(NoopInspector), &control_config());

    let result = controller.restart(1).await;
    assert!(result.success);
    assert_eq!(result.status, Some(ServiceStatus::Running));

    let events = registry.events_for(1);
    let stopped = events
        .iter()
        .position(|e| e.action == actions::STATUS_CHANGE && e.status == Some(ServiceStatus::Stopped))
        .expect("stopped transition");
    let running = events
        .iter()
        .position(|e| e.action == actions::STATUS_CHANGE && e.status == Some(ServiceStatus::Running))
        .expect("running transition");
    assert!(stopped < running);
    assert!(events.iter().all(|e| e.action != actions::STOP_REQUESTED));
    assert_eq!(events.first().map(|e| e.action.as_str()), Some(actions::RESTART_REQUESTED));
    assert_eq!(events.last().map(|e| e.action.as_str()), Some(actions::RESTART_SUCCEEDED));
}

// ============================================================================
// Properties
// ============================================================================

#[tokio::test]
async fn services_without_events_yield_nothing() {
    let registry = InMemoryRegistry::new()
        .with_services(vec![MonitoredService::new(1, "idle", "localhost", 8080).with_status(ServiceStatus::Error)]);
    let intelligence = HealthIntelligence::new(Arc::new(registry), &SentinelConfig::default());

    assert!(intelligence.get_recommendation_at(1, now()).await.expect("query").is_none());
    assert!(intelligence.generate_prediction_at(1, now()).await.expect("query").is_none());
    assert!(intelligence.get_all_recommendations_at(now()).await.expect("query").is_empty());
}

#[tokio::test]
async fn probabilities_and_scores_stay_in_bounds() {
    let statuses = [
        ServiceStatus::Running,
        ServiceStatus::Stopped,
        ServiceStatus::Unreachable,
        ServiceStatus::Error,
    ];
    let services: Vec<MonitoredService> = statuses
        .iter()
        .enumerate()
        .map(|(i, s)| MonitoredService::new(i as u64 + 1, format!("svc-{i}"), "localhost", 4000 + i as u16).with_status(*s))
        .collect();
    let events: Vec<EventLogEntry> = (1..=4).flat_map(noisy_log).collect();
    let registry = InMemoryRegistry::new().with_services(services).with_events(events);
    let intelligence = HealthIntelligence::new(Arc::new(registry), &SentinelConfig::default());

    for rec in intelligence.get_all_recommendations_at(now()).await.expect("query") {
        assert!(rec.score <= 100);
        assert!(rec.score >= 20);
        assert!((0.0..=100.0).contains(&rec.memory_leak_probability));
    }

    let predictions = intelligence.get_all_predictions_at(now()).await.expect("query");
    assert_eq!(predictions.len(), 4);
    for p in predictions {
        assert!((0.0..=1.0).contains(&p.aggregated_failure_probability));
        assert_eq!(p.time_slots.len(), 24);
        for slot in &p.time_slots {
            assert!((0.0..=1.0).contains(&slot.failure_probability));
            assert!(slot.end_time > slot.start_time);
        }
        assert!(p.high_risk_periods.iter().all(|h| h.failure_probability >= 0.7));
    }
}

#[tokio::test]
async fn critical_status_always_means_critical_urgency() {
    for status in [ServiceStatus::Unreachable, ServiceStatus::Error] {
        let registry = InMemoryRegistry::new()
            .with_services(vec![MonitoredService::new(1, "api", "localhost", 8080).with_status(status)])
            .with_events(noisy_log(1));
        let intelligence = HealthIntelligence::new(Arc::new(registry), &SentinelConfig::default());
        let rec = intelligence
            .get_recommendation_at(1, now())
            .await
            .expect("query")
            .expect("recommendation");
        assert_eq!(rec.urgency, Urgency::Critical, "status {status}");
    }
}

#[tokio::test]
async fn recomputation_is_idempotent() {
    let registry = Arc::new(
        InMemoryRegistry::new()
            .with_services(vec![MonitoredService::new(1, "api", "localhost", 8080).with_status(ServiceStatus::Running)])
            .with_events(noisy_log(1)),
    );
    let before = registry.events();
    let intelligence = HealthIntelligence::new(registry.clone(), &SentinelConfig::default());

    let m1 = intelligence.health_metrics_at(1, now()).await.expect("query");
    let m2 = intelligence.health_metrics_at(1, now()).await.expect("query");
    assert_eq!(m1, m2);

    let r1 = intelligence.get_recommendation_at(1, now()).await.expect("query");
    let r2 = intelligence.get_recommendation_at(1, now()).await.expect("query");
    assert_eq!(r1, r2);

    let p1 = intelligence.generate_prediction_at(1, now()).await.expect("query");
    let p2 = intelligence.generate_prediction_at(1, now()).await.expect("query");
    assert_eq!(p1, p2);

    assert_eq!(registry.events(), before);
}
