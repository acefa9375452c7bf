//! Recommended actions for a forecast, tailored by service type.
//!
//! Rules are evaluated in priority order and every matching rule contributes
//! one action line.

use crate::scoring::weekday_name;
use crate::types::{ErrorTrend, HealthMetrics, MonitoredService, RiskLevel, ServicePrediction, ServiceType};

pub struct ActionContext<'a> {
    pub service: &'a MonitoredService,
    pub metrics: &'a HealthMetrics,
    pub prediction: &'a ServicePrediction,
    pub restart_interval_days: f64,
}

pub struct ActionRule {
    pub name: &'static str,
    pub applies: fn(&ActionContext<'_>) -> bool,
    pub render: fn(&ActionContext<'_>) -> String,
}

pub const ACTION_RULES: &[ActionRule] = &[
    ActionRule {
        name: "critical_status",
        applies: |c| c.service.status.is_critical(),
        render: |c| format!("Restart {} now: it is currently {}", c.service.name, c.service.status),
    },
    ActionRule {
        name: "high_risk_window",
        applies: |c| c.prediction.risk_level >= RiskLevel::High || !c.prediction.high_risk_periods.is_empty(),
        render: |c| match c.prediction.high_risk_periods.first() {
            Some(p) => format!("Schedule a controlled restart before {} UTC", p.start_time.format("%H:00")),
            None => "Schedule a controlled restart at the next quiet period".to_string(),
        },
    },
    ActionRule {
        name: "memory_leak",
        applies: |c| c.metrics.memory_leak_likelihood > 40.0,
        render: |c| leak_action(c.service.service_type).to_string(),
    },
    ActionRule {
        name: "time_pattern",
        applies: |c| !c.metrics.time_based_patterns.is_empty(),
        render: |c| {
            let p = &c.metrics.time_based_patterns[0];
            format!(
                "Avoid deployments and batch jobs around {:02}:00 UTC on {}",
                p.hour,
                weekday_name(p.day_of_week)
            )
        },
    },
    ActionRule {
        name: "rising_errors",
        applies: |c| c.metrics.error_frequency_trend == ErrorTrend::Increasing,
        render: |_| "Investigate the rising error rate in recent logs".to_string(),
    },
    ActionRule {
        name: "degradation",
        applies: |c| c.metrics.performance_degradation > 25.0,
        render: |c| degradation_action(c.service.service_type).to_string(),
    },
    ActionRule {
        name: "restart_overdue",
        applies: |c| c.metrics.days_since_last_restart > c.restart_interval_days,
        render: |c| {
            format!(
                "Plan a routine restart (last restart {:.1} days ago)",
                c.metrics.days_since_last_restart
            )
        },
    },
];

const fn leak_action(service_type: ServiceType) -> &'static str {
    match service_type {
        ServiceType::Database => "Recycle the connection pool and force a checkpoint before memory pressure builds",
        ServiceType::Frontend => "Clear asset caches and recycle render workers to release memory",
        ServiceType::Backend => "Recycle worker processes and capture a heap snapshot for leak analysis",
        ServiceType::Other => "Capture memory usage and plan a restart to reclaim memory",
    }
}

const fn degradation_action(service_type: ServiceType) -> &'static str {
    match service_type {
        ServiceType::Database => "Review slow queries and index health",
        ServiceType::Frontend => "Check bundle sizes and CDN cache hit rates",
        ServiceType::Backend => "Profile request latency and worker pool saturation",
        ServiceType::Other => "Review resource usage on the host",
    }
}

/// All applicable actions in priority order, or a monitoring note when none apply.
pub fn recommended_actions(ctx: &ActionContext<'_>) -> Vec<String> {
    let actions: Vec<String> = ACTION_RULES
        .iter()
        .filter(|rule| (rule.applies)(ctx))
        .map(|rule| (rule.render)(ctx))
        .collect();

    if actions.is_empty() {
        vec!["No action needed; continue routine monitoring".to_string()]
    } else {
        actions
    }
}
