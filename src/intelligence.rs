//! Health intelligence facade
//!
//! Read-side entry point for the route layer and the CLI: recomputes metrics
//! from the registry's event log on every call and derives recommendations
//! and predictions from them. Nothing is cached.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::analysis::HealthAnalyzer;
use crate::config::SentinelConfig;
use crate::prediction::PredictionEngine;
use crate::registry::{Registry, RegistryError};
use crate::scoring::RecommendationScorer;
use crate::types::{HealthMetrics, MonitoredService, RestartRecommendation, ServicePrediction};

pub struct HealthIntelligence {
    registry: Arc<dyn Registry>,
    analyzer: HealthAnalyzer,
    scorer: RecommendationScorer,
    engine: PredictionEngine,
}

impl HealthIntelligence {
    pub fn new(registry: Arc<dyn Registry>, config: &SentinelConfig) -> Self {
        Self {
            registry,
            analyzer: HealthAnalyzer::new(&config.analysis),
            scorer: RecommendationScorer::new(&config.scoring, &config.analysis),
            engine: PredictionEngine::new(&config.prediction, &config.analysis),
        }
    }

    async fn service(&self, service_id: u64) -> Result<MonitoredService, RegistryError> {
        self.registry
            .get_service(service_id)
            .await?
            .ok_or(RegistryError::NotFound {
                kind: "service",
                id: service_id,
            })
    }

    async fn metrics_for(
        &self,
        service: &MonitoredService,
        now: DateTime<Utc>,
    ) -> Result<Option<HealthMetrics>, RegistryError> {
        let logs = self
            .registry
            .query_events(service.id, self.analyzer.window_start(now))
            .await?;
        Ok(self.analyzer.analyze(service, &logs, now))
    }

    // ========================================================================
    // Metrics
    // ========================================================================

    pub async fn health_metrics(&self, service_id: u64) -> Result<Option<HealthMetrics>, RegistryError> {
        self.health_metrics_at(service_id, Utc::now()).await
    }

    pub async fn health_metrics_at(
        &self,
        service_id: u64,
        now: DateTime<Utc>,
    ) -> Result<Option<HealthMetrics>, RegistryError> {
        let service = self.service(service_id).await?;
        self.metrics_for(&service, now).await
    }

    // ========================================================================
    // Recommendations
    // ========================================================================

    pub async fn get_recommendation(&self, service_id: u64) -> Result<Option<RestartRecommendation>, RegistryError> {
        self.get_recommendation_at(service_id, Utc::now()).await
    }

    /// `None` when the service has no entries in the window or scores below the minimum.
    pub async fn get_recommendation_at(
        &self,
        service_id: u64,
        now: DateTime<Utc>,
    ) -> Result<Option<RestartRecommendation>, RegistryError> {
        let service = self.service(service_id).await?;
        let Some(metrics) = self.metrics_for(&service, now).await? else {
            debug!(service = %service.name, "No events in window, no recommendation");
            return Ok(None);
        };
        Ok(self.scorer.recommend(&service, &metrics, now))
    }

    pub async fn get_all_recommendations(&self) -> Result<Vec<RestartRecommendation>, RegistryError> {
        self.get_all_recommendations_at(Utc::now()).await
    }

    /// Recommendations for the whole fleet, highest score first.
    pub async fn get_all_recommendations_at(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<RestartRecommendation>, RegistryError> {
        let mut out = Vec::new();
        for service in self.registry.list_services().await? {
            if let Some(metrics) = self.metrics_for(&service, now).await? {
                out.extend(self.scorer.recommend(&service, &metrics, now));
            }
        }
        out.sort_by(|a, b| b.score.cmp(&a.score).then(a.service_id.cmp(&b.service_id)));
        Ok(out)
    }

    // ========================================================================
    // Predictions
    // ========================================================================

    pub async fn generate_prediction(&self, service_id: u64) -> Result<Option<ServicePrediction>, RegistryError> {
        self.generate_prediction_at(service_id, Utc::now()).await
    }

    /// `None` when the service has no entries in the window.
    pub async fn generate_prediction_at(
        &self,
        service_id: u64,
        now: DateTime<Utc>,
    ) -> Result<Option<ServicePrediction>, RegistryError> {
        let service = self.service(service_id).await?;
        Ok(self
            .metrics_for(&service, now)
            .await?
            .map(|m| self.engine.predict(&service, &m, now)))
    }

    pub async fn get_all_predictions(&self) -> Result<Vec<ServicePrediction>, RegistryError> {
        self.get_all_predictions_at(Utc::now()).await
    }

    /// Predictions for the whole fleet, most at-risk first.
    pub async fn get_all_predictions_at(&self, now: DateTime<Utc>) -> Result<Vec<ServicePrediction>, RegistryError> {
        let mut out = Vec::new();
        for service in self.registry.list_services().await? {
            if let Some(metrics) = self.metrics_for(&service, now).await? {
                out.push(self.engine.predict(&service, &metrics, now));
            }
        }
        out.sort_by(|a, b| {
            b.aggregated_failure_probability
                .total_cmp(&a.aggregated_failure_probability)
                .then(a.service_id.cmp(&b.service_id))
        });
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::InMemoryRegistry;
    use crate::types::{actions, EventLogEntry, ServiceStatus};
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).single().expect("valid")
    }

    fn intelligence() -> HealthIntelligence {
        let registry = InMemoryRegistry::new()
            .with_services(vec![
                MonitoredService::new(1, "quiet", "localhost", 3000).with_status(ServiceStatus::Running),
                MonitoredService::new(2, "down", "localhost", 3001).with_status(ServiceStatus::Unreachable),
            ])
            .with_events(vec![EventLogEntry::new(Some(2), actions::STATUS_CHANGE, "down")
                .with_status(ServiceStatus::Unreachable)
                .at(now() - Duration::hours(2))]);
        HealthIntelligence::new(Arc::new(registry), &SentinelConfig::default())
    }

    #[tokio::test]
    async fn test_no_events_means_no_recommendation_or_prediction() {
        let hi = intelligence();
        assert!(hi.get_recommendation_at(1, now()).await.expect("ok").is_none());
        assert!(hi.generate_prediction_at(1, now()).await.expect("ok").is_none());
    }

    #[tokio::test]
    async fn test_fleet_views_skip_quiet_services() {
        let hi = intelligence();
        let recs = hi.get_all_recommendations_at(now()).await.expect("ok");
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].service_id, 2);
        assert_eq!(recs[0].score, 60);

        let preds = hi.get_all_predictions_at(now()).await.expect("ok");
        assert_eq!(preds.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_service_is_not_found() {
        let hi = intelligence();
        assert!(matches!(
            hi.get_recommendation_at(42, now()).await,
            Err(RegistryError::NotFound { id: 42, .. })
        ));
    }
}
