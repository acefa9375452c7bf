//! Sentinel Configuration - analysis, scoring, prediction, probe and control tuning
//!
//! Each section implements `Default` with the values in `defaults`, so an
//! empty or missing file behaves exactly like the built-in heuristics.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::defaults;

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for a sentinel deployment.
///
/// Load with `SentinelConfig::load()` which searches:
/// 1. `$SENTINEL_CONFIG` env var
/// 2. `./sentinel.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct SentinelConfig {
    /// Metrics aggregation and pattern mining
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Recommendation scoring
    #[serde(default)]
    pub scoring: ScoringConfig,

    /// Failure forecasting
    #[serde(default)]
    pub prediction: PredictionConfig,

    /// Status probe timeouts
    #[serde(default)]
    pub probe: ProbeConfig,

    /// Restart controller and OS inspector
    #[serde(default)]
    pub control: ControlConfig,

    /// Binary-only settings
    #[serde(default)]
    pub daemon: DaemonConfig,
}

impl SentinelConfig {
    /// Load configuration using the standard search order:
    /// 1. `$SENTINEL_CONFIG` environment variable
    /// 2. `./sentinel.toml` in the current working directory
    /// 3. Built-in defaults
    pub fn load() -> Self {
        if let Ok(path) = std::env::var("SENTINEL_CONFIG") {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded sentinel config from SENTINEL_CONFIG");
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from SENTINEL_CONFIG, falling back");
                    }
                }
            } else {
                warn!(path = %path, "SENTINEL_CONFIG points to non-existent file, falling back");
            }
        }

        let local = PathBuf::from("sentinel.toml");
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded sentinel config from ./sentinel.toml");
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./sentinel.toml, using defaults");
                }
            }
        }

        info!("No sentinel.toml found, using built-in defaults");
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Toml(e) => ConfigError::Parse(path.to_path_buf(), e),
            other => other,
        })
    }

    /// Parse and validate a TOML document. Unknown keys only warn.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        for w in super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }
        Self::parse(contents)
    }

    /// Parse and validate without reporting unknown keys; callers that
    /// present `validate_unknown_keys` themselves use this.
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents).map_err(ConfigError::Toml)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Validate all sections for internal consistency.
    ///
    /// Rules:
    /// - Windows, horizons and intervals must be positive
    /// - Probability thresholds lie in [0,1] and escalate (high <= critical)
    /// - Timeouts must be non-zero
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        let a = &self.analysis;
        if a.window_days == 0 {
            errors.push("analysis.window_days must be > 0".to_string());
        }
        if !(a.restart_interval_days.is_finite() && a.restart_interval_days > 0.0) {
            errors.push(format!(
                "analysis.restart_interval_days must be > 0 (got {})",
                a.restart_interval_days
            ));
        }
        if !(a.leak_threshold_hours.is_finite() && a.leak_threshold_hours > 0.0) {
            errors.push(format!(
                "analysis.leak_threshold_hours must be > 0 (got {})",
                a.leak_threshold_hours
            ));
        }
        if a.min_errors_for_trend < 2 {
            errors.push("analysis.min_errors_for_trend must be >= 2".to_string());
        }
        if a.min_errors_for_pattern == 0 {
            errors.push("analysis.min_errors_for_pattern must be > 0".to_string());
        }
        if !(a.trend_change_threshold.is_finite() && a.trend_change_threshold > 0.0) {
            errors.push("analysis.trend_change_threshold must be > 0".to_string());
        }

        if self.scoring.min_recommendation_score > 100 {
            errors.push(format!(
                "scoring.min_recommendation_score ({}) must be <= 100",
                self.scoring.min_recommendation_score
            ));
        }

        let p = &self.prediction;
        if p.horizon_hours == 0 {
            errors.push("prediction.horizon_hours must be > 0".to_string());
        }
        for (name, value) in [
            ("prediction.high_risk_threshold", p.high_risk_threshold),
            ("prediction.critical_threshold", p.critical_threshold),
            ("prediction.predicted_metrics_threshold", p.predicted_metrics_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                errors.push(format!("{name} = {value} must lie in [0, 1]"));
            }
        }
        if p.critical_threshold < p.high_risk_threshold {
            errors.push(format!(
                "prediction.critical_threshold ({:.2}) must be >= high_risk_threshold ({:.2})",
                p.critical_threshold, p.high_risk_threshold
            ));
        }

        if self.probe.http_timeout_ms == 0 {
            errors.push("probe.http_timeout_ms must be > 0".to_string());
        }
        if self.probe.tcp_timeout_ms == 0 {
            errors.push("probe.tcp_timeout_ms must be > 0".to_string());
        }
        if self.control.inspector_timeout_ms == 0 {
            errors.push("control.inspector_timeout_ms must be > 0".to_string());
        }
        if self.daemon.report_interval_secs == 0 {
            errors.push("daemon.report_interval_secs must be > 0".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config I/O error ({}): {1}", .0.display())]
    Io(PathBuf, std::io::Error),
    #[error("Config parse error ({}): {1}", .0.display())]
    Parse(PathBuf, toml::de::Error),
    #[error("Config parse error: {0}")]
    Toml(toml::de::Error),
    #[error("Config serialization error: {0}")]
    Serialize(toml::ser::Error),
    #[error("Config validation failed:\n  - {}", .0.join("\n  - "))]
    Validation(Vec<String>),
}

// ============================================================================
// Analysis
// ============================================================================

/// How the leak heuristic relates errors to uptime sessions
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LeakCorrelationKind {
    /// Each error advances a synthetic uptime counter by a fixed step
    #[default]
    Synthetic,
    /// Each error is attributed to the session containing its timestamp
    Session,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnalysisConfig {
    pub window_days: u32,
    pub restart_interval_days: f64,
    pub leak_threshold_hours: f64,
    pub min_errors_for_trend: usize,
    pub min_errors_for_pattern: usize,
    pub trend_change_threshold: f64,
    pub leak_correlation: LeakCorrelationKind,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            window_days: defaults::ANALYSIS_WINDOW_DAYS,
            restart_interval_days: defaults::RESTART_INTERVAL_DAYS,
            leak_threshold_hours: defaults::LEAK_THRESHOLD_HOURS,
            min_errors_for_trend: defaults::MIN_ERRORS_FOR_TREND,
            min_errors_for_pattern: defaults::MIN_ERRORS_FOR_PATTERN,
            trend_change_threshold: defaults::TREND_CHANGE_THRESHOLD,
            leak_correlation: LeakCorrelationKind::default(),
        }
    }
}

// ============================================================================
// Scoring
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ScoringConfig {
    pub min_recommendation_score: u32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            min_recommendation_score: defaults::MIN_RECOMMENDATION_SCORE,
        }
    }
}

// ============================================================================
// Prediction
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PredictionConfig {
    pub horizon_hours: u32,
    pub high_risk_threshold: f64,
    pub critical_threshold: f64,
    pub predicted_metrics_threshold: f64,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            horizon_hours: defaults::PREDICTION_HORIZON_HOURS,
            high_risk_threshold: defaults::HIGH_RISK_THRESHOLD,
            critical_threshold: defaults::CRITICAL_RISK_THRESHOLD,
            predicted_metrics_threshold: defaults::PREDICTED_METRICS_THRESHOLD,
        }
    }
}

// ============================================================================
// Probe
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProbeConfig {
    pub http_timeout_ms: u64,
    pub tcp_timeout_ms: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            http_timeout_ms: defaults::HTTP_PROBE_TIMEOUT_MS,
            tcp_timeout_ms: defaults::TCP_PROBE_TIMEOUT_MS,
        }
    }
}

// ============================================================================
// Control
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ControlConfig {
    pub restart_delay_ms: u64,
    pub inspector_timeout_ms: u64,
    /// Start/stop outcomes are simulated rather than performed
    pub simulation: bool,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            restart_delay_ms: defaults::RESTART_DELAY_MS,
            inspector_timeout_ms: defaults::INSPECTOR_TIMEOUT_MS,
            simulation: true,
        }
    }
}

// ============================================================================
// Daemon
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DaemonConfig {
    /// Fleet definition used to seed the in-memory registry
    pub fleet_file: PathBuf,
    /// How often `run` logs the current recommendations
    pub report_interval_secs: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            fleet_file: PathBuf::from("fleet.toml"),
            report_interval_secs: 300,
        }
    }
}
