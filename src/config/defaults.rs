//! System-wide default constants.
//!
//! Centralises the numbers the analysis, scoring and control paths share.

// ============================================================================
// Analysis Window
// ============================================================================

/// Days of event log replayed into metrics.
pub const ANALYSIS_WINDOW_DAYS: u32 = 7;

/// Expected days between routine restarts.
pub const RESTART_INTERVAL_DAYS: f64 = 3.0;

/// Average uptime (hours) beyond which leak and degradation heuristics engage.
pub const LEAK_THRESHOLD_HOURS: f64 = 24.0;

/// Minimum error entries before a frequency trend is computed.
pub const MIN_ERRORS_FOR_TREND: usize = 5;

/// Minimum errors in one (hour, weekday) slot before it becomes a pattern.
pub const MIN_ERRORS_FOR_PATTERN: usize = 3;

/// Relative change between window halves that counts as a trend.
pub const TREND_CHANGE_THRESHOLD: f64 = 0.2;

/// Synthetic uptime added per error by the reference leak correlation (minutes).
pub const SYNTHETIC_UPTIME_STEP_MINUTES: f64 = 10.0;

// ============================================================================
// Scoring
// ============================================================================

/// Scores below this produce no recommendation.
pub const MIN_RECOMMENDATION_SCORE: u32 = 20;

// ============================================================================
// Prediction
// ============================================================================

/// Forecast horizon (hourly slots).
pub const PREDICTION_HORIZON_HOURS: u32 = 24;

/// Slot probability at or above which a slot is a high-risk period.
pub const HIGH_RISK_THRESHOLD: f64 = 0.7;

/// Slot probability at or above which a period is labeled critical.
pub const CRITICAL_RISK_THRESHOLD: f64 = 0.9;

/// Slot probability above which predicted metrics are attached.
pub const PREDICTED_METRICS_THRESHOLD: f64 = 0.3;

/// Confidence reported for a slot when no factor fired.
pub const DEFAULT_SLOT_CONFIDENCE: f64 = 50.0;

// ============================================================================
// Probing
// ============================================================================

/// HTTP probe abort (ms).
pub const HTTP_PROBE_TIMEOUT_MS: u64 = 5_000;

/// Raw TCP connect timeout (ms).
pub const TCP_PROBE_TIMEOUT_MS: u64 = 3_000;

// ============================================================================
// Control
// ============================================================================

/// Pause between the stop and start phase of a restart (ms).
pub const RESTART_DELAY_MS: u64 = 2_000;

/// Upper bound on a single OS inspector subprocess call (ms).
pub const INSPECTOR_TIMEOUT_MS: u64 = 10_000;

/// Capacity of the scheduler's port event channel.
pub const PORT_EVENT_CHANNEL_CAPACITY: usize = 256;
