//! Uptime/error correlation strategies for the memory-leak heuristic
//!
//! Sessions are split into short/medium/long tertiles by duration and the
//! error density (errors per session-hour) of each tertile is compared.
//! Density rising with session length suggests a leak. How an error is
//! assigned to a tertile is the swappable part.

use chrono::{DateTime, Utc};

use crate::config::defaults::SYNTHETIC_UPTIME_STEP_MINUTES;
use crate::config::LeakCorrelationKind;
use crate::types::UptimeSession;

/// Density rises monotonically from short to long sessions
pub const STRONG_POSITIVE: f64 = 0.8;
/// Long sessions are denser than short ones
pub const WEAK_POSITIVE: f64 = 0.5;
/// Short sessions are denser than long ones
pub const NEGATIVE: f64 = -0.5;

/// Fewer sessions than this gives no correlation
const MIN_SESSIONS: usize = 3;

/// Maps errors onto session tertiles and returns a qualitative correlation
/// in {-0.5, 0, 0.5, 0.8}.
pub trait LeakCorrelation: Send + Sync {
    fn name(&self) -> &'static str;

    fn correlate(&self, sessions: &[UptimeSession], error_times: &[DateTime<Utc>]) -> f64;
}

pub fn strategy_for(kind: LeakCorrelationKind) -> Box<dyn LeakCorrelation> {
    match kind {
        LeakCorrelationKind::Synthetic => Box::new(SyntheticUptimeCorrelation),
        LeakCorrelationKind::Session => Box::new(SessionTimestampCorrelation),
    }
}

/// Points the correlation contributes to leak likelihood.
pub fn correlation_points(correlation: f64) -> f64 {
    if correlation >= STRONG_POSITIVE {
        40.0
    } else if correlation >= WEAK_POSITIVE {
        20.0
    } else {
        0.0
    }
}

// ============================================================================
// Tertiles
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tertile {
    Short = 0,
    Medium = 1,
    Long = 2,
}

/// Session-duration tertile boundaries and per-tertile exposure hours
struct Tertiles {
    medium_from: f64,
    long_from: f64,
    exposure_hours: [f64; 3],
}

impl Tertiles {
    fn build(sessions: &[UptimeSession]) -> Option<Self> {
        if sessions.len() < MIN_SESSIONS {
            return None;
        }
        let mut durations: Vec<f64> = sessions.iter().map(UptimeSession::duration_minutes).collect();
        durations.sort_by(f64::total_cmp);

        let n = durations.len();
        let mut tertiles = Self {
            medium_from: durations[n / 3],
            long_from: durations[2 * n / 3],
            exposure_hours: [0.0; 3],
        };
        for d in &durations {
            tertiles.exposure_hours[tertiles.classify(*d) as usize] += d / 60.0;
        }
        Some(tertiles)
    }

    fn classify(&self, minutes: f64) -> Tertile {
        if minutes < self.medium_from {
            Tertile::Short
        } else if minutes < self.long_from {
            Tertile::Medium
        } else {
            Tertile::Long
        }
    }

    fn correlation(&self, errors: [usize; 3]) -> f64 {
        let density = |t: Tertile| {
            let hours = self.exposure_hours[t as usize];
            if hours > 0.0 {
                errors[t as usize] as f64 / hours
            } else {
                0.0
            }
        };
        let (short, medium, long) = (density(Tertile::Short), density(Tertile::Medium), density(Tertile::Long));

        if long > medium && medium > short {
            STRONG_POSITIVE
        } else if long > short {
            WEAK_POSITIVE
        } else if long < short {
            NEGATIVE
        } else {
            0.0
        }
    }
}

// ============================================================================
// Strategies
// ============================================================================

/// Reference heuristic: every error advances a synthetic uptime counter by
/// a fixed step and is bucketed by that counter, ignoring real timestamps.
pub struct SyntheticUptimeCorrelation;

impl LeakCorrelation for SyntheticUptimeCorrelation {
    fn name(&self) -> &'static str {
        "synthetic"
    }

    fn correlate(&self, sessions: &[UptimeSession], error_times: &[DateTime<Utc>]) -> f64 {
        let Some(tertiles) = Tertiles::build(sessions) else {
            return 0.0;
        };
        let mut errors = [0usize; 3];
        let mut uptime = 0.0;
        for _ in error_times {
            uptime += SYNTHETIC_UPTIME_STEP_MINUTES;
            errors[tertiles.classify(uptime) as usize] += 1;
        }
        tertiles.correlation(errors)
    }
}

/// Each error counts against the tertile of the session containing it;
/// errors outside every session are ignored.
pub struct SessionTimestampCorrelation;

impl LeakCorrelation for SessionTimestampCorrelation {
    fn name(&self) -> &'static str {
        "session"
    }

    fn correlate(&self, sessions: &[UptimeSession], error_times: &[DateTime<Utc>]) -> f64 {
        let Some(tertiles) = Tertiles::build(sessions) else {
            return 0.0;
        };
        let mut errors = [0usize; 3];
        for ts in error_times {
            if let Some(session) = sessions.iter().find(|s| s.contains(*ts)) {
                errors[tertiles.classify(session.duration_minutes()) as usize] += 1;
            }
        }
        tertiles.correlation(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 1, 0, 0, 0).single().expect("valid")
    }

    /// Back-to-back sessions of the given lengths (minutes), 1 minute apart.
    fn sessions(lengths: &[i64]) -> Vec<UptimeSession> {
        let mut start = t0();
        lengths
            .iter()
            .map(|&len| {
                let s = UptimeSession {
                    start,
                    end: start + Duration::minutes(len),
                    open: false,
                };
                start = s.end + Duration::minutes(1);
                s
            })
            .collect()
    }

    #[test]
    fn test_too_few_sessions_is_zero() {
        let s = sessions(&[60, 120]);
        assert!(SessionTimestampCorrelation.correlate(&s, &[t0()]).abs() < f64::EPSILON);
        assert!(SyntheticUptimeCorrelation.correlate(&s, &[t0()]).abs() < f64::EPSILON);
    }

    #[test]
    fn test_session_strategy_detects_errors_in_long_sessions() {
        let s = sessions(&[60, 600, 3000]);
        // errors: none in short, 1 in medium, 20 in long
        let mut errors = vec![s[1].start + Duration::minutes(5)];
        errors.extend((0..20).map(|i| s[2].start + Duration::minutes(10 + i)));
        // densities: 0, 0.1/h, 0.4/h
        assert!((SessionTimestampCorrelation.correlate(&s, &errors) - STRONG_POSITIVE).abs() < f64::EPSILON);
    }

    #[test]
    fn test_session_strategy_negative_when_short_sessions_fail() {
        let s = sessions(&[60, 600, 3000]);
        let errors: Vec<_> = (0..5).map(|i| s[0].start + Duration::minutes(i)).collect();
        assert!((SessionTimestampCorrelation.correlate(&s, &errors) - NEGATIVE).abs() < f64::EPSILON);
    }

    #[test]
    fn test_synthetic_counter_buckets_by_error_count() {
        // tertile boundaries: medium from 30 min, long from 60 min
        let s = sessions(&[20, 30, 60]);
        // 10, 20 -> short; 30, 40, 50 -> medium; 60.. -> long
        let errors: Vec<_> = (0..10).map(|i| t0() + Duration::days(i)).collect();
        // short 2/(20/60)=6/h, medium 3/(30/60)=6/h, long 5/1h=5/h -> long < short
        assert!((SyntheticUptimeCorrelation.correlate(&s, &errors) - NEGATIVE).abs() < f64::EPSILON);
    }

    #[test]
    fn test_points() {
        assert!((correlation_points(STRONG_POSITIVE) - 40.0).abs() < f64::EPSILON);
        assert!((correlation_points(WEAK_POSITIVE) - 20.0).abs() < f64::EPSILON);
        assert!(correlation_points(0.0).abs() < f64::EPSILON);
        assert!(correlation_points(NEGATIVE).abs() < f64::EPSILON);
    }
}
