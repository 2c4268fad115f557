//! Immutable snapshot of one orchestrator run.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{json, Value};

use crate::orchestrator::{FailureCode, Phase};

/// Metrics captured exactly once per run, immutable after completion.
///
/// Invariant: `success == true` iff `failure_code.is_none()`.
#[derive(Debug, Clone, Serialize)]
pub struct RunMetrics {
    pub attempts: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub success: bool,
    pub final_phase: Phase,
    pub failure_reason: Option<String>,
    pub failure_code: Option<FailureCode>,
}

impl RunMetrics {
    /// Wall-clock duration of the run in seconds, floored at zero.
    pub fn duration_secs(&self) -> f64 {
        let millis = (self.finished_at - self.started_at).num_milliseconds();
        (millis as f64 / 1000.0).max(0.0)
    }

    /// Attempts beyond the first, floored at zero.
    pub fn retries(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }
}

/// Wraps one [`RunMetrics`]; owned by the runner that produced it. A new
/// run replaces the report wholesale — reports are never merged.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub metrics: RunMetrics,
}

impl RunReport {
    pub fn new(metrics: RunMetrics) -> Self {
        Self { metrics }
    }

    /// Plain mapping for JSON export, including the derived duration and
    /// retry count.
    pub fn to_json(&self) -> Value {
        let m = &self.metrics;
        json!({
            "attempts": m.attempts,
            "started_at": m.started_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            "finished_at": m.finished_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            "success": m.success,
            "final_phase": m.final_phase,
            "failure_reason": &m.failure_reason,
            "failure_code": m.failure_code,
            "duration_secs": m.duration_secs(),
            "retries": m.retries(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn metrics(success: bool) -> RunMetrics {
        RunMetrics {
            attempts: 3,
            started_at: Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
            finished_at: Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 5).unwrap(),
            success,
            final_phase: if success { Phase::Complete } else { Phase::Connect },
            failure_reason: (!success).then(|| "connection refused".to_string()),
            failure_code: (!success).then_some(FailureCode::MaxRetries),
        }
    }

    #[test]
    fn test_duration_and_retries_derived() {
        let m = metrics(true);
        assert_eq!(m.duration_secs(), 5.0);
        assert_eq!(m.retries(), 2);
    }

    #[test]
    fn test_duration_floors_at_zero() {
        let mut m = metrics(true);
        std::mem::swap(&mut m.started_at, &mut m.finished_at);
        assert_eq!(m.duration_secs(), 0.0);
    }

    #[test]
    fn test_to_json_preserves_every_field() {
        let report = RunReport::new(metrics(false));
        let value = report.to_json();
        assert_eq!(value["attempts"], 3);
        assert_eq!(value["success"], false);
        assert_eq!(value["final_phase"], "connect");
        assert_eq!(value["failure_code"], "max_retries");
        assert_eq!(value["failure_reason"], "connection refused");
        assert_eq!(value["duration_secs"], 5.0);
        assert_eq!(value["retries"], 2);
        assert!(value["started_at"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn test_success_has_no_failure_code() {
        let report = RunReport::new(metrics(true));
        let value = report.to_json();
        assert_eq!(value["failure_code"], Value::Null);
        assert_eq!(value["failure_reason"], Value::Null);
    }
}
