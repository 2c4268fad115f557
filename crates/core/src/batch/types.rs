use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Value};
use std::fs;
use std::io;
use std::path::Path;

use crate::config::SessionConfig;
use crate::report::RunReport;

/// One session's result within a batch.
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    /// Unique label, index-prefixed (see [`super::derive_session_label`]).
    pub label: String,
    pub success: bool,
    pub config: SessionConfig,
    /// `None` only if the runner never produced a report.
    pub report: Option<RunReport>,
}

/// Consolidated result of one batch run.
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub generated_at: DateTime<Utc>,
    pub overall_success: bool,
    pub runs: Vec<SessionOutcome>,
}

impl BatchReport {
    pub fn new(runs: Vec<SessionOutcome>) -> Self {
        Self {
            generated_at: Utc::now(),
            overall_success: runs.iter().all(|run| run.success),
            runs,
        }
    }

    /// Export shape: `{generated_at, overall_success, runs: [{session,
    /// success, config, report|null}]}` with a UTC ISO-8601 timestamp.
    pub fn to_json(&self) -> Value {
        json!({
            "generated_at": self.generated_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            "overall_success": self.overall_success,
            "runs": self.runs.iter().map(|run| {
                json!({
                    "session": &run.label,
                    "success": run.success,
                    "config": &run.config,
                    "report": run.report.as_ref().map(RunReport::to_json),
                })
            }).collect::<Vec<_>>(),
        })
    }

    /// Write the export as pretty-printed JSON, creating parent directories.
    pub fn write_to(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let rendered = serde_json::to_string_pretty(&self.to_json())?;
        fs::write(path, rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    fn outcome(label: &str, success: bool) -> SessionOutcome {
        SessionOutcome {
            label: label.to_string(),
            success,
            config: fixtures::session_config(),
            report: None,
        }
    }

    #[test]
    fn test_overall_success_is_and_over_sessions() {
        let report = BatchReport::new(vec![outcome("a", true), outcome("b", false)]);
        assert!(!report.overall_success);

        let report = BatchReport::new(vec![outcome("a", true), outcome("b", true)]);
        assert!(report.overall_success);
    }

    #[test]
    fn test_export_shape() {
        let report = BatchReport::new(vec![outcome("device-1:emu", true)]);
        let value = report.to_json();

        assert!(value["generated_at"].as_str().unwrap().ends_with('Z'));
        assert_eq!(value["overall_success"], true);
        let runs = value["runs"].as_array().unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0]["session"], "device-1:emu");
        assert_eq!(runs[0]["report"], Value::Null);
        assert_eq!(runs[0]["config"]["server_url"], "http://127.0.0.1:4723");
    }

    #[test]
    fn test_write_to_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested").join("report.json");

        let report = BatchReport::new(vec![outcome("a", true)]);
        report.write_to(&target).unwrap();

        let text = fs::read_to_string(&target).unwrap();
        let parsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["overall_success"], true);
    }
}
