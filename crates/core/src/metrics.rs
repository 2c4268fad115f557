//! Prometheus metrics for the run orchestrator and batch coordinator.

use once_cell::sync::Lazy;
use prometheus::{Histogram, HistogramOpts, IntCounterVec, Opts};

/// Completed orchestrator runs by result.
pub static RUNS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("grabbit_runs_total", "Total orchestrator runs"),
        &["result"], // "success", "failed"
    )
    .unwrap()
});

/// Per-attempt failures by classification, counted before any retry.
pub static ATTEMPT_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "grabbit_attempt_failures_total",
            "Failed attempts by classification",
        ),
        &["code"], // "connection_failure", "flow_failure", "unexpected"
    )
    .unwrap()
});

/// Attempts consumed per run.
pub static RUN_ATTEMPTS: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new("grabbit_run_attempts", "Attempts consumed per run")
            .buckets(vec![1.0, 2.0, 3.0, 5.0, 8.0, 13.0]),
    )
    .unwrap()
});

/// Run duration in seconds.
pub static RUN_DURATION: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new("grabbit_run_duration_seconds", "Duration of one run")
            .buckets(vec![0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]),
    )
    .unwrap()
});

/// Batch sessions by result.
pub static BATCH_SESSIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("grabbit_batch_sessions_total", "Batch sessions by result"),
        &["result"],
    )
    .unwrap()
});

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(RUNS_TOTAL.clone()),
        Box::new(ATTEMPT_FAILURES.clone()),
        Box::new(RUN_ATTEMPTS.clone()),
        Box::new(RUN_DURATION.clone()),
        Box::new(BATCH_SESSIONS.clone()),
    ]
}
