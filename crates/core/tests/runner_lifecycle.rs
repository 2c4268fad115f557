//! Orchestrator lifecycle integration tests.
//!
//! These exercise the retry state machine end to end against the mock
//! flow: retry budgets, failure classification, cooperative cancellation,
//! and report replacement.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use grabbit_core::testing::{fixtures, MockFlow, ScriptedOutcome};
use grabbit_core::{FailureCode, Phase, RunLogCallback, RunLogEvent, TicketRunner};

fn collecting_callback() -> (RunLogCallback, Arc<Mutex<Vec<RunLogEvent>>>) {
    let events: Arc<Mutex<Vec<RunLogEvent>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let callback: RunLogCallback = Arc::new(move |event| sink.lock().unwrap().push(event));
    (callback, events)
}

#[tokio::test]
async fn test_attempts_bounded_by_retry_budget() {
    let flow = MockFlow::always_fail(Phase::Connect, "connection refused");
    let mut runner = TicketRunner::new(fixtures::fast_session_config(), flow.clone());

    let success = runner.run(3).await;
    assert!(!success);

    let metrics = &runner.last_report().unwrap().metrics;
    assert_eq!(metrics.attempts, 3);
    assert_eq!(flow.attempt_count(), 3);
    assert_eq!(metrics.failure_code, Some(FailureCode::MaxRetries));
    assert!(metrics.failure_reason.as_ref().unwrap().contains('3'));
    assert!(metrics.finished_at >= metrics.started_at);
}

#[tokio::test]
async fn test_success_stops_retrying_even_with_budget_left() {
    let flow = MockFlow::from_script(vec![ScriptedOutcome::Fail(
        Phase::Connect,
        "connection refused".to_string(),
    )]);
    let mut runner = TicketRunner::new(fixtures::fast_session_config(), flow.clone());

    assert!(runner.run(5).await);

    let metrics = &runner.last_report().unwrap().metrics;
    assert_eq!(metrics.attempts, 2);
    assert_eq!(flow.attempt_count(), 2);
    assert_eq!(metrics.final_phase, Phase::Complete);
    assert!(metrics.failure_code.is_none());
    assert!(metrics.failure_reason.is_none());
}

#[tokio::test]
async fn test_zero_retries_clamps_to_one_attempt() {
    let mut runner = TicketRunner::new(fixtures::fast_session_config(), MockFlow::always_succeed());
    assert!(runner.run(0).await);
    assert_eq!(runner.last_report().unwrap().metrics.attempts, 1);
}

#[tokio::test]
async fn test_precancelled_run_reports_user_stopped() {
    let flow = MockFlow::always_succeed();
    let mut runner = TicketRunner::new(fixtures::fast_session_config(), flow.clone());
    runner.cancel_token().cancel();

    let success = runner.run(4).await;
    assert!(!success);

    let metrics = &runner.last_report().unwrap().metrics;
    assert_eq!(metrics.failure_code, Some(FailureCode::UserStopped));
    assert!(metrics.attempts <= 1);
    assert_eq!(flow.attempt_count(), 0, "no attempt should have started");
    assert_eq!(metrics.final_phase, Phase::Init);
}

#[tokio::test]
async fn test_cancellation_observed_at_next_attempt_boundary() {
    let flow = MockFlow::always_fail(Phase::Connect, "connection refused");
    flow.cancel_after_attempts(1);
    let mut runner = TicketRunner::new(fixtures::fast_session_config(), flow.clone());

    let success = runner.run(5).await;
    assert!(!success);

    let metrics = &runner.last_report().unwrap().metrics;
    assert_eq!(metrics.attempts, 1);
    assert_eq!(metrics.failure_code, Some(FailureCode::UserStopped));
    assert_eq!(flow.attempt_count(), 1);
}

#[tokio::test]
async fn test_cancellation_cuts_the_retry_delay_short() {
    let mut config = fixtures::session_config();
    config.retry_delay = 30.0;

    let flow = MockFlow::always_fail(Phase::Connect, "connection refused");
    let mut runner = TicketRunner::new(config, flow);
    let token = runner.cancel_token();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        token.cancel();
    });

    let start = Instant::now();
    let success = runner.run(2).await;
    assert!(!success);
    assert!(
        start.elapsed() < Duration::from_secs(5),
        "cancellation should interrupt the delay promptly, took {:?}",
        start.elapsed()
    );
    assert_eq!(
        runner.last_report().unwrap().metrics.failure_code,
        Some(FailureCode::UserStopped)
    );
}

#[tokio::test]
async fn test_second_run_replaces_the_report_wholesale() {
    let flow = MockFlow::from_script(vec![ScriptedOutcome::Fail(
        Phase::Connect,
        "connection refused".to_string(),
    )]);
    let mut runner = TicketRunner::new(fixtures::fast_session_config(), flow);

    assert!(!runner.run(1).await);
    let first = runner.last_report().unwrap().clone();
    assert!(!first.metrics.success);

    assert!(runner.run(1).await);
    let second = runner.last_report().unwrap();
    assert!(second.metrics.success);
    assert_eq!(second.metrics.attempts, 1);
    assert!(second.metrics.started_at >= first.metrics.finished_at);
}

#[tokio::test]
async fn test_final_phase_records_terminal_attempt_phase() {
    let flow = MockFlow::from_script(vec![
        ScriptedOutcome::Fail(Phase::Connect, "connection refused".to_string()),
        ScriptedOutcome::Fail(Phase::Submit, "order rejected".to_string()),
    ]);
    let mut runner = TicketRunner::new(fixtures::fast_session_config(), flow);

    assert!(!runner.run(2).await);
    let metrics = &runner.last_report().unwrap().metrics;
    assert_eq!(metrics.final_phase, Phase::Submit);
    assert_eq!(metrics.failure_code, Some(FailureCode::MaxRetries));
}

#[tokio::test]
async fn test_connect_failures_classified_apart_from_flow_failures() {
    let (callback, events) = collecting_callback();
    let flow = MockFlow::from_script(vec![
        ScriptedOutcome::Fail(Phase::Connect, "connection refused".to_string()),
        ScriptedOutcome::Fail(Phase::ConfigureSelection, "no such price tier".to_string()),
        ScriptedOutcome::Error("driver panicked".to_string()),
    ]);
    let mut runner = TicketRunner::new(fixtures::fast_session_config(), flow)
        .with_log_callback(callback);

    assert!(!runner.run(3).await);

    let events = events.lock().unwrap();
    let codes: Vec<String> = events
        .iter()
        .filter(|e| e.message.contains("attempt failed"))
        .filter_map(|e| {
            e.context
                .iter()
                .find(|(k, _)| k == "code")
                .map(|(_, v)| v.clone())
        })
        .collect();
    assert_eq!(codes, vec!["connection_failure", "flow_failure"]);
    assert!(events
        .iter()
        .any(|e| e.message.contains("unexpected error")));
}

#[tokio::test]
async fn test_exported_report_reflects_run_metrics() {
    let flow = MockFlow::always_fail(Phase::Locate, "item never appeared");
    let mut runner = TicketRunner::new(fixtures::fast_session_config(), flow);

    runner.run(3).await;
    let report = runner.last_report().unwrap();
    let value = report.to_json();

    assert_eq!(value["attempts"], 3);
    assert_eq!(value["retries"], 2);
    assert_eq!(value["success"], false);
    assert_eq!(value["failure_code"], "max_retries");
    assert_eq!(value["final_phase"], "locate");
}
