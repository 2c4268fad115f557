//! Ticket run orchestration: bounded retries over one session.

use chrono::Utc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::flow::{AttemptOutcome, PurchaseFlow};
use crate::metrics;
use crate::report::{RunMetrics, RunReport};

use super::types::{CancelToken, FailureCode, Phase, RunLogCallback, RunLogEvent, RunLogLevel};

/// Granularity of cancellation polling inside the inter-attempt delay.
const CANCEL_POLL_SLICE: Duration = Duration::from_millis(100);

/// Drives up to N sequential attempts of the delegated purchase flow for
/// one [`SessionConfig`], producing a [`RunReport`] per run.
///
/// Attempts are strictly sequential; the runner owns its own session
/// establishment through the flow and shares nothing with other runners.
pub struct TicketRunner<F: PurchaseFlow> {
    config: SessionConfig,
    flow: F,
    cancel: CancelToken,
    log_callback: Option<RunLogCallback>,
    last_report: Option<RunReport>,
}

impl<F: PurchaseFlow> TicketRunner<F> {
    pub fn new(config: SessionConfig, flow: F) -> Self {
        Self {
            config,
            flow,
            cancel: CancelToken::new(),
            log_callback: None,
            last_report: None,
        }
    }

    /// Install a structured log callback for phase transitions, retries,
    /// and terminal outcomes.
    pub fn with_log_callback(mut self, callback: RunLogCallback) -> Self {
        self.log_callback = Some(callback);
        self
    }

    /// Share an externally owned cancellation token.
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Clone of the runner's cancellation token, for a stop button or
    /// signal handler to hold.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// The most recent report, or `None` if `run` was never invoked.
    pub fn last_report(&self) -> Option<&RunReport> {
        self.last_report.as_ref()
    }

    /// Execute up to `max_retries` attempts (clamped to at least 1).
    ///
    /// Returns whether the purchase flow completed. The full outcome is in
    /// [`Self::last_report`], which this call replaces wholesale.
    pub async fn run(&mut self, max_retries: u32) -> bool {
        let max_retries = max_retries.max(1);
        let started_at = Utc::now();

        let mut attempts: u32 = 0;
        let mut success = false;
        let mut stopped = false;
        let mut final_phase = Phase::Init;
        let mut failure_reason: Option<String> = None;
        let mut failure_code: Option<FailureCode> = None;

        while attempts < max_retries {
            if self.cancel.is_cancelled() {
                stopped = true;
                failure_code = Some(FailureCode::UserStopped);
                failure_reason = Some("stop requested by user".to_string());
                self.emit(
                    RunLogEvent::new(RunLogLevel::Warning, "stop requested, aborting run")
                        .with("attempt", attempts),
                );
                break;
            }

            attempts += 1;
            final_phase = Phase::Connect;
            self.emit(
                RunLogEvent::new(RunLogLevel::Step, "connecting to automation server")
                    .with("attempt", attempts)
                    .with("phase", Phase::Connect)
                    .with("server", &self.config.server_url),
            );

            match self.flow.attempt(&self.config, &self.cancel).await {
                Ok(AttemptOutcome::Success) => {
                    success = true;
                    final_phase = Phase::Complete;
                    failure_reason = None;
                    failure_code = None;
                    self.emit(
                        RunLogEvent::new(RunLogLevel::Success, "purchase flow completed")
                            .with("attempt", attempts),
                    );
                    break;
                }
                Ok(AttemptOutcome::Retry { phase, message }) => {
                    final_phase = phase;
                    let code = if phase == Phase::Connect {
                        FailureCode::ConnectionFailure
                    } else {
                        FailureCode::FlowFailure
                    };
                    failure_code = Some(code);
                    failure_reason = Some(message.clone());
                    metrics::ATTEMPT_FAILURES
                        .with_label_values(&[code.as_str()])
                        .inc();
                    self.emit(
                        RunLogEvent::new(RunLogLevel::Warning, "attempt failed")
                            .with("attempt", attempts)
                            .with("phase", phase)
                            .with("code", code)
                            .with("reason", &message),
                    );
                }
                Err(err) => {
                    // Unexpected errors override phase-based classification.
                    failure_code = Some(FailureCode::Unexpected);
                    failure_reason = Some(err.to_string());
                    metrics::ATTEMPT_FAILURES
                        .with_label_values(&[FailureCode::Unexpected.as_str()])
                        .inc();
                    self.emit(
                        RunLogEvent::new(RunLogLevel::Error, "attempt raised an unexpected error")
                            .with("attempt", attempts)
                            .with("error", format!("{err:#}")),
                    );
                }
            }

            if attempts < max_retries && !self.cancel.is_cancelled() {
                self.emit(
                    RunLogEvent::new(RunLogLevel::Info, "retrying after delay")
                        .with("attempt", attempts)
                        .with("delay_secs", self.config.retry_delay),
                );
                self.sleep_with_cancel(Duration::from_secs_f64(self.config.retry_delay))
                    .await;
            }
        }

        if !success && !stopped && attempts == max_retries {
            let summary = match &failure_reason {
                Some(last) => format!("no successful attempt in {attempts} tries; last: {last}"),
                None => format!("no successful attempt in {attempts} tries"),
            };
            failure_code = Some(FailureCode::MaxRetries);
            failure_reason = Some(summary);
        }

        let finished_at = Utc::now();
        let metrics_snapshot = RunMetrics {
            attempts,
            started_at,
            finished_at,
            success,
            final_phase,
            failure_reason,
            failure_code,
        };

        metrics::RUNS_TOTAL
            .with_label_values(&[if success { "success" } else { "failed" }])
            .inc();
        metrics::RUN_ATTEMPTS.observe(attempts as f64);
        metrics::RUN_DURATION.observe(metrics_snapshot.duration_secs());

        if success {
            info!(attempts, "run succeeded");
        } else {
            warn!(
                attempts,
                code = metrics_snapshot
                    .failure_code
                    .map(|c| c.as_str())
                    .unwrap_or("none"),
                "run failed"
            );
        }

        self.emit(terminal_event(&metrics_snapshot));
        self.last_report = Some(RunReport::new(metrics_snapshot));
        success
    }

    /// Sleep in slices, polling the cancellation token each slice so a stop
    /// request is observed promptly rather than after the full delay.
    async fn sleep_with_cancel(&self, total: Duration) {
        let mut remaining = total;
        while !remaining.is_zero() {
            if self.cancel.is_cancelled() {
                debug!("cancellation observed during retry delay");
                return;
            }
            let step = remaining.min(CANCEL_POLL_SLICE);
            tokio::time::sleep(step).await;
            remaining = remaining.saturating_sub(step);
        }
    }

    fn emit(&self, event: RunLogEvent) {
        if let Some(callback) = &self.log_callback {
            callback(event);
        }
    }
}

fn terminal_event(metrics: &RunMetrics) -> RunLogEvent {
    let (level, message) = if metrics.success {
        (RunLogLevel::Success, "run finished")
    } else {
        (RunLogLevel::Error, "run finished without success")
    };
    let mut event = RunLogEvent::new(level, message)
        .with("attempts", metrics.attempts)
        .with("final_phase", metrics.final_phase)
        .with("duration_secs", format!("{:.2}", metrics.duration_secs()));
    if let Some(code) = metrics.failure_code {
        event = event.with("code", code);
    }
    event
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixtures, MockFlow, ScriptedOutcome};
    use std::sync::{Arc, Mutex};

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let mut runner = TicketRunner::new(fixtures::session_config(), MockFlow::always_succeed());
        assert!(runner.run(3).await);

        let metrics = &runner.last_report().unwrap().metrics;
        assert_eq!(metrics.attempts, 1);
        assert!(metrics.success);
        assert_eq!(metrics.final_phase, Phase::Complete);
        assert!(metrics.failure_code.is_none());
    }

    #[tokio::test]
    async fn test_no_report_before_first_run() {
        let runner = TicketRunner::new(fixtures::session_config(), MockFlow::always_succeed());
        assert!(runner.last_report().is_none());
    }

    #[tokio::test]
    async fn test_log_events_flow_through_callback() {
        let events: Arc<Mutex<Vec<RunLogEvent>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let callback: RunLogCallback = Arc::new(move |event| sink.lock().unwrap().push(event));

        let mut runner = TicketRunner::new(fixtures::session_config(), MockFlow::always_succeed())
            .with_log_callback(callback);
        runner.run(1).await;

        let events = events.lock().unwrap();
        assert!(events
            .iter()
            .any(|e| e.level == RunLogLevel::Step && e.message.contains("connecting")));
        assert!(events.iter().any(|e| e.level == RunLogLevel::Success));
    }

    #[tokio::test]
    async fn test_unexpected_error_is_retried_and_logged() {
        let flow = MockFlow::from_script(vec![
            ScriptedOutcome::Error("driver exploded".to_string()),
            ScriptedOutcome::Succeed,
        ]);
        let mut runner = TicketRunner::new(fixtures::fast_session_config(), flow);
        assert!(runner.run(3).await);
        assert_eq!(runner.last_report().unwrap().metrics.attempts, 2);
    }
}
