//! Mock purchase flow for testing.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::SessionConfig;
use crate::flow::{AttemptOutcome, PurchaseFlow};
use crate::orchestrator::{CancelToken, Phase};

/// One scripted response of the mock flow.
#[derive(Debug, Clone)]
pub enum ScriptedOutcome {
    Succeed,
    /// Recoverable failure at the given phase.
    Fail(Phase, String),
    /// Propagate an unexpected error.
    Error(String),
}

/// Mock implementation of [`PurchaseFlow`].
///
/// Responses are consumed from a script, falling back to a fixed outcome
/// once the script is drained. Attempts are counted for assertions, and an
/// optional trip-wire cancels the run's token after the Nth attempt to
/// exercise cooperative cancellation.
///
/// # Example
///
/// ```rust,ignore
/// use grabbit_core::testing::{fixtures, MockFlow, ScriptedOutcome};
///
/// let flow = MockFlow::from_script(vec![
///     ScriptedOutcome::Fail(Phase::Connect, "refused".into()),
///     ScriptedOutcome::Succeed,
/// ]);
/// let mut runner = TicketRunner::new(fixtures::fast_session_config(), flow.clone());
/// assert!(runner.run(3).await);
/// assert_eq!(flow.attempt_count(), 2);
/// ```
#[derive(Clone)]
pub struct MockFlow {
    script: Arc<Mutex<VecDeque<ScriptedOutcome>>>,
    fallback: ScriptedOutcome,
    attempts: Arc<AtomicU32>,
    attempt_delay: Arc<Mutex<Option<Duration>>>,
    cancel_after: Arc<Mutex<Option<u32>>>,
}

impl MockFlow {
    fn with_fallback(fallback: ScriptedOutcome) -> Self {
        Self {
            script: Arc::new(Mutex::new(VecDeque::new())),
            fallback,
            attempts: Arc::new(AtomicU32::new(0)),
            attempt_delay: Arc::new(Mutex::new(None)),
            cancel_after: Arc::new(Mutex::new(None)),
        }
    }

    /// Every attempt succeeds.
    pub fn always_succeed() -> Self {
        Self::with_fallback(ScriptedOutcome::Succeed)
    }

    /// Every attempt fails recoverably at the given phase.
    pub fn always_fail(phase: Phase, message: impl Into<String>) -> Self {
        Self::with_fallback(ScriptedOutcome::Fail(phase, message.into()))
    }

    /// Consume the given outcomes in order, then succeed.
    pub fn from_script(outcomes: Vec<ScriptedOutcome>) -> Self {
        let flow = Self::always_succeed();
        *flow.script.lock().unwrap() = outcomes.into();
        flow
    }

    /// Number of attempts the mock has served.
    pub fn attempt_count(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Simulate a slow attempt.
    pub fn set_attempt_delay(&self, delay: Duration) {
        *self.attempt_delay.lock().unwrap() = Some(delay);
    }

    /// Cancel the run's token once the Nth attempt completes.
    pub fn cancel_after_attempts(&self, n: u32) {
        *self.cancel_after.lock().unwrap() = Some(n);
    }
}

#[async_trait]
impl PurchaseFlow for MockFlow {
    async fn attempt(
        &self,
        _config: &SessionConfig,
        cancel: &CancelToken,
    ) -> anyhow::Result<AttemptOutcome> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;

        let delay = *self.attempt_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(threshold) = *self.cancel_after.lock().unwrap() {
            if attempt >= threshold {
                cancel.cancel();
            }
        }

        let outcome = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        match outcome {
            ScriptedOutcome::Succeed => Ok(AttemptOutcome::Success),
            ScriptedOutcome::Fail(phase, message) => Ok(AttemptOutcome::Retry { phase, message }),
            ScriptedOutcome::Error(message) => Err(anyhow::anyhow!(message)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    #[tokio::test]
    async fn test_script_consumed_in_order_then_fallback() {
        let flow = MockFlow::from_script(vec![ScriptedOutcome::Fail(
            Phase::Submit,
            "sold out".to_string(),
        )]);
        let config = fixtures::session_config();
        let cancel = CancelToken::new();

        let first = flow.attempt(&config, &cancel).await.unwrap();
        assert!(matches!(first, AttemptOutcome::Retry { phase: Phase::Submit, .. }));

        let second = flow.attempt(&config, &cancel).await.unwrap();
        assert_eq!(second, AttemptOutcome::Success);
        assert_eq!(flow.attempt_count(), 2);
    }

    #[tokio::test]
    async fn test_error_outcome_propagates() {
        let flow = MockFlow::from_script(vec![ScriptedOutcome::Error("boom".to_string())]);
        let result = flow
            .attempt(&fixtures::session_config(), &CancelToken::new())
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_cancel_trip_wire_fires() {
        let flow = MockFlow::always_fail(Phase::Connect, "refused");
        flow.cancel_after_attempts(1);
        let cancel = CancelToken::new();

        let _ = flow.attempt(&fixtures::session_config(), &cancel).await;
        assert!(cancel.is_cancelled());
    }
}
