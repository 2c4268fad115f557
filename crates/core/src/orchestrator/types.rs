use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Stages of the purchase flow, in order. Each attempt passes through a
/// prefix of this sequence; the report records the last phase reached by
/// the terminal attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Init,
    Connect,
    Locate,
    ConfigureSelection,
    Submit,
    Complete,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Connect => "connect",
            Self::Locate => "locate",
            Self::ConfigureSelection => "configure_selection",
            Self::Submit => "submit",
            Self::Complete => "complete",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Machine-classifiable terminal outcome of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCode {
    /// Every attempt in the retry budget failed.
    MaxRetries,
    /// The flow could not establish or keep contact with the automation server.
    ConnectionFailure,
    /// The flow reached a later phase and failed there.
    FlowFailure,
    /// An error outside the anticipated taxonomy.
    Unexpected,
    /// Cooperative cancellation was observed at a safe point.
    UserStopped,
}

impl FailureCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MaxRetries => "max_retries",
            Self::ConnectionFailure => "connection_failure",
            Self::FlowFailure => "flow_failure",
            Self::Unexpected => "unexpected",
            Self::UserStopped => "user_stopped",
        }
    }
}

impl std::fmt::Display for FailureCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared cooperative cancellation flag.
///
/// Best-effort only: the orchestrator polls it at attempt boundaries and in
/// slices of the inter-attempt delay. An attempt already in flight inside
/// the delegated flow can only stop at its own cancellation points.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Reset for reuse across runs.
    pub fn clear(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Severity of a structured run log event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunLogLevel {
    /// A phase transition.
    Step,
    Info,
    Success,
    Warning,
    Error,
}

impl RunLogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Step => "step",
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for RunLogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One structured log event: level, message, ordered key/value context.
#[derive(Debug, Clone, Serialize)]
pub struct RunLogEvent {
    pub level: RunLogLevel,
    pub message: String,
    pub context: Vec<(String, String)>,
}

impl RunLogEvent {
    pub fn new(level: RunLogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            context: Vec::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.context.push((key.into(), value.to_string()));
        self
    }
}

/// Callback consuming run log events.
///
/// May be invoked from the orchestrator's own execution context; consumers
/// that touch shared or UI-owned state must marshal onto their own context.
pub type RunLogCallback = Arc<dyn Fn(RunLogEvent) + Send + Sync>;
