//! The delegated purchase flow boundary.
//!
//! [`PurchaseFlow`] is the orchestrator's sole integration point with the
//! external automation driver. The orchestrator knows nothing about UI
//! elements; it only sequences attempts and classifies their outcomes.

mod remote;

pub use remote::{probe_server, ProbeError, RemoteDriverFlow};

use async_trait::async_trait;

use crate::config::SessionConfig;
use crate::orchestrator::{CancelToken, Phase};

/// Result of one complete pass through the flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The purchase flow ran to completion.
    Success,
    /// The flow failed at `phase` in a way worth retrying.
    Retry { phase: Phase, message: String },
}

impl AttemptOutcome {
    pub fn retry(phase: Phase, message: impl Into<String>) -> Self {
        Self::Retry {
            phase,
            message: message.into(),
        }
    }
}

/// One attempt of the delegated purchase flow.
///
/// Implementations should poll `cancel` at their own safe points and bail
/// out with a [`AttemptOutcome::Retry`] when a stop is requested; the
/// orchestrator converts the pending cancellation into a terminal
/// user-stopped outcome at the next attempt boundary. An `Err` is the
/// channel for errors outside the anticipated taxonomy.
#[async_trait]
pub trait PurchaseFlow: Send + Sync {
    async fn attempt(
        &self,
        config: &SessionConfig,
        cancel: &CancelToken,
    ) -> anyhow::Result<AttemptOutcome>;
}
