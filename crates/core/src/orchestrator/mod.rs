//! The run orchestrator: a bounded-retry state machine over one session.
//!
//! The orchestrator drives up to N sequential attempts of a delegated
//! purchase flow, with cooperative poll-based cancellation, failure
//! classification, and metrics capture. It performs no I/O of its own
//! beyond invoking the [`crate::flow::PurchaseFlow`] trait.

mod runner;
mod types;

pub use runner::TicketRunner;
pub use types::{CancelToken, FailureCode, Phase, RunLogCallback, RunLogEvent, RunLogLevel};
