//! Multi-session batch coordination.
//!
//! Loads an ordered sequence of session configs, runs one orchestrator per
//! session strictly sequentially (never two against the same automation
//! server), aggregates overall success, and optionally exports a
//! consolidated report.

mod runner;
mod types;

pub use runner::{derive_session_label, BatchRunner};
pub use types::{BatchReport, SessionOutcome};
