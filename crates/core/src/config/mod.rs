//! Session configuration: parsing, validation, and loading.
//!
//! A session file is a JSONC document holding either a single session object
//! or an array of them (one batch entry per object). Validation is
//! aggregating: every field violation is collected before the error is
//! reported, so a user can fix the whole file in one pass.

mod loader;
mod types;
mod validate;

pub use loader::{load_all, parse_payloads, strip_jsonc_comments};
pub use types::SessionConfig;
pub use validate::{check, validate};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    #[error("failed to parse configuration: {0}")]
    Parse(String),

    /// Aggregated field-level violations. `errors` carries every problem
    /// found, prefixed with the session index for multi-session files.
    #[error("{message}")]
    Validation { message: String, errors: Vec<String> },
}

impl ConfigError {
    pub(crate) fn validation(errors: Vec<String>) -> Self {
        let message = if errors.len() == 1 {
            "configuration has 1 problem".to_string()
        } else {
            format!("configuration has {} problems", errors.len())
        };
        Self::Validation { message, errors }
    }
}
