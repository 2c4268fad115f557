//! Test doubles for the purchase flow boundary.
//!
//! [`MockFlow`] substitutes the external automation driver so the
//! orchestrator's retry and classification logic is testable without any
//! real device or server.

mod mock_flow;

pub use mock_flow::{MockFlow, ScriptedOutcome};

/// Ready-made values for tests.
pub mod fixtures {
    use std::collections::BTreeMap;

    use crate::config::SessionConfig;

    /// A plausible single-session config.
    pub fn session_config() -> SessionConfig {
        SessionConfig {
            server_url: "http://127.0.0.1:4723".to_string(),
            keyword: Some("concert".to_string()),
            city: Some("Shanghai".to_string()),
            date: None,
            price: None,
            price_index: None,
            users: vec!["Alice".to_string()],
            if_commit_order: true,
            device_caps: BTreeMap::from([(
                "deviceName".to_string(),
                "emulator-5554".to_string(),
            )]),
            wait_timeout: 2.0,
            retry_delay: 2.0,
        }
    }

    /// Same config with a near-zero retry delay, for retry-heavy tests.
    pub fn fast_session_config() -> SessionConfig {
        SessionConfig {
            retry_delay: 0.01,
            wait_timeout: 0.01,
            ..session_config()
        }
    }
}
