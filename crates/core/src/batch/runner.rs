use std::sync::Arc;
use tracing::info;

use crate::config::SessionConfig;
use crate::flow::PurchaseFlow;
use crate::metrics;
use crate::orchestrator::{CancelToken, RunLogCallback, RunLogEvent, TicketRunner};

use super::types::{BatchReport, SessionOutcome};

/// Derive a unique display label for one session.
///
/// Prefers the device name and udid from the capabilities, falls back to
/// the server address, and always prefixes the 1-based session index so
/// labels stay unique even when capabilities collide.
pub fn derive_session_label(config: &SessionConfig, index: usize) -> String {
    let mut parts: Vec<&str> = Vec::new();
    if let Some(name) = config.device_caps.get("deviceName") {
        if !name.is_empty() {
            parts.push(name);
        }
    }
    if let Some(udid) = config.device_caps.get("udid") {
        if !udid.is_empty() && !parts.contains(&udid.as_str()) {
            parts.push(udid);
        }
    }

    let descriptor = if parts.is_empty() {
        config.server_url.clone()
    } else {
        parts.join("/")
    };
    format!("device-{index}:{descriptor}")
}

/// Runs one orchestrator per session, strictly sequentially, and collects
/// the outcomes into a [`BatchReport`].
///
/// Per-session failures are contained: a failing session never aborts its
/// siblings. Overall success is the AND over every session.
pub struct BatchRunner<F> {
    configs: Vec<SessionConfig>,
    make_flow: F,
    log_callback: Option<RunLogCallback>,
    cancel: CancelToken,
}

impl<F, P> BatchRunner<F>
where
    F: Fn(&SessionConfig) -> P,
    P: PurchaseFlow,
{
    /// `make_flow` builds one fresh flow per session; no automation
    /// resource is shared across runners.
    pub fn new(configs: Vec<SessionConfig>, make_flow: F) -> Self {
        Self {
            configs,
            make_flow,
            log_callback: None,
            cancel: CancelToken::new(),
        }
    }

    /// Structured log callback applied to every session, with
    /// `session=<label>` merged into each event's context.
    pub fn with_log_callback(mut self, callback: RunLogCallback) -> Self {
        self.log_callback = Some(callback);
        self
    }

    /// Share one cancellation token across every session in the batch.
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub async fn run(&self, max_retries: u32) -> BatchReport {
        let mut runs = Vec::with_capacity(self.configs.len());

        for (idx, config) in self.configs.iter().enumerate() {
            let label = derive_session_label(config, idx + 1);
            info!(session = %label, "starting session");

            let flow = (self.make_flow)(config);
            let mut runner = TicketRunner::new(config.clone(), flow)
                .with_cancel_token(self.cancel.clone());
            if let Some(callback) = &self.log_callback {
                runner =
                    runner.with_log_callback(session_scoped(Arc::clone(callback), label.clone()));
            }

            let success = runner.run(max_retries).await;
            metrics::BATCH_SESSIONS
                .with_label_values(&[if success { "success" } else { "failed" }])
                .inc();

            runs.push(SessionOutcome {
                label,
                success,
                config: config.clone(),
                report: runner.last_report().cloned(),
            });
        }

        BatchReport::new(runs)
    }
}

/// Wrap a callback so every event carries the session label first in its
/// context.
fn session_scoped(parent: RunLogCallback, label: String) -> RunLogCallback {
    Arc::new(move |mut event: RunLogEvent| {
        event.context.insert(0, ("session".to_string(), label.clone()));
        parent(event);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    #[test]
    fn test_label_prefers_device_name_and_udid() {
        let mut config = fixtures::session_config();
        config
            .device_caps
            .insert("udid".to_string(), "0123456789".to_string());
        let label = derive_session_label(&config, 2);
        assert_eq!(label, "device-2:emulator-5554/0123456789");
    }

    #[test]
    fn test_label_falls_back_to_server_url() {
        let mut config = fixtures::session_config();
        config.device_caps.clear();
        let label = derive_session_label(&config, 1);
        assert_eq!(label, "device-1:http://127.0.0.1:4723");
    }

    #[test]
    fn test_label_deduplicates_name_and_udid() {
        let mut config = fixtures::session_config();
        config
            .device_caps
            .insert("udid".to_string(), "emulator-5554".to_string());
        let label = derive_session_label(&config, 3);
        assert_eq!(label, "device-3:emulator-5554");
    }
}
