//! WebDriver-protocol flow client.
//!
//! Drives the purchase through an Appium-compatible automation server at
//! the phase level: session create, UI reachability check, selection
//! criteria push, driver-side purchase invocation, session teardown. All
//! element lookup and in-app navigation is owned by the automation server;
//! this client only sequences the protocol calls and maps failures onto
//! the phase where they occurred.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use super::{AttemptOutcome, PurchaseFlow};
use crate::config::SessionConfig;
use crate::orchestrator::{CancelToken, Phase};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("automation server unreachable: {0}")]
    Unreachable(String),

    #[error("automation server returned status {0}")]
    BadStatus(u16),
}

/// Readiness GET against `{server_url}/status`. Informational only; this
/// is never the flow's attempt path.
pub async fn probe_server(server_url: &str) -> Result<(), ProbeError> {
    let base = server_url.trim_end_matches('/');
    let client = reqwest::Client::builder()
        .timeout(PROBE_TIMEOUT)
        .build()
        .map_err(|e| ProbeError::Unreachable(e.to_string()))?;

    let response = client
        .get(format!("{base}/status"))
        .send()
        .await
        .map_err(|e| ProbeError::Unreachable(e.to_string()))?;

    if response.status() == reqwest::StatusCode::OK {
        Ok(())
    } else {
        Err(ProbeError::BadStatus(response.status().as_u16()))
    }
}

/// Phase-sequenced client for a remote automation session.
///
/// Cloning shares the HTTP connection pool; each runner still establishes
/// its own automation session per attempt.
#[derive(Clone)]
pub struct RemoteDriverFlow {
    http: reqwest::Client,
}

impl RemoteDriverFlow {
    pub fn new() -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { http })
    }

    /// POST a JSON body, mapping transport and HTTP-status failures to a
    /// human message. Returns the parsed response body.
    async fn post_json(&self, url: String, body: &Value) -> Result<Value, String> {
        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| format!("request to {url} failed: {e}"))?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("{url} returned {status}"));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| format!("invalid response from {url}: {e}"))
    }

    async fn fetch_source(&self, base: &str, session_id: &str) -> Result<(), String> {
        let url = format!("{base}/session/{session_id}/source");
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| format!("request to {url} failed: {e}"))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(format!("{url} returned {status}"))
        }
    }

    /// Best-effort session teardown.
    async fn end_session(&self, base: &str, session_id: &str) {
        let url = format!("{base}/session/{session_id}");
        if let Err(e) = self.http.delete(&url).send().await {
            debug!("failed to delete automation session: {e}");
        }
    }

    /// Selection criteria pushed opaquely to the automation session.
    fn selection_settings(config: &SessionConfig) -> Value {
        let mut settings = Map::new();
        if let Some(keyword) = &config.keyword {
            settings.insert("grabbit:keyword".into(), json!(keyword));
        }
        if let Some(city) = &config.city {
            settings.insert("grabbit:city".into(), json!(city));
        }
        if let Some(date) = &config.date {
            settings.insert("grabbit:date".into(), json!(date));
        }
        if let Some(price) = &config.price {
            settings.insert("grabbit:price".into(), json!(price));
        }
        if let Some(price_index) = config.price_index {
            settings.insert("grabbit:priceIndex".into(), json!(price_index));
        }
        json!({ "settings": settings })
    }
}

#[async_trait]
impl PurchaseFlow for RemoteDriverFlow {
    async fn attempt(
        &self,
        config: &SessionConfig,
        cancel: &CancelToken,
    ) -> anyhow::Result<AttemptOutcome> {
        let base = config.server_url.trim_end_matches('/').to_string();

        // CONNECT: create the automation session with the configured
        // capabilities, passed through opaquely.
        let capabilities = json!({
            "capabilities": {
                "alwaysMatch": &config.device_caps,
                "firstMatch": [{}],
            }
        });
        let body = match self.post_json(format!("{base}/session"), &capabilities).await {
            Ok(body) => body,
            Err(message) => return Ok(AttemptOutcome::retry(Phase::Connect, message)),
        };
        let Some(session_id) = extract_session_id(&body).map(str::to_string) else {
            return Ok(AttemptOutcome::retry(
                Phase::Connect,
                "session response carried no sessionId",
            ));
        };
        debug!(session_id, "automation session established");

        if cancel.is_cancelled() {
            self.end_session(&base, &session_id).await;
            return Ok(AttemptOutcome::retry(Phase::Connect, "stop requested"));
        }

        // LOCATE: confirm the driver can reach the app UI at all.
        if let Err(message) = self.fetch_source(&base, &session_id).await {
            self.end_session(&base, &session_id).await;
            return Ok(AttemptOutcome::retry(Phase::Locate, message));
        }

        // CONFIGURE_SELECTION: hand the search/selection criteria to the
        // driver as session settings.
        let settings = Self::selection_settings(config);
        if let Err(message) = self
            .post_json(
                format!("{base}/session/{session_id}/appium/settings"),
                &settings,
            )
            .await
        {
            self.end_session(&base, &session_id).await;
            return Ok(AttemptOutcome::retry(Phase::ConfigureSelection, message));
        }

        if cancel.is_cancelled() {
            self.end_session(&base, &session_id).await;
            return Ok(AttemptOutcome::retry(
                Phase::ConfigureSelection,
                "stop requested",
            ));
        }

        // SUBMIT: invoke the driver-side purchase routine. The driver owns
        // every tap and element lookup; we only pass the order parameters.
        let script = json!({
            "script": "damai: runPurchase",
            "args": [{
                "users": &config.users,
                "commitOrder": config.if_commit_order,
                "waitTimeout": config.wait_timeout,
            }],
        });
        let result = self
            .post_json(
                format!("{base}/session/{session_id}/execute/sync"),
                &script,
            )
            .await;

        self.end_session(&base, &session_id).await;

        match result {
            Ok(_) => Ok(AttemptOutcome::Success),
            Err(message) => Ok(AttemptOutcome::retry(Phase::Submit, message)),
        }
    }
}

/// Session id per the W3C shape (`value.sessionId`), with a fallback for
/// legacy servers that put it at the top level.
fn extract_session_id(body: &Value) -> Option<&str> {
    body.get("value")
        .and_then(|v| v.get("sessionId"))
        .and_then(Value::as_str)
        .or_else(|| body.get("sessionId").and_then(Value::as_str))
}
