use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// Default wait timeout and retry delay, in seconds.
pub(crate) const DEFAULT_DELAY_SECS: f64 = 2.0;

/// One session's run parameters, immutable once built.
///
/// A `SessionConfig` is produced by [`super::validate`] (or leniently by
/// [`super::check`]) and reused unchanged across every attempt of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionConfig {
    /// Endpoint of the external automation server, e.g. `http://127.0.0.1:4723`.
    pub server_url: String,
    /// Search keyword for the target event.
    pub keyword: Option<String>,
    /// City filter, as shown in the app.
    pub city: Option<String>,
    /// Date filter, as shown in the app.
    pub date: Option<String>,
    /// Price tier text, as shown in the app.
    pub price: Option<String>,
    /// Zero-based index into the price list, as an alternative to `price`.
    pub price_index: Option<u32>,
    /// Attendee names to select. Empty means "select all available".
    pub users: Vec<String>,
    /// Whether the flow is allowed to finalize the purchase.
    pub if_commit_order: bool,
    /// Capabilities passed opaquely to the automation session.
    /// Recognized keys: `deviceName`, `platformVersion`, `udid`, `automationName`.
    pub device_caps: BTreeMap<String, String>,
    /// Per-step wait timeout in seconds.
    pub wait_timeout: f64,
    /// Delay between attempts in seconds.
    pub retry_delay: f64,
}

impl SessionConfig {
    /// Serialize back into the payload shape accepted by [`super::validate`].
    ///
    /// Round-trip property: `validate(&config.to_payload())` yields an
    /// equivalent config for any valid input.
    pub fn to_payload(&self) -> Map<String, Value> {
        let mut payload = Map::new();
        payload.insert("server_url".into(), json!(&self.server_url));
        payload.insert("keyword".into(), json!(&self.keyword));
        payload.insert("city".into(), json!(&self.city));
        payload.insert("date".into(), json!(&self.date));
        payload.insert("price".into(), json!(&self.price));
        payload.insert("price_index".into(), json!(self.price_index));
        payload.insert("users".into(), json!(&self.users));
        payload.insert("if_commit_order".into(), json!(self.if_commit_order));
        payload.insert("device_caps".into(), json!(&self.device_caps));
        payload.insert("wait_timeout".into(), json!(self.wait_timeout));
        payload.insert("retry_delay".into(), json!(self.retry_delay));
        payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::validate;

    fn sample() -> SessionConfig {
        SessionConfig {
            server_url: "http://127.0.0.1:4723".to_string(),
            keyword: Some("concert".to_string()),
            city: Some("Shanghai".to_string()),
            date: None,
            price: None,
            price_index: Some(2),
            users: vec!["Alice".to_string(), "Bob".to_string()],
            if_commit_order: false,
            device_caps: BTreeMap::from([
                ("deviceName".to_string(), "Pixel 6".to_string()),
                ("udid".to_string(), "emulator-5554".to_string()),
            ]),
            wait_timeout: 1.5,
            retry_delay: 0.5,
        }
    }

    #[test]
    fn test_payload_round_trip() {
        let config = sample();
        let payload = config.to_payload();
        let reparsed = validate(&payload).unwrap();
        assert_eq!(reparsed, config);
    }

    #[test]
    fn test_serializes_with_snake_case_keys() {
        let value = serde_json::to_value(sample()).unwrap();
        assert_eq!(value["server_url"], "http://127.0.0.1:4723");
        assert_eq!(value["if_commit_order"], false);
        assert_eq!(value["device_caps"]["deviceName"], "Pixel 6");
    }
}
