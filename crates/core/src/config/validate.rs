use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::types::{SessionConfig, DEFAULT_DELAY_SECS};
use super::ConfigError;

static URL_SHAPE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^https?://\S+$").unwrap());

/// Payload fields that override entries of the `device_caps` mapping.
const CAP_FIELDS: [(&str, &str); 4] = [
    ("device_name", "deviceName"),
    ("platform_version", "platformVersion"),
    ("udid", "udid"),
    ("automation_name", "automationName"),
];

/// Strict validation: collects **every** field violation before failing.
///
/// Returns the aggregated [`ConfigError::Validation`] carrying the full
/// error list, never just the first problem encountered.
pub fn validate(payload: &Map<String, Value>) -> Result<SessionConfig, ConfigError> {
    let (config, errors) = build(payload, true);
    match config {
        Some(config) => Ok(config),
        None => Err(ConfigError::validation(errors)),
    }
}

/// Lenient validation for live form input: never fails, returns the config
/// (when clean) together with the list of violations encountered.
pub fn check(payload: &Map<String, Value>) -> (Option<SessionConfig>, Vec<String>) {
    build(payload, false)
}

fn build(payload: &Map<String, Value>, strict: bool) -> (Option<SessionConfig>, Vec<String>) {
    let mut errors = Vec::new();

    let server_url = match payload.get("server_url") {
        None | Some(Value::Null) => {
            errors.push("server_url is required".to_string());
            String::new()
        }
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                errors.push("server_url must not be empty".to_string());
            } else if !URL_SHAPE.is_match(trimmed) {
                errors.push(format!("server_url must be an http(s) URL, got {trimmed:?}"));
            }
            trimmed.to_string()
        }
        Some(_) => {
            errors.push("server_url must be a string".to_string());
            String::new()
        }
    };

    let keyword = opt_string(payload, "keyword", &mut errors);
    let city = opt_string(payload, "city", &mut errors);
    let date = opt_string(payload, "date", &mut errors);
    let price = opt_string(payload, "price", &mut errors);
    let price_index = price_index_field(payload, &mut errors);
    let users = users_field(payload, &mut errors);
    let if_commit_order = bool_field(payload, "if_commit_order", true, &mut errors);
    let wait_timeout = delay_field(payload, "wait_timeout", &mut errors);
    let retry_delay = delay_field(payload, "retry_delay", &mut errors);
    let device_caps = device_caps_field(payload, strict, &mut errors);

    if errors.is_empty() {
        (
            Some(SessionConfig {
                server_url,
                keyword,
                city,
                date,
                price,
                price_index,
                users,
                if_commit_order,
                device_caps,
                wait_timeout,
                retry_delay,
            }),
            errors,
        )
    } else {
        (None, errors)
    }
}

/// Optional string field; empty strings normalize to absent.
fn opt_string(payload: &Map<String, Value>, key: &str, errors: &mut Vec<String>) -> Option<String> {
    match payload.get(key) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Some(_) => {
            errors.push(format!("{key} must be a string"));
            None
        }
    }
}

/// `price_index` accepts an integer or a numeric string.
fn price_index_field(payload: &Map<String, Value>, errors: &mut Vec<String>) -> Option<u32> {
    match payload.get("price_index") {
        None | Some(Value::Null) => None,
        Some(Value::Number(n)) => match n.as_u64().and_then(|v| u32::try_from(v).ok()) {
            Some(v) => Some(v),
            None => {
                errors.push(format!("price_index must be a non-negative integer, got {n}"));
                None
            }
        },
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                match trimmed.parse::<u32>() {
                    Ok(v) => Some(v),
                    Err(_) => {
                        errors.push(format!("price_index must be numeric, got {trimmed:?}"));
                        None
                    }
                }
            }
        }
        Some(_) => {
            errors.push("price_index must be an integer or a numeric string".to_string());
            None
        }
    }
}

fn users_field(payload: &Map<String, Value>, errors: &mut Vec<String>) -> Vec<String> {
    match payload.get("users") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => {
            let mut users = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::String(s) => {
                        let trimmed = s.trim();
                        if !trimmed.is_empty() {
                            users.push(trimmed.to_string());
                        }
                    }
                    _ => {
                        errors.push("users must be an array of strings".to_string());
                        return Vec::new();
                    }
                }
            }
            users
        }
        Some(_) => {
            errors.push("users must be an array of strings".to_string());
            Vec::new()
        }
    }
}

fn bool_field(
    payload: &Map<String, Value>,
    key: &str,
    default: bool,
    errors: &mut Vec<String>,
) -> bool {
    match payload.get(key) {
        None | Some(Value::Null) => default,
        Some(Value::Bool(b)) => *b,
        Some(_) => {
            errors.push(format!("{key} must be a boolean"));
            default
        }
    }
}

/// Positive number of seconds; numeric strings coerce.
fn delay_field(payload: &Map<String, Value>, key: &str, errors: &mut Vec<String>) -> f64 {
    let parsed = match payload.get(key) {
        None | Some(Value::Null) => return DEFAULT_DELAY_SECS,
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return DEFAULT_DELAY_SECS;
            }
            trimmed.parse::<f64>().ok()
        }
        Some(_) => None,
    };

    match parsed {
        Some(v) if v.is_finite() && v > 0.0 => v,
        _ => {
            errors.push(format!("{key} must be a positive number of seconds"));
            DEFAULT_DELAY_SECS
        }
    }
}

/// Builds the capability mapping: the `device_caps` object first, then the
/// explicit top-level fields merged over it. Empty explicit values remove
/// the capability only in strict mode.
fn device_caps_field(
    payload: &Map<String, Value>,
    strict: bool,
    errors: &mut Vec<String>,
) -> BTreeMap<String, String> {
    let mut caps = BTreeMap::new();

    match payload.get("device_caps") {
        None | Some(Value::Null) => {}
        Some(Value::Object(entries)) => {
            for (key, value) in entries {
                match value {
                    Value::String(s) => {
                        caps.insert(key.clone(), s.clone());
                    }
                    _ => errors.push(format!("device_caps.{key} must be a string")),
                }
            }
        }
        Some(_) => errors.push("device_caps must be a mapping of strings".to_string()),
    }

    for (field, cap_key) in CAP_FIELDS {
        match payload.get(field) {
            None | Some(Value::Null) => {}
            Some(Value::String(s)) => {
                let trimmed = s.trim();
                if !trimmed.is_empty() {
                    caps.insert(cap_key.to_string(), trimmed.to_string());
                } else if strict {
                    caps.remove(cap_key);
                }
            }
            Some(_) => errors.push(format!("{field} must be a string")),
        }
    }

    caps
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_minimal_payload_gets_defaults() {
        let config = validate(&payload(json!({"server_url": "http://127.0.0.1:4723"}))).unwrap();
        assert_eq!(config.server_url, "http://127.0.0.1:4723");
        assert!(config.keyword.is_none());
        assert!(config.users.is_empty());
        assert!(config.if_commit_order);
        assert_eq!(config.wait_timeout, 2.0);
        assert_eq!(config.retry_delay, 2.0);
        assert!(config.device_caps.is_empty());
    }

    #[test]
    fn test_collects_every_violation() {
        let result = validate(&payload(json!({
            "server_url": "",
            "price_index": "abc",
            "wait_timeout": -1,
            "users": "not-a-list",
        })));
        let Err(ConfigError::Validation { errors, message }) = result else {
            panic!("expected validation error");
        };
        assert_eq!(errors.len(), 4, "all violations reported: {errors:?}");
        assert!(message.contains("4 problems"));
    }

    #[test]
    fn test_url_shape_enforced() {
        let result = validate(&payload(json!({"server_url": "not a url"})));
        let Err(ConfigError::Validation { errors, .. }) = result else {
            panic!("expected validation error");
        };
        assert!(errors[0].contains("http(s) URL"));
    }

    #[test]
    fn test_numeric_strings_coerce() {
        let config = validate(&payload(json!({
            "server_url": "http://localhost:4723",
            "price_index": "3",
            "wait_timeout": "1.5",
            "retry_delay": "0.25",
        })))
        .unwrap();
        assert_eq!(config.price_index, Some(3));
        assert_eq!(config.wait_timeout, 1.5);
        assert_eq!(config.retry_delay, 0.25);
    }

    #[test]
    fn test_empty_optional_strings_normalize_to_absent() {
        let config = validate(&payload(json!({
            "server_url": "http://localhost:4723",
            "keyword": "  ",
            "city": "",
            "price_index": "",
        })))
        .unwrap();
        assert!(config.keyword.is_none());
        assert!(config.city.is_none());
        assert!(config.price_index.is_none());
    }

    #[test]
    fn test_explicit_cap_fields_merge_over_mapping() {
        let config = validate(&payload(json!({
            "server_url": "http://localhost:4723",
            "device_caps": {"deviceName": "old", "automationName": "UiAutomator2"},
            "device_name": "Pixel 6",
            "udid": "emulator-5554",
        })))
        .unwrap();
        assert_eq!(config.device_caps.get("deviceName").unwrap(), "Pixel 6");
        assert_eq!(config.device_caps.get("udid").unwrap(), "emulator-5554");
        assert_eq!(
            config.device_caps.get("automationName").unwrap(),
            "UiAutomator2"
        );
    }

    #[test]
    fn test_empty_cap_field_removed_only_in_strict_mode() {
        let base = json!({
            "server_url": "http://localhost:4723",
            "device_caps": {"udid": "emulator-5554"},
            "udid": "",
        });

        let strict = validate(&payload(base.clone())).unwrap();
        assert!(!strict.device_caps.contains_key("udid"));

        let (lenient, errors) = check(&payload(base));
        assert!(errors.is_empty());
        assert_eq!(
            lenient.unwrap().device_caps.get("udid").unwrap(),
            "emulator-5554"
        );
    }

    #[test]
    fn test_check_reports_errors_without_failing() {
        let (config, errors) = check(&payload(json!({"server_url": 42})));
        assert!(config.is_none());
        assert_eq!(errors, vec!["server_url must be a string".to_string()]);
    }

    #[test]
    fn test_users_trimmed_and_blank_entries_dropped() {
        let config = validate(&payload(json!({
            "server_url": "http://localhost:4723",
            "users": [" Alice ", "", "Bob"],
        })))
        .unwrap();
        assert_eq!(config.users, vec!["Alice".to_string(), "Bob".to_string()]);
    }
}
