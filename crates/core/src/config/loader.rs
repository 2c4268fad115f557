use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

use super::types::SessionConfig;
use super::ConfigError;

/// Filenames tried, in order, when no config path is given.
const DEFAULT_CANDIDATES: [&str; 2] = ["config.jsonc", "config.json"];

/// Remove `//` and `/* */` comments outside string literals.
///
/// Newlines inside removed comments are preserved so parse errors still
/// point at the right line.
pub fn strip_jsonc_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    let mut in_string = false;

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            if c == '\\' {
                if let Some(escaped) = chars.next() {
                    out.push(escaped);
                }
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            '/' => match chars.peek() {
                Some('/') => {
                    for skipped in chars.by_ref() {
                        if skipped == '\n' {
                            out.push('\n');
                            break;
                        }
                    }
                }
                Some('*') => {
                    chars.next();
                    let mut prev = '\0';
                    for skipped in chars.by_ref() {
                        if prev == '*' && skipped == '/' {
                            break;
                        }
                        if skipped == '\n' {
                            out.push('\n');
                        }
                        prev = skipped;
                    }
                }
                _ => out.push(c),
            },
            _ => out.push(c),
        }
    }

    out
}

/// Parse a session file into raw payloads.
///
/// Accepts a single object or an array of objects, so one file can describe
/// a whole multi-session batch. Comments are stripped first.
pub fn parse_payloads(text: &str) -> Result<Vec<Map<String, Value>>, ConfigError> {
    let stripped = strip_jsonc_comments(text);
    let value: Value =
        serde_json::from_str(&stripped).map_err(|e| ConfigError::Parse(e.to_string()))?;

    match value {
        Value::Object(map) => Ok(vec![map]),
        Value::Array(items) => {
            let mut payloads = Vec::with_capacity(items.len());
            for (idx, item) in items.into_iter().enumerate() {
                match item {
                    Value::Object(map) => payloads.push(map),
                    _ => {
                        return Err(ConfigError::Parse(format!(
                            "entry {} is not an object",
                            idx + 1
                        )))
                    }
                }
            }
            Ok(payloads)
        }
        _ => Err(ConfigError::Parse(
            "expected an object or an array of objects".to_string(),
        )),
    }
}

/// Load and strictly validate every session in the file.
///
/// With no path, the default candidates are tried in the current directory.
/// Any invalid entry fails the whole load with per-session-indexed errors;
/// there is no partial success.
pub fn load_all(path: Option<&Path>) -> Result<Vec<SessionConfig>, ConfigError> {
    let resolved: PathBuf = match path {
        Some(p) => {
            if !p.exists() {
                return Err(ConfigError::FileNotFound(p.display().to_string()));
            }
            p.to_path_buf()
        }
        None => DEFAULT_CANDIDATES
            .iter()
            .map(PathBuf::from)
            .find(|p| p.exists())
            .ok_or_else(|| ConfigError::FileNotFound(DEFAULT_CANDIDATES.join(" or ")))?,
    };

    let text = fs::read_to_string(&resolved)
        .map_err(|e| ConfigError::Parse(format!("{}: {e}", resolved.display())))?;
    let payloads = parse_payloads(&text)?;

    if payloads.is_empty() {
        return Err(ConfigError::validation(vec![
            "configuration defines no sessions".to_string(),
        ]));
    }

    let multi = payloads.len() > 1;
    let mut configs = Vec::with_capacity(payloads.len());
    let mut errors = Vec::new();

    for (idx, payload) in payloads.iter().enumerate() {
        match super::validate(payload) {
            Ok(config) => configs.push(config),
            Err(ConfigError::Validation {
                errors: item_errors,
                ..
            }) => {
                if multi {
                    errors.extend(
                        item_errors
                            .into_iter()
                            .map(|e| format!("session {}: {e}", idx + 1)),
                    );
                } else {
                    errors.extend(item_errors);
                }
            }
            Err(other) => return Err(other),
        }
    }

    if errors.is_empty() {
        Ok(configs)
    } else {
        Err(ConfigError::validation(errors))
    }
}
