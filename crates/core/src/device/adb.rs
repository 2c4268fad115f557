use std::collections::BTreeMap;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, warn};

use super::types::{DeviceRecord, DeviceStatus};

/// How long to wait for adb before giving up on the probe.
const ADB_TIMEOUT: Duration = Duration::from_secs(5);

/// Parse the line-oriented output of `adb devices -l`.
///
/// The header line is skipped; each remaining non-blank line yields a
/// serial, a status token, and zero or more `key:value` property tokens.
/// Malformed lines are skipped, never an error. Empty input yields an
/// empty list, which is a normal outcome.
pub fn parse_adb_devices(raw: &str) -> Vec<DeviceRecord> {
    let mut records = Vec::new();

    for line in raw.lines().skip(1) {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let mut tokens = line.split_whitespace();
        let Some(serial) = tokens.next() else {
            continue;
        };
        let Some(status_token) = tokens.next() else {
            debug!(line, "skipping adb line without status token");
            continue;
        };

        let mut properties = BTreeMap::new();
        for token in tokens {
            if let Some((key, value)) = token.split_once(':') {
                if !key.is_empty() && !value.is_empty() {
                    properties.insert(key.to_string(), value.to_string());
                }
            }
        }

        records.push(DeviceRecord {
            serial: serial.to_string(),
            status: DeviceStatus::from_token(status_token),
            properties,
        });
    }

    records
}

/// Run `adb devices -l` and parse its output.
///
/// A missing executable, non-zero exit, or timeout is treated as "no
/// devices detected", not a fatal error.
pub async fn list_devices() -> Vec<DeviceRecord> {
    let output = tokio::time::timeout(
        ADB_TIMEOUT,
        Command::new("adb").args(["devices", "-l"]).output(),
    )
    .await;

    match output {
        Ok(Ok(output)) if output.status.success() => {
            parse_adb_devices(&String::from_utf8_lossy(&output.stdout))
        }
        Ok(Ok(output)) => {
            warn!(
                status = %output.status,
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "adb devices exited with an error"
            );
            Vec::new()
        }
        Ok(Err(e)) => {
            warn!("failed to run adb: {e}");
            Vec::new()
        }
        Err(_) => {
            warn!("adb devices timed out after {}s", ADB_TIMEOUT.as_secs());
            Vec::new()
        }
    }
}
