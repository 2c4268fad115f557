use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Connection state reported by adb for one device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceStatus {
    /// Usable for automation (`device` in adb output).
    Ready,
    Offline,
    Unauthorized,
    Unknown,
}

impl DeviceStatus {
    pub(crate) fn from_token(token: &str) -> Self {
        match token {
            "device" => Self::Ready,
            "offline" => Self::Offline,
            "unauthorized" => Self::Unauthorized,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Offline => "offline",
            Self::Unauthorized => "unauthorized",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One discovered device, rebuilt on every poll.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub serial: String,
    pub status: DeviceStatus,
    /// `key:value` tokens from `adb devices -l`, e.g. model, device codename,
    /// transport_id.
    pub properties: BTreeMap<String, String>,
}

impl DeviceRecord {
    pub fn is_ready(&self) -> bool {
        self.status == DeviceStatus::Ready
    }

    /// Human-readable label for display and selection, never for retry logic.
    pub fn describe(&self) -> String {
        let mut parts: Vec<&str> = Vec::new();
        if let Some(model) = self.properties.get("model") {
            parts.push(model);
        }
        if let Some(codename) = self.properties.get("device") {
            if !parts.contains(&codename.as_str()) {
                parts.push(codename);
            }
        }
        if parts.is_empty() {
            self.serial.clone()
        } else {
            format!("{} ({})", self.serial, parts.join(", "))
        }
    }
}
