//! Device discovery via `adb devices -l`.
//!
//! Discovery output is purely informational: it tells the user which
//! devices are ready for automation, and never feeds into retry logic.
//! Records are rebuilt on every poll; nothing persists across polls.

mod adb;
mod types;

pub use adb::{list_devices, parse_adb_devices};
pub use types::{DeviceRecord, DeviceStatus};
