pub mod batch;
pub mod config;
pub mod device;
pub mod flow;
pub mod metrics;
pub mod orchestrator;
pub mod report;
pub mod testing;

pub use batch::{derive_session_label, BatchReport, BatchRunner, SessionOutcome};
pub use config::{
    check, load_all, parse_payloads, strip_jsonc_comments, validate, ConfigError, SessionConfig,
};
pub use device::{list_devices, parse_adb_devices, DeviceRecord, DeviceStatus};
pub use flow::{probe_server, AttemptOutcome, ProbeError, PurchaseFlow, RemoteDriverFlow};
pub use orchestrator::{
    CancelToken, FailureCode, Phase, RunLogCallback, RunLogEvent, RunLogLevel, TicketRunner,
};
pub use report::{RunMetrics, RunReport};
