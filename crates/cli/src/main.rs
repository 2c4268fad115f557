mod cli;

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use grabbit_core::{
    list_devices, load_all, probe_server, BatchRunner, CancelToken, ConfigError, FailureCode,
    RemoteDriverFlow, RunLogCallback, RunLogEvent, SessionConfig, SessionOutcome,
};

use cli::{Cli, Commands};

/// Exit status when the configuration could not be loaded or validated.
const EXIT_CONFIG_FAILURE: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Cli::parse();

    match args.command {
        Some(Commands::Devices) => run_devices().await,
        Some(Commands::Probe) => run_probe(args.config.as_deref()).await,
        None => run_batch(&args).await,
    }
}

/// Load configs or report a configuration failure (exit 2).
fn load_configs(path: Option<&Path>) -> Result<Vec<SessionConfig>, ExitCode> {
    match load_all(path) {
        Ok(configs) => Ok(configs),
        Err(ConfigError::Validation { message, errors }) => {
            eprintln!("[ERROR] {message}");
            for item in &errors {
                eprintln!("        - {item}");
            }
            Err(ExitCode::from(EXIT_CONFIG_FAILURE))
        }
        Err(e) => {
            eprintln!("[ERROR] {e}");
            Err(ExitCode::from(EXIT_CONFIG_FAILURE))
        }
    }
}

async fn run_batch(args: &Cli) -> ExitCode {
    let configs = match load_configs(args.config.as_deref()) {
        Ok(configs) => configs,
        Err(code) => return code,
    };

    let total = configs.len();
    println!("[INFO] found {total} session(s) to execute");

    let flow = match RemoteDriverFlow::new().context("failed to build the flow client") {
        Ok(flow) => flow,
        Err(e) => {
            eprintln!("[ERROR] {e:#}");
            return ExitCode::from(EXIT_CONFIG_FAILURE);
        }
    };

    let cancel = CancelToken::new();
    spawn_ctrl_c_handler(cancel.clone());

    let batch = BatchRunner::new(configs, move |_: &SessionConfig| flow.clone())
        .with_log_callback(console_log_callback())
        .with_cancel_token(cancel);

    let report = batch.run(args.retries.max(1)).await;

    for run in &report.runs {
        print_session_summary(run);
    }
    let succeeded = report.runs.iter().filter(|r| r.success).count();
    println!("[SUMMARY] all sessions finished: {succeeded} of {total} succeeded");

    if let Some(path) = &args.export_report {
        match report.write_to(path) {
            Ok(()) => println!("[SUMMARY] batch report exported to {}", path.display()),
            Err(e) => eprintln!("[ERROR] failed to export batch report: {e}"),
        }
    }

    if report.overall_success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

async fn run_devices() -> ExitCode {
    let devices = list_devices().await;
    if devices.is_empty() {
        println!("no devices detected");
        return ExitCode::SUCCESS;
    }

    for device in &devices {
        println!("{:<12} {}", device.status.as_str(), device.describe());
    }
    let ready = devices.iter().filter(|d| d.is_ready()).count();
    println!("{ready} of {} device(s) ready for automation", devices.len());
    ExitCode::SUCCESS
}

async fn run_probe(config_path: Option<&Path>) -> ExitCode {
    let configs = match load_configs(config_path) {
        Ok(configs) => configs,
        Err(code) => return code,
    };

    let mut servers: Vec<&str> = configs.iter().map(|c| c.server_url.as_str()).collect();
    servers.dedup();

    let mut all_reachable = true;
    for server in servers {
        match probe_server(server).await {
            Ok(()) => println!("[OK]    {server}"),
            Err(e) => {
                all_reachable = false;
                println!("[FAIL]  {server}: {e}");
            }
        }
    }

    if all_reachable {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn spawn_ctrl_c_handler(cancel: CancelToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("stop requested; finishing at the next safe point");
            eprintln!("[WARNING] stop requested, the run will halt at the next safe point");
            cancel.cancel();
        }
    });
}

/// Render structured run events as console lines.
fn console_log_callback() -> RunLogCallback {
    Arc::new(|event: RunLogEvent| {
        let level = event.level.as_str().to_uppercase();
        if event.context.is_empty() {
            println!("[{level}] {}", event.message);
        } else {
            let context = event
                .context
                .iter()
                .map(|(key, value)| format!("{key}={value}"))
                .collect::<Vec<_>>()
                .join(" ");
            println!("[{level}] {} | {context}", event.message);
        }
    })
}

fn print_session_summary(run: &SessionOutcome) {
    let label = &run.label;
    let Some(report) = &run.report else {
        println!("[SUMMARY][{label}] no run report available");
        return;
    };

    let metrics = &report.metrics;
    let status = if run.success { "SUCCESS" } else { "FAILED" };
    println!(
        "[SUMMARY][{label}] status={status} attempts={} retries={} duration={:.2}s final_phase={}",
        metrics.attempts,
        metrics.retries(),
        metrics.duration_secs(),
        metrics.final_phase,
    );

    if !run.success {
        let reason = metrics
            .failure_reason
            .as_deref()
            .unwrap_or("flow did not complete");
        match metrics.failure_code {
            Some(code) => println!("[SUMMARY][{label}] reason={reason} (code={code})"),
            None => println!("[SUMMARY][{label}] reason={reason}"),
        }
        if metrics.failure_code == Some(FailureCode::MaxRetries) {
            println!(
                "[SUMMARY][{label}] hint: retry budget exhausted; adjust parameters or check the network"
            );
        }
    }

    info!(session = %label, success = run.success, attempts = metrics.attempts, "session finished");
}
