use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "grabbit")]
#[command(about = "Automated ticket purchase runs against an automation server")]
#[command(version)]
pub struct Cli {
    /// Session config file (defaults to config.jsonc, then config.json)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Attempts per session, including the first try
    #[arg(short, long, default_value_t = 3)]
    pub retries: u32,

    /// Write the consolidated batch report to this file
    #[arg(long, value_name = "FILE")]
    pub export_report: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List connected devices and their readiness
    Devices,
    /// Check that each configured automation server responds
    Probe,
}
