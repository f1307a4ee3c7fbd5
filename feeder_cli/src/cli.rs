//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "feeder", version, about = "Rotation feeder CLI")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/feeder_config.toml")]
    pub config: PathBuf,

    /// Optional rotation calibration CSV (header: duration_ms)
    #[arg(long, value_name = "FILE")]
    pub calibration: Option<PathBuf>,

    /// Print results and errors as JSON lines
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one feed to completion
    Feed {
        /// Number of rotations
        #[arg(long)]
        rotations: u32,
        /// Idempotence timestamp (epoch seconds); defaults to now
        #[arg(long = "as-of", value_name = "SECS")]
        as_of: Option<u64>,
        /// In simulation, run on the wall clock instead of virtual time
        #[arg(long, action = ArgAction::SetTrue)]
        realtime: bool,
    },
    /// Run the control loop and accept JSON trigger lines on stdin
    Serve,
    /// Show the persisted feeding history, newest first
    History,
    /// Quick hardware check (sensor readable, motor off)
    SelfCheck,
    /// Health check for operational monitoring
    Health,
}
