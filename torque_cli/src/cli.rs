//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;
use torque_config::ToolKind;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "torque", version, about = "Torque calibration bench")]
pub struct Cli {
    /// Path to config TOML (missing file means built-in defaults)
    #[arg(long, value_name = "FILE", default_value = "etc/torque_config.toml")]
    pub config: PathBuf,

    /// Profile table CSV (strict header: max_rating,kind,unit,targets)
    #[arg(long = "profiles-csv", value_name = "FILE")]
    pub profiles_csv: Option<PathBuf>,

    /// Print results and errors as JSON lines; log as JSON
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "warn")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a test session against one profile
    Run {
        /// Profile index as listed by `torque profiles`
        #[arg(long)]
        profile: usize,
        /// Feed source: serial port, file to replay, or "-" for stdin (default: feed.connection)
        #[arg(long, value_name = "PATH")]
        input: Option<String>,
        /// Override feed.baud
        #[arg(long)]
        baud: Option<u32>,
        /// Append accepted samples and the summary as JSON lines
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
        /// Write the final summary as JSON (atomically)
        #[arg(long = "summary-out", value_name = "FILE")]
        summary_out: Option<PathBuf>,
        /// Stop the session after this many ms
        #[arg(long, value_name = "MS")]
        max_run_ms: Option<u64>,
        /// Stop as soon as every range has its full quota
        #[arg(long, action = ArgAction::SetTrue)]
        until_complete: bool,
        /// Use a simulated meter cycling through the profile's targets
        #[arg(long, action = ArgAction::SetTrue, conflicts_with = "input")]
        simulate: bool,
        /// Redraw the table while the session runs
        #[arg(long, action = ArgAction::SetTrue)]
        live: bool,
    },
    /// List available profiles
    Profiles,
    /// Suggest applied torques and allowances for a tool rating
    Suggest {
        #[arg(long = "max-rating", value_name = "RATING")]
        max_rating: f64,
        /// wrench | torque-multiplier
        #[arg(long, default_value = "wrench", value_parser = parse_kind)]
        kind: ToolKind,
    },
    /// Validate config and profiles
    SelfCheck,
}

fn parse_kind(s: &str) -> Result<ToolKind, String> {
    s.parse::<ToolKind>().map_err(|e| e.to_string())
}
