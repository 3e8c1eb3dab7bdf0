//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "rexarm", version, about = "Rexarm control station")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/rexarm_config.toml")]
    pub config: PathBuf,

    /// Log and print results as JSON lines instead of text
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
    /// Run a session on simulated hardware until the duration ends or Ctrl-C
    Run {
        /// Stop after this many seconds (runs until Ctrl-C when omitted)
        #[arg(long = "duration-s", value_name = "SECS")]
        duration_s: Option<f64>,
        /// State requested once the loops are running (idle|manual|estop|teach|calibrate)
        #[arg(long, value_name = "NAME")]
        state: Option<String>,
        /// Park the pointer at a window position, e.g. `--cursor 560,280`
        #[arg(long, value_name = "X,Y", value_delimiter = ',', allow_negative_numbers = true)]
        cursor: Option<Vec<i32>>,
        /// Enter teach, then append the final joint positions to the record file
        #[arg(long, action = ArgAction::SetTrue)]
        record: bool,
        /// Readout print interval in ms
        #[arg(long = "print-ms", value_name = "MS", default_value_t = 500)]
        print_ms: u64,
    },
    /// Resolve one window position against a uniform depth frame
    Resolve {
        #[arg(long, allow_negative_numbers = true)]
        x: i32,
        #[arg(long, allow_negative_numbers = true)]
        y: i32,
        /// Raw 11-bit depth sample used for every pixel
        #[arg(long)]
        raw: u16,
    },
    /// Forward kinematics for joint angles in degrees
    Pose {
        /// One angle per arm joint, comma separated
        #[arg(long, value_delimiter = ',', required = true, allow_negative_numbers = true)]
        deg: Vec<f64>,
    },
    /// Initialize the simulated arm and poll feedback once
    SelfCheck,
}
