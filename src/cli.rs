//! Command-line interface definitions using clap.

use crate::logging::LogFormat;
use crate::paths;
use crate::transform::Transform;
use crate::worker::SpawnMode;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Codes each input line in a separate worker process.
#[derive(Parser, Debug)]
#[command(name = "linecoder")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path of the shared artifact file.
    #[arg(long, env = "LINECODER_ARTIFACT", default_value_os_t = paths::default_artifact_path())]
    pub artifact: PathBuf,

    /// Transform applied to each line.
    #[arg(short, long, env = "LINECODER_TRANSFORM", value_enum, default_value_t = Transform::Reverse)]
    pub transform: Transform,

    /// How worker processes are created.
    #[arg(long, env = "LINECODER_SPAWN_MODE", value_enum, default_value_t = SpawnMode::default())]
    pub spawn_mode: SpawnMode,

    /// Kill a worker that runs longer than this many seconds.
    #[arg(long, env = "LINECODER_WORKER_TIMEOUT", value_parser = parse_timeout)]
    pub worker_timeout: Option<f64>,

    /// Maximum bytes per input line; longer lines are truncated.
    #[arg(long, default_value_t = crate::line::DEFAULT_MAX_LINE_BYTES, value_parser = parse_max_line_bytes)]
    pub max_line_bytes: usize,

    /// Never print the input prompt.
    #[arg(long)]
    pub no_prompt: bool,

    /// Enable verbose logging (-v for info, -vv for debug).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Log errors only.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format.
    #[arg(long, global = true, env = "LINECODER_LOG_FORMAT", value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,

    /// Disable colored output.
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run as a worker: read one request from stdin and exit with its outcome.
    #[command(hide = true)]
    Worker,
}

impl Cli {
    /// Global flags an exec-mode worker should inherit.
    pub fn worker_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if self.verbose > 0 {
            args.push(format!("-{}", "v".repeat(self.verbose as usize)));
        }
        if self.quiet {
            args.push("--quiet".to_string());
        }
        args.push("--log-format".to_string());
        args.push(self.log_format.to_string());
        if self.no_color {
            args.push("--no-color".to_string());
        }
        args
    }
}

/// Parse a positive number of seconds.
fn parse_timeout(s: &str) -> Result<f64, String> {
    let secs: f64 = s
        .parse()
        .map_err(|_| format!("'{}' is not a number of seconds", s))?;
    if secs.is_finite() && secs > 0.0 {
        Ok(secs)
    } else {
        Err("timeout must be a positive number of seconds".to_string())
    }
}

/// Parse a line cap of at least one byte.
fn parse_max_line_bytes(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("line limit must be at least 1 byte".to_string()),
        Ok(n) => Ok(n),
        Err(_) => Err(format!("'{}' is not a byte count", s)),
    }
}
