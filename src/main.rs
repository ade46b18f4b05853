//! linecoder - Line Coder

use std::io::{self, IsTerminal};
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use owo_colors::{OwoColorize, Stream::Stderr};

use linecoder::artifact::FileArtifactStore;
use linecoder::cli::{Cli, Commands};
use linecoder::error::FATAL_EXIT_CODE;
use linecoder::logging::{self, LogConfig};
use linecoder::paths;
use linecoder::supervisor::{Supervisor, SupervisorConfig};
use linecoder::worker;

/// Program entry point: parses CLI arguments, sets up logging, then either
/// runs as a worker or drives the supervisor loop.
///
/// On error prints a colored error header followed by each cause in the error
/// chain and exits with the fatal exit code.
fn main() {
    let cli = Cli::parse();

    if cli.no_color {
        owo_colors::set_override(false);
    }

    logging::init(
        LogConfig::from_verbosity(cli.verbose, cli.quiet)
            .with_format(cli.log_format)
            .with_ansi(!cli.no_color)
            .with_env_overrides(),
    );

    if let Some(Commands::Worker) = cli.command {
        // Never returns
        worker::run_worker_main();
    }

    if let Err(e) = cmd_supervise(&cli) {
        eprintln!(
            "{}: {}",
            "error"
                .if_supports_color(Stderr, |text| text.red())
                .if_supports_color(Stderr, |text| text.bold()),
            e
        );
        for cause in e.chain().skip(1) {
            eprintln!(
                "  {}: {}",
                "caused by".if_supports_color(Stderr, |text| text.yellow()),
                cause
            );
        }
        std::process::exit(FATAL_EXIT_CODE);
    }
}

/// Read stdin line by line and code each line through a worker.
///
/// Returns normally at end of input; any fatal condition is returned as an
/// error.
fn cmd_supervise(cli: &Cli) -> Result<()> {
    let artifact = paths::expand_tilde(&cli.artifact);

    let config = SupervisorConfig {
        transform: cli.transform,
        spawn_mode: cli.spawn_mode,
        worker_program: None,
        worker_args: cli.worker_args(),
        worker_timeout: cli.worker_timeout.map(Duration::from_secs_f64),
        max_line_bytes: cli.max_line_bytes,
        prompt: !cli.no_prompt && io::stdin().is_terminal(),
    };

    let supervisor = Supervisor::new(config, FileArtifactStore::new(&artifact));
    let config = supervisor.config();
    tracing::info!(
        artifact = %artifact.display(),
        transform = %config.transform,
        spawn_mode = %config.spawn_mode,
        timeout = ?config.worker_timeout,
        "Starting supervisor"
    );

    let mut input = io::stdin().lock();
    let mut output = io::stdout().lock();
    supervisor.run(&mut input, &mut output)?;
    Ok(())
}
