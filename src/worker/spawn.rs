//! Worker subprocess spawning.
//!
//! Two strategies: `fork(2)` hands the child a private copy of the line
//! directly; exec re-runs a worker program via `posix_spawn` (through
//! `std::process::Command`) and sends the line as a [`WorkRequest`] on stdin.
//! Exec avoids fork() issues on macOS.

use super::proc::WorkerProc;
use super::protocol::WorkRequest;
use super::worker_main;
use crate::artifact::ArtifactStore;
use crate::error::{CoderError, Result};
use crate::transform::Transform;
use clap::ValueEnum;
use nix::unistd::{ForkResult, fork};
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

/// Name of the hidden subcommand an exec-mode worker is started with.
pub const WORKER_SUBCOMMAND: &str = "worker";

/// How a worker process is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SpawnMode {
    /// fork(2) the supervisor; the child works on its own copy of the line.
    Fork,
    /// Start the worker program and pass the line over a pipe.
    Exec,
}

impl Default for SpawnMode {
    fn default() -> Self {
        if cfg!(target_os = "linux") {
            Self::Fork
        } else {
            Self::Exec
        }
    }
}

impl std::fmt::Display for SpawnMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fork => write!(f, "fork"),
            Self::Exec => write!(f, "exec"),
        }
    }
}

/// Fork a worker that processes `line` and exits.
///
/// Only the parent returns from this function.
pub fn spawn_forked<S: ArtifactStore + ?Sized>(
    line: &str,
    transform: Transform,
    store: &S,
) -> Result<WorkerProc> {
    // Safety: the child only runs the worker sequence (allocation, file I/O,
    // logging) and leaves through `_exit`/`abort`, never returning here.
    match unsafe { fork() } {
        Ok(ForkResult::Parent { child }) => Ok(WorkerProc::new(child)),
        Ok(ForkResult::Child) => worker_main::run_worker(line, transform, store),
        Err(e) => Err(CoderError::Spawn(format!("fork failed: {}", e))),
    }
}

/// Start `program` in worker mode and hand it `request`.
///
/// # Arguments
/// * `program` - Executable that understands the `worker` subcommand
/// * `args` - Extra global arguments placed before the subcommand
/// * `request` - Line, artifact path and transform for this run
pub fn spawn_exec(program: &Path, args: &[String], request: &WorkRequest) -> Result<WorkerProc> {
    let payload = request.to_line()?;

    let mut cmd = Command::new(program);
    cmd.args(args);
    cmd.arg(WORKER_SUBCOMMAND);

    cmd.stdin(Stdio::piped());
    cmd.stdout(Stdio::null());
    cmd.stderr(Stdio::inherit()); // Worker logs go to the supervisor's stderr

    let mut child = cmd
        .spawn()
        .map_err(|e| CoderError::Spawn(format!("{}: {}", program.display(), e)))?;
    let proc = WorkerProc::from_child(&child);

    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| CoderError::Spawn("Child stdin not captured".into()))?;
    match stdin.write_all(payload.as_bytes()) {
        Ok(()) => {}
        // The worker exited before reading; its exit status tells the rest
        Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
            tracing::debug!(pid = %proc.pid(), "Worker closed stdin before reading the request");
        }
        Err(e) => {
            return Err(CoderError::Spawn(format!(
                "Failed to send request to worker: {}",
                e
            )));
        }
    }
    // Closing stdin marks the end of the request
    drop(stdin);

    Ok(proc)
}
