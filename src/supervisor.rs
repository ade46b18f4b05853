//! The supervisor loop: read a line, spawn a worker, wait, react.
//!
//! Exactly one worker is in flight at a time and the supervisor is blocked
//! while it runs. Because the worker's write completes before it exits, and
//! the artifact is read only after `waitpid` reports success, the artifact
//! needs no locking.

use crate::artifact::ArtifactStore;
use crate::error::{CoderError, Result};
use crate::line::{self, DEFAULT_MAX_LINE_BYTES};
use crate::transform::Transform;
use crate::worker::{
    Outcome, SpawnMode, WorkRequest, WorkerProc, WorkerReport, spawn_exec, spawn_forked,
};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

/// Printed after each artifact copied to the output.
pub const SEPARATOR: &str = "----------------------------------------";

/// Printed when a worker rejects an empty or blank line.
pub const REJECTION_MESSAGE: &str = "Error: sentence missing or only spaces.";

/// Printed before each read when prompting is enabled.
pub const PROMPT: &str = "This program codes a sentence. Type a sentence and press Enter:";

/// Supervisor configuration.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Transform the worker applies.
    pub transform: Transform,
    /// How workers are created.
    pub spawn_mode: SpawnMode,
    /// Worker program for exec mode (default: the current executable).
    pub worker_program: Option<PathBuf>,
    /// Global arguments passed to exec-mode workers before the subcommand.
    pub worker_args: Vec<String>,
    /// Kill a worker that runs longer than this (default: wait forever).
    pub worker_timeout: Option<Duration>,
    /// Upper bound on one input line, in bytes.
    pub max_line_bytes: usize,
    /// Write [`PROMPT`] before each read.
    pub prompt: bool,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            transform: Transform::default(),
            spawn_mode: SpawnMode::default(),
            worker_program: None,
            worker_args: Vec::new(),
            worker_timeout: None,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
            prompt: false,
        }
    }
}

/// Counters accumulated across iterations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Lines read from the input.
    pub lines: u64,
    /// Lines that produced an artifact.
    pub transformed: u64,
    /// Lines rejected as empty or blank.
    pub rejected: u64,
}

/// Result of one loop iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// More input may follow.
    Continue(SessionStats),
    /// The input is exhausted.
    Finished(SessionStats),
}

/// Drives the read → spawn → wait → react loop.
pub struct Supervisor<S: ArtifactStore> {
    config: SupervisorConfig,
    store: S,
}

impl<S: ArtifactStore> Supervisor<S> {
    pub fn new(config: SupervisorConfig, store: S) -> Self {
        Self { config, store }
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Process lines until the input is exhausted.
    ///
    /// Returns the session counters on a clean end of input. Any error is
    /// fatal; blank-line rejections are reported on `output` and skipped.
    pub fn run<R: BufRead, W: Write>(&self, input: &mut R, output: &mut W) -> Result<SessionStats> {
        let mut stats = SessionStats::default();
        loop {
            match self.step(stats, input, output)? {
                Step::Continue(next) => stats = next,
                Step::Finished(done) => {
                    info!(
                        lines = done.lines,
                        transformed = done.transformed,
                        rejected = done.rejected,
                        "End of input"
                    );
                    return Ok(done);
                }
            }
        }
    }

    /// Run a single iteration and return the updated counters.
    pub fn step<R: BufRead, W: Write>(
        &self,
        mut stats: SessionStats,
        input: &mut R,
        output: &mut W,
    ) -> Result<Step> {
        if self.config.prompt {
            writeln!(output, "{}", PROMPT).map_err(CoderError::Output)?;
        }
        // Nothing buffered may be duplicated into a forked worker
        output.flush().map_err(CoderError::Output)?;

        let Some(line) =
            line::read_line(input, self.config.max_line_bytes).map_err(CoderError::Read)?
        else {
            return Ok(Step::Finished(stats));
        };
        stats.lines += 1;

        let report = self.dispatch(&line)?;
        match report.outcome {
            Outcome::Success => {
                self.emit_artifact(output)?;
                stats.transformed += 1;
            }
            Outcome::RejectedEmptyOrBlank => {
                writeln!(output, "{}", REJECTION_MESSAGE).map_err(CoderError::Output)?;
                stats.rejected += 1;
            }
            Outcome::FatalError => {
                let detail = if report.is_abnormal() {
                    report.termination.to_string()
                } else {
                    format!(
                        "worker reported a fatal I/O error for artifact {}",
                        self.store.describe()
                    )
                };
                return Err(CoderError::WorkerFatal(detail));
            }
        }

        output.flush().map_err(CoderError::Output)?;
        Ok(Step::Continue(stats))
    }

    /// Spawn a worker for `line`, block until it terminates and decode how.
    #[instrument(level = "debug", skip_all, fields(mode = %self.config.spawn_mode))]
    pub fn dispatch(&self, line: &str) -> Result<WorkerReport> {
        let mut proc = self.spawn(line)?;
        debug!(pid = %proc.pid(), "Created worker, waiting for it to finish");

        let termination = match self.config.worker_timeout {
            Some(timeout) => proc.wait_timeout(timeout)?,
            None => proc.wait()?,
        };

        let report = WorkerReport::from_termination(termination);
        if report.is_abnormal() {
            error!(pid = %proc.pid(), %report, "Worker terminated abnormally");
        } else if report.outcome.is_fatal() {
            warn!(pid = %proc.pid(), "Worker reported a fatal error");
        } else {
            debug!(pid = %proc.pid(), outcome = %report.outcome, "Worker finished");
        }
        Ok(report)
    }

    fn spawn(&self, line: &str) -> Result<WorkerProc> {
        // A worker runs in another address space, so only a file is shared
        let artifact = self.store.path().ok_or_else(|| {
            CoderError::Spawn(format!(
                "{} workers need a file-backed artifact, not {}",
                self.config.spawn_mode,
                self.store.describe()
            ))
        })?;

        match self.config.spawn_mode {
            SpawnMode::Fork => spawn_forked(line, self.config.transform, &self.store),
            SpawnMode::Exec => {
                let program = match &self.config.worker_program {
                    Some(program) => program.clone(),
                    None => std::env::current_exe().map_err(|e| {
                        CoderError::Spawn(format!("Failed to get current executable: {}", e))
                    })?,
                };
                let request =
                    WorkRequest::new(line, artifact.to_string_lossy(), self.config.transform);
                spawn_exec(&program, &self.config.worker_args, &request)
            }
        }
    }

    /// Copy the artifact to `output`, followed by the separator.
    fn emit_artifact<W: Write>(&self, output: &mut W) -> Result<()> {
        let bytes = self
            .store
            .read_artifact()
            .map_err(|source| CoderError::ArtifactRead {
                path: self.store.describe(),
                source,
            })?;
        output.write_all(&bytes).map_err(CoderError::Output)?;
        writeln!(output, "{}", SEPARATOR).map_err(CoderError::Output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{FileArtifactStore, MemoryArtifactStore};
    use std::io::{self, Cursor};
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::{TempDir, tempdir};

    fn fork_config() -> SupervisorConfig {
        SupervisorConfig {
            spawn_mode: SpawnMode::Fork,
            ..SupervisorConfig::default()
        }
    }

    fn file_supervisor(tmp: &TempDir) -> Supervisor<FileArtifactStore> {
        Supervisor::new(
            fork_config(),
            FileArtifactStore::new(tmp.path().join("code.txt")),
        )
    }

    fn run(supervisor: &Supervisor<impl ArtifactStore>, input: &str) -> (Result<SessionStats>, String) {
        let mut output = Vec::new();
        let result = supervisor.run(&mut Cursor::new(input.to_string()), &mut output);
        (result, String::from_utf8(output).unwrap())
    }

    /// File store that counts supervisor-side reads.
    struct CountingStore {
        inner: FileArtifactStore,
        reads: AtomicUsize,
    }

    impl ArtifactStore for CountingStore {
        fn write_artifact(&self, bytes: &[u8]) -> io::Result<()> {
            self.inner.write_artifact(bytes)
        }

        fn read_artifact(&self) -> io::Result<Vec<u8>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.inner.read_artifact()
        }

        fn path(&self) -> Option<&Path> {
            self.inner.path()
        }
    }

    #[test]
    fn test_hello_is_echoed_reversed() {
        let tmp = tempdir().unwrap();
        let supervisor = file_supervisor(&tmp);

        let (result, output) = run(&supervisor, "hello\n");
        let stats = result.unwrap();

        assert_eq!(output, format!("olleh\n{}\n", SEPARATOR));
        assert_eq!(supervisor.store().read_artifact().unwrap(), b"olleh\n");
        assert_eq!(
            stats,
            SessionStats {
                lines: 1,
                transformed: 1,
                rejected: 0
            }
        );
    }

    #[test]
    fn test_blank_line_is_rejected_and_loop_continues() {
        let tmp = tempdir().unwrap();
        let supervisor = file_supervisor(&tmp);
        supervisor.store().write_artifact(b"stale\n").unwrap();

        let (result, output) = run(&supervisor, "   \n");
        let stats = result.unwrap();

        assert_eq!(output, format!("{}\n", REJECTION_MESSAGE));
        assert_eq!(supervisor.store().read_artifact().unwrap(), b"stale\n");
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.transformed, 0);
    }

    #[test]
    fn test_end_of_input_spawns_nothing() {
        let tmp = tempdir().unwrap();
        let supervisor = file_supervisor(&tmp);

        let (result, output) = run(&supervisor, "");
        assert_eq!(result.unwrap(), SessionStats::default());
        assert!(output.is_empty());
        assert!(!tmp.path().join("code.txt").exists());
    }

    #[test]
    fn test_unwritable_artifact_aborts() {
        let tmp = tempdir().unwrap();
        let supervisor = Supervisor::new(
            fork_config(),
            FileArtifactStore::new(tmp.path().join("missing").join("code.txt")),
        );

        let (result, output) = run(&supervisor, "hello\nworld\n");
        let err = result.unwrap_err();
        assert!(matches!(err, CoderError::WorkerFatal(_)));
        assert!(err.to_string().contains("fatal I/O error for artifact"));
        // Nothing was echoed
        assert!(output.is_empty());
    }

    #[test]
    fn test_sequence_has_no_residue() {
        let tmp = tempdir().unwrap();
        let supervisor = file_supervisor(&tmp);
        let mut output = Vec::new();
        let mut input = Cursor::new("a\nbcd\n");

        let stats = match supervisor
            .step(SessionStats::default(), &mut input, &mut output)
            .unwrap()
        {
            Step::Continue(stats) => stats,
            Step::Finished(_) => panic!("Expected more input"),
        };
        assert_eq!(supervisor.store().read_artifact().unwrap(), b"a\n");

        let stats = match supervisor.step(stats, &mut input, &mut output).unwrap() {
            Step::Continue(stats) => stats,
            Step::Finished(_) => panic!("Expected more input"),
        };
        assert_eq!(supervisor.store().read_artifact().unwrap(), b"dcb\n");

        assert_eq!(
            supervisor.step(stats, &mut input, &mut output).unwrap(),
            Step::Finished(SessionStats {
                lines: 2,
                transformed: 2,
                rejected: 0
            })
        );
        assert_eq!(
            String::from_utf8(output).unwrap(),
            format!("a\n{sep}\ndcb\n{sep}\n", sep = SEPARATOR)
        );
    }

    #[test]
    fn test_artifact_read_only_after_success() {
        let tmp = tempdir().unwrap();
        let supervisor = Supervisor::new(
            fork_config(),
            CountingStore {
                inner: FileArtifactStore::new(tmp.path().join("code.txt")),
                reads: AtomicUsize::new(0),
            },
        );

        let (result, _) = run(&supervisor, "   \nhello\n\t\n\n");
        let stats = result.unwrap();

        assert_eq!(stats.lines, 4);
        assert_eq!(stats.rejected, 3);
        assert_eq!(supervisor.store().reads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_prompt_precedes_each_read() {
        let tmp = tempdir().unwrap();
        let supervisor = Supervisor::new(
            SupervisorConfig {
                prompt: true,
                ..fork_config()
            },
            FileArtifactStore::new(tmp.path().join("code.txt")),
        );

        let (result, output) = run(&supervisor, "ab\n");
        result.unwrap();
        assert_eq!(
            output,
            format!("{p}\nba\n{s}\n{p}\n", p = PROMPT, s = SEPARATOR)
        );
    }

    #[test]
    fn test_transform_is_configurable() {
        let tmp = tempdir().unwrap();
        let supervisor = Supervisor::new(
            SupervisorConfig {
                transform: Transform::Rot13,
                ..fork_config()
            },
            FileArtifactStore::new(tmp.path().join("code.txt")),
        );

        let (result, output) = run(&supervisor, "Hello\n");
        result.unwrap();
        assert!(output.starts_with("Uryyb\n"));
    }

    #[test]
    fn test_exec_mode_requires_file_store() {
        let supervisor = Supervisor::new(
            SupervisorConfig {
                spawn_mode: SpawnMode::Exec,
                ..SupervisorConfig::default()
            },
            MemoryArtifactStore::new(),
        );

        let err = supervisor.dispatch("hello\n").unwrap_err();
        assert!(matches!(err, CoderError::Spawn(_)));
    }

    #[test]
    fn test_fork_mode_requires_file_store() {
        // A forked child would write into its own copy of the buffer
        let supervisor = Supervisor::new(fork_config(), MemoryArtifactStore::with_contents("stale\n"));

        let (result, output) = run(&supervisor, "hello\n");
        let err = result.unwrap_err();
        assert!(matches!(err, CoderError::Spawn(_)));
        assert!(err.to_string().contains("file-backed artifact"));
        assert!(output.is_empty());
        assert_eq!(supervisor.store().write_count(), 0);
    }

    /// Reader whose every read fails.
    struct FailingReader;

    impl io::Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::other("boom"))
        }
    }

    impl BufRead for FailingReader {
        fn fill_buf(&mut self) -> io::Result<&[u8]> {
            Err(io::Error::other("boom"))
        }

        fn consume(&mut self, _amt: usize) {}
    }

    #[test]
    fn test_read_fault_is_fatal() {
        let tmp = tempdir().unwrap();
        let supervisor = file_supervisor(&tmp);
        let mut output = Vec::new();

        let err = supervisor.run(&mut FailingReader, &mut output).unwrap_err();
        assert!(matches!(err, CoderError::Read(_)));
        assert!(err.to_string().contains("boom"));
        assert!(output.is_empty());
        assert!(!tmp.path().join("code.txt").exists());
    }

    #[test]
    fn test_exec_worker_fatal_exit_names_artifact() {
        // Exit code 1 without writing, as a worker does for a bad request
        let tmp = tempdir().unwrap();
        let artifact = tmp.path().join("code.txt");
        let supervisor = Supervisor::new(
            SupervisorConfig {
                spawn_mode: SpawnMode::Exec,
                worker_program: Some(PathBuf::from("sh")),
                worker_args: vec!["-c".to_string(), "exit 1".to_string()],
                ..SupervisorConfig::default()
            },
            FileArtifactStore::new(&artifact),
        );

        let (result, output) = run(&supervisor, "hello\n");
        let err = result.unwrap_err();
        assert!(matches!(err, CoderError::WorkerFatal(_)));
        assert_eq!(
            err.to_string(),
            format!(
                "Worker failed: worker reported a fatal I/O error for artifact {}",
                artifact.display()
            )
        );
        assert!(output.is_empty());
    }

    #[test]
    fn test_exec_worker_crash_is_fatal() {
        // A worker program that dies by signal instead of reporting
        let tmp = tempdir().unwrap();
        let supervisor = Supervisor::new(
            SupervisorConfig {
                spawn_mode: SpawnMode::Exec,
                worker_program: Some(PathBuf::from("sh")),
                worker_args: vec!["-c".to_string(), "kill -ABRT $$".to_string()],
                ..SupervisorConfig::default()
            },
            FileArtifactStore::new(tmp.path().join("code.txt")),
        );

        let (result, output) = run(&supervisor, "hello\n");
        let err = result.unwrap_err();
        assert!(err.to_string().contains("SIGABRT"));
        assert!(output.is_empty());
    }

    #[test]
    fn test_exec_worker_timeout_is_fatal() {
        let tmp = tempdir().unwrap();
        let supervisor = Supervisor::new(
            SupervisorConfig {
                spawn_mode: SpawnMode::Exec,
                worker_program: Some(PathBuf::from("sh")),
                worker_args: vec!["-c".to_string(), "exec sleep 60".to_string()],
                worker_timeout: Some(Duration::from_millis(100)),
                ..SupervisorConfig::default()
            },
            FileArtifactStore::new(tmp.path().join("code.txt")),
        );

        let report = supervisor.dispatch("hello\n").unwrap();
        assert_eq!(report.outcome, Outcome::FatalError);
        assert!(report.is_abnormal());
    }

    #[test]
    fn test_exec_unknown_exit_code_is_fatal() {
        let tmp = tempdir().unwrap();
        let supervisor = Supervisor::new(
            SupervisorConfig {
                spawn_mode: SpawnMode::Exec,
                worker_program: Some(PathBuf::from("sh")),
                worker_args: vec!["-c".to_string(), "exit 7".to_string()],
                ..SupervisorConfig::default()
            },
            FileArtifactStore::new(tmp.path().join("code.txt")),
        );

        let report = supervisor.dispatch("hello\n").unwrap();
        assert_eq!(report.outcome, Outcome::FatalError);
        assert!(report.to_string().contains("exited with code 7"));
    }
}
