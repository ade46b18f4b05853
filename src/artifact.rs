//! Storage for the transformed artifact shared between worker and supervisor.
//!
//! The worker is the only writer and the supervisor the only reader. A write
//! always truncates first so a shorter line never leaves bytes from a longer
//! predecessor behind.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// File mode for the artifact (owner read/write, others read).
pub const ARTIFACT_MODE: u32 = 0o644;

/// Where the worker leaves its result and the supervisor picks it up.
pub trait ArtifactStore {
    /// Replace the artifact contents with `bytes`.
    fn write_artifact(&self, bytes: &[u8]) -> io::Result<()>;

    /// Read the complete artifact.
    fn read_artifact(&self) -> io::Result<Vec<u8>>;

    /// Filesystem location, if the store has one.
    ///
    /// Exec-mode workers are separate programs and need this to find the file.
    fn path(&self) -> Option<&Path> {
        None
    }

    /// Human-readable location for logs and errors.
    fn describe(&self) -> String {
        self.path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<memory>".to_string())
    }
}

/// Artifact kept in a file at a fixed path.
#[derive(Debug, Clone)]
pub struct FileArtifactStore {
    path: PathBuf,
}

impl FileArtifactStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ArtifactStore for FileArtifactStore {
    fn write_artifact(&self, bytes: &[u8]) -> io::Result<()> {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(ARTIFACT_MODE)
            .open(&self.path)?;
        file.write_all(bytes)?;
        file.flush()
    }

    fn read_artifact(&self) -> io::Result<Vec<u8>> {
        fs::read(&self.path)
    }

    fn path(&self) -> Option<&Path> {
        Some(&self.path)
    }
}

/// In-process artifact buffer.
///
/// Only meaningful when the worker sequence runs in the same address space,
/// e.g. when exercising [`crate::worker::process_line`] directly.
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    contents: Mutex<Option<Vec<u8>>>,
    writes: Mutex<usize>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds an artifact from an earlier run.
    pub fn with_contents(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            contents: Mutex::new(Some(bytes.into())),
            writes: Mutex::new(0),
        }
    }

    /// Number of writes performed so far.
    pub fn write_count(&self) -> usize {
        *self.writes.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ArtifactStore for MemoryArtifactStore {
    fn write_artifact(&self, bytes: &[u8]) -> io::Result<()> {
        let mut contents = self.contents.lock().unwrap_or_else(|e| e.into_inner());
        *contents = Some(bytes.to_vec());
        *self.writes.lock().unwrap_or_else(|e| e.into_inner()) += 1;
        Ok(())
    }

    fn read_artifact(&self) -> io::Result<Vec<u8>> {
        self.contents
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no artifact written"))
    }
}
