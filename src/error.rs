//! Error types for linecoder.

use thiserror::Error;

/// Main error type for linecoder.
///
/// Every variant is fatal to the supervisor loop. Blank-line rejections are
/// not errors and never reach this type.
#[derive(Error, Debug)]
pub enum CoderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to read input: {0}")]
    Read(#[source] std::io::Error),

    #[error("Failed to spawn worker: {0}")]
    Spawn(String),

    #[error("Failed to wait for worker: {0}")]
    Wait(String),

    #[error("Worker failed: {0}")]
    WorkerFatal(String),

    #[error("Failed to read artifact {path}: {source}")]
    ArtifactRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write output: {0}")]
    Output(#[source] std::io::Error),
}

/// Process exit code for any fatal condition.
pub const FATAL_EXIT_CODE: i32 = 1;

/// Result type alias for linecoder operations.
pub type Result<T> = std::result::Result<T, CoderError>;
