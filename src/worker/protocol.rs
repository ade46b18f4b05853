//! Outcome protocol between worker and supervisor.
//!
//! A worker reports back through exactly one channel: its exit status. The
//! three codes below are the whole vocabulary. They stay below 126 so they
//! never overlap with shell "killed by signal" codes (128 + N) or the Rust
//! panic code (101).
//!
//! Exec-mode workers additionally receive their input as a single
//! JSON-serialized, newline-terminated [`WorkRequest`] on stdin.

use crate::transform::Transform;
use serde::{Deserialize, Serialize};

/// Exit code for a successfully written artifact.
const EXIT_SUCCESS: i32 = 0;
/// Exit code for a rejected empty or blank line.
const EXIT_REJECTED: i32 = 55;
/// Exit code for an I/O failure while producing the artifact.
const EXIT_FATAL: i32 = 1;

/// Result a worker communicates to its supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The artifact holds the transformed line.
    Success,
    /// The line was empty or only spaces/tabs; the artifact was not touched.
    RejectedEmptyOrBlank,
    /// The worker could not produce the artifact, or died trying.
    FatalError,
}

impl Outcome {
    /// Exit code the worker terminates with for this outcome.
    pub(crate) fn exit_code(self) -> i32 {
        match self {
            Self::Success => EXIT_SUCCESS,
            Self::RejectedEmptyOrBlank => EXIT_REJECTED,
            Self::FatalError => EXIT_FATAL,
        }
    }

    /// Map a clean exit code back to an outcome.
    ///
    /// Returns `None` for codes outside the protocol.
    pub(crate) fn from_exit_code(code: i32) -> Option<Self> {
        match code {
            EXIT_SUCCESS => Some(Self::Success),
            EXIT_REJECTED => Some(Self::RejectedEmptyOrBlank),
            EXIT_FATAL => Some(Self::FatalError),
            _ => None,
        }
    }

    /// Whether the supervisor must abort on this outcome.
    pub fn is_fatal(self) -> bool {
        matches!(self, Self::FatalError)
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::RejectedEmptyOrBlank => write!(f, "rejected empty or blank line"),
            Self::FatalError => write!(f, "fatal error"),
        }
    }
}

/// Request from supervisor to an exec-mode worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkRequest {
    /// Raw input line, terminator included.
    pub line: String,
    /// Artifact file to write.
    pub artifact: String,
    /// Transform to apply.
    pub transform: Transform,
}

impl WorkRequest {
    pub fn new(line: impl Into<String>, artifact: impl Into<String>, transform: Transform) -> Self {
        Self {
            line: line.into(),
            artifact: artifact.into(),
            transform,
        }
    }

    /// Serialize to JSON line (with newline).
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        let mut json = serde_json::to_string(self)?;
        json.push('\n');
        Ok(json)
    }

    /// Deserialize from JSON line.
    pub fn from_line(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line.trim())
    }
}
