//! Worker side of the protocol.
//!
//! A worker turns exactly one raw line into either an artifact or a rejection,
//! then terminates with the matching exit code. Forked workers enter through
//! [`run_worker`]; exec-mode workers through [`run_worker_main`], which runs
//! when `linecoder worker` is invoked.

use super::protocol::{Outcome, WorkRequest};
use crate::artifact::{ArtifactStore, FileArtifactStore};
use crate::line::{is_blank, strip_terminator};
use crate::transform::Transform;
use std::io::{self, BufRead};
use std::panic::{AssertUnwindSafe, catch_unwind};

/// Validate, transform and persist one raw line.
///
/// The artifact is written only for a non-blank line; a rejected line leaves
/// whatever an earlier run produced untouched.
pub fn process_line<S: ArtifactStore + ?Sized>(
    raw: &str,
    transform: Transform,
    store: &S,
) -> Outcome {
    let line = strip_terminator(raw);

    if is_blank(line) {
        tracing::debug!("Worker received an empty or blank line");
        return Outcome::RejectedEmptyOrBlank;
    }

    let mut coded = transform.apply(line);
    coded.push('\n');

    match store.write_artifact(coded.as_bytes()) {
        Ok(()) => {
            tracing::debug!(artifact = %store.describe(), %transform, "Worker wrote artifact");
            Outcome::Success
        }
        Err(e) => {
            tracing::error!(artifact = %store.describe(), error = %e, "Worker failed to write artifact");
            Outcome::FatalError
        }
    }
}

/// Run the worker sequence in a forked child and terminate.
///
/// Leaves through `_exit` so nothing inherited from the supervisor (buffered
/// output, exit handlers) runs a second time. A panic aborts the process,
/// which the supervisor sees as abnormal termination.
pub fn run_worker<S: ArtifactStore + ?Sized>(raw: &str, transform: Transform, store: &S) -> ! {
    match catch_unwind(AssertUnwindSafe(|| process_line(raw, transform, store))) {
        // Safety: `_exit` skips atexit handlers and stdio flushing, which
        // belong to the supervisor's copy of the process state.
        Ok(outcome) => unsafe { libc::_exit(outcome.exit_code()) },
        Err(_) => std::process::abort(),
    }
}

/// Read the single request an exec-mode worker receives on stdin.
fn read_request<R: BufRead>(reader: &mut R) -> io::Result<WorkRequest> {
    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "no request received",
        ));
    }
    WorkRequest::from_line(&line).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Run the exec-mode worker main function.
///
/// This function never returns; it exits with the outcome's code.
pub fn run_worker_main() -> ! {
    let request = match read_request(&mut io::stdin().lock()) {
        Ok(request) => request,
        Err(e) => {
            tracing::error!(error = %e, "Worker received an invalid request");
            std::process::exit(Outcome::FatalError.exit_code());
        }
    };

    let store = FileArtifactStore::new(&request.artifact);
    let outcome = process_line(&request.line, request.transform, &store);
    std::process::exit(outcome.exit_code())
}
