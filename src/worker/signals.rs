//! Termination analysis for worker processes.
//!
//! Turns a raw wait status into a [`TerminationReason`] and decodes that into
//! the [`Outcome`] the supervisor acts on.

use super::protocol::Outcome;
use nix::sys::signal::Signal;
use nix::sys::wait::WaitStatus;

/// Reason why a worker process terminated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminationReason {
    /// Normal exit with status code.
    Exited(i32),
    /// Killed by signal.
    Signaled(Signal),
    /// Killed by the supervisor after the configured timeout.
    TimedOut,
    /// Stopped, continued or otherwise not a termination.
    Unknown,
}

impl TerminationReason {
    /// Get a human-readable description.
    pub fn description(&self) -> String {
        match self {
            Self::Exited(code) => format!("exited with code {}", code),
            Self::Signaled(sig) => format!("killed by signal {}", sig.as_str()),
            Self::TimedOut => "killed after exceeding the worker timeout".to_string(),
            Self::Unknown => "terminated for an unknown reason".to_string(),
        }
    }
}

impl std::fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Analyze a `WaitStatus` to determine the termination reason.
pub fn analyze_wait_status(status: WaitStatus) -> TerminationReason {
    match status {
        WaitStatus::Exited(_, code) => TerminationReason::Exited(code),
        WaitStatus::Signaled(_, signal, _) => TerminationReason::Signaled(signal),
        _ => TerminationReason::Unknown,
    }
}

/// Decode a termination into an outcome.
///
/// Anything other than a clean exit with a protocol code is abnormal and
/// counts as [`Outcome::FatalError`].
pub fn decode(reason: &TerminationReason) -> Outcome {
    match reason {
        TerminationReason::Exited(code) => {
            Outcome::from_exit_code(*code).unwrap_or(Outcome::FatalError)
        }
        _ => Outcome::FatalError,
    }
}

/// What the supervisor learned from one worker run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerReport {
    /// Decoded outcome.
    pub outcome: Outcome,
    /// How the worker actually terminated.
    pub termination: TerminationReason,
}

impl WorkerReport {
    pub fn from_termination(termination: TerminationReason) -> Self {
        Self {
            outcome: decode(&termination),
            termination,
        }
    }

    /// Whether the worker died rather than reporting an outcome itself.
    pub fn is_abnormal(&self) -> bool {
        match self.termination {
            TerminationReason::Exited(code) => Outcome::from_exit_code(code).is_none(),
            _ => true,
        }
    }
}

impl std::fmt::Display for WorkerReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Worker {} ({})", self.termination, self.outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::unistd::Pid;

    fn pid() -> Pid {
        Pid::from_raw(1)
    }

    #[test]
    fn test_analyze_wait_status() {
        assert_eq!(
            analyze_wait_status(WaitStatus::Exited(pid(), 55)),
            TerminationReason::Exited(55)
        );
        assert_eq!(
            analyze_wait_status(WaitStatus::Signaled(pid(), Signal::SIGSEGV, true)),
            TerminationReason::Signaled(Signal::SIGSEGV)
        );
        assert_eq!(
            analyze_wait_status(WaitStatus::Stopped(pid(), Signal::SIGSTOP)),
            TerminationReason::Unknown
        );
        assert_eq!(
            analyze_wait_status(WaitStatus::StillAlive),
            TerminationReason::Unknown
        );
    }

    #[test]
    fn test_decode_protocol_codes() {
        assert_eq!(decode(&TerminationReason::Exited(0)), Outcome::Success);
        assert_eq!(
            decode(&TerminationReason::Exited(55)),
            Outcome::RejectedEmptyOrBlank
        );
        assert_eq!(decode(&TerminationReason::Exited(1)), Outcome::FatalError);
    }

    #[test]
    fn test_decode_abnormal_is_fatal() {
        assert_eq!(decode(&TerminationReason::Exited(101)), Outcome::FatalError);
        assert_eq!(
            decode(&TerminationReason::Signaled(Signal::SIGKILL)),
            Outcome::FatalError
        );
        assert_eq!(
            decode(&TerminationReason::Signaled(Signal::SIGABRT)),
            Outcome::FatalError
        );
        assert_eq!(decode(&TerminationReason::TimedOut), Outcome::FatalError);
        assert_eq!(decode(&TerminationReason::Unknown), Outcome::FatalError);
    }

    #[test]
    fn test_report_abnormal() {
        assert!(!WorkerReport::from_termination(TerminationReason::Exited(0)).is_abnormal());
        assert!(!WorkerReport::from_termination(TerminationReason::Exited(1)).is_abnormal());
        assert!(WorkerReport::from_termination(TerminationReason::Exited(3)).is_abnormal());
        assert!(
            WorkerReport::from_termination(TerminationReason::Signaled(Signal::SIGSEGV))
                .is_abnormal()
        );
    }

    #[test]
    fn test_report_display() {
        let report =
            WorkerReport::from_termination(TerminationReason::Signaled(Signal::SIGSEGV));
        let display = report.to_string();
        assert!(display.contains("SIGSEGV"));
        assert!(display.contains("fatal error"));
    }
}
