//! Process handle for a single in-flight worker.

use super::signals::{TerminationReason, analyze_wait_status};
use crate::error::{CoderError, Result};
use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use nix::unistd::Pid;
use std::time::{Duration, Instant};

/// Poll interval while waiting with a timeout.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Handle to a worker subprocess.
///
/// The handle owns the obligation to reap the child. Dropping it un-reaped
/// kills and reaps the worker so no zombie outlives its iteration.
#[derive(Debug)]
pub struct WorkerProc {
    /// Process ID
    pid: Pid,
    /// Whether the process has been reaped
    reaped: bool,
}

impl WorkerProc {
    /// Wrap a freshly created child pid.
    pub fn new(pid: Pid) -> Self {
        Self { pid, reaped: false }
    }

    /// Create from a spawned `std::process::Child`.
    ///
    /// The child is reaped through `waitpid` from here on, never through the
    /// `Child` itself.
    pub fn from_child(child: &std::process::Child) -> Self {
        Self::new(Pid::from_raw(child.id() as i32))
    }

    /// Get the process ID.
    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// Wait for the worker to terminate (blocking, no timeout).
    pub fn wait(&mut self) -> Result<TerminationReason> {
        if self.reaped {
            return Err(CoderError::Wait("process already reaped".into()));
        }
        loop {
            match waitpid(self.pid, None) {
                Ok(status @ (WaitStatus::Exited(..) | WaitStatus::Signaled(..))) => {
                    self.reaped = true;
                    return Ok(analyze_wait_status(status));
                }
                // Stop/continue notifications are not terminations
                Ok(_) | Err(Errno::EINTR) => continue,
                Err(e) => return Err(CoderError::Wait(format!("waitpid failed: {}", e))),
            }
        }
    }

    /// Try to reap the worker without blocking.
    ///
    /// Returns `None` if the process is still running.
    pub fn try_wait(&mut self) -> Result<Option<TerminationReason>> {
        if self.reaped {
            return Err(CoderError::Wait("process already reaped".into()));
        }
        match waitpid(self.pid, Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::StillAlive) => Ok(None),
            Ok(status @ (WaitStatus::Exited(..) | WaitStatus::Signaled(..))) => {
                self.reaped = true;
                Ok(Some(analyze_wait_status(status)))
            }
            Ok(_) | Err(Errno::EINTR) => Ok(None),
            Err(e) => Err(CoderError::Wait(format!("waitpid failed: {}", e))),
        }
    }

    /// Wait for the worker, killing it if it outlives `timeout`.
    ///
    /// A killed worker is reported as [`TerminationReason::TimedOut`].
    pub fn wait_timeout(&mut self, timeout: Duration) -> Result<TerminationReason> {
        let start = Instant::now();
        while start.elapsed() < timeout {
            if let Some(reason) = self.try_wait()? {
                return Ok(reason);
            }
            std::thread::sleep(POLL_INTERVAL);
        }

        tracing::warn!(pid = %self.pid, ?timeout, "Worker timed out, killing");
        self.kill()?;
        Ok(TerminationReason::TimedOut)
    }

    /// Send SIGKILL to the worker and reap it.
    pub fn kill(&mut self) -> Result<()> {
        if self.reaped {
            return Ok(());
        }
        match signal::kill(self.pid, Signal::SIGKILL) {
            // Already gone but not yet reaped is fine
            Ok(()) | Err(Errno::ESRCH) => {}
            Err(e) => return Err(CoderError::Wait(format!("Failed to send SIGKILL: {}", e))),
        }
        self.wait()?;
        Ok(())
    }
}

impl Drop for WorkerProc {
    fn drop(&mut self) {
        if !self.reaped {
            let _ = signal::kill(self.pid, Signal::SIGKILL);
            let _ = waitpid(self.pid, None);
            self.reaped = true;
        }
    }
}
