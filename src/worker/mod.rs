//! Worker subprocess protocol.
//!
//! One worker per input line, never more than one alive at a time. The
//! worker reports only through its exit status; the transformed line travels
//! back through the artifact file, which the supervisor reads after a
//! successful exit.
//!
//! # Architecture
//!
//! ```text
//!   ┌────────────┐  spawn(line)   ┌──────────┐
//!   │ Supervisor │ ─────────────▶ │  Worker  │
//!   │            │                │          │── write ──▶ code.txt
//!   │  waitpid() │ ◀── status ─── │  _exit() │                │
//!   └─────┬──────┘  0 / 55 / 1    └──────────┘                │
//!         └──────────────── read on Success ◀─────────────────┘
//! ```
//!
//! # Features
//!
//! - **Process isolation**: Each line is handled in its own process
//! - **Narrow channel**: Exit codes are private to this module behind [`Outcome`]
//! - **Crash handling**: Signals and unknown codes decode to a fatal outcome
//! - **Platform support**: Fork on Linux, posix_spawn on macOS

mod proc;
mod protocol;
mod signals;
mod spawn;
mod worker_main;

pub use proc::WorkerProc;
pub use protocol::{Outcome, WorkRequest};
pub use signals::{TerminationReason, WorkerReport};
pub use spawn::{SpawnMode, spawn_exec, spawn_forked};
pub use worker_main::{process_line, run_worker_main};
