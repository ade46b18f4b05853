//! linecoder - codes text one line at a time, each line in its own worker process.
//!
//! The [`supervisor`] reads a line and spawns a [`worker`]. The worker
//! validates and transforms the line, writes it to the shared artifact file
//! and reports back only through its exit status.

pub mod artifact;
pub mod cli;
pub mod error;
pub mod line;
pub mod logging;
pub mod paths;
pub mod supervisor;
pub mod transform;
pub mod worker;
