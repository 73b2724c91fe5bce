//! Child process execution
//!
//! Runs external programs with a wall-clock timeout and buffered output
//! capture. Non-zero exits, signals and timeouts are reported as data in
//! [`ProcessResult`](crate::types::ProcessResult); only failures to launch or
//! talk to the child are errors.

use thiserror::Error;

pub use crate::process::quote::{normalize, shell_pipeline};
pub use crate::process::runner::{ProcessRunner, RunOptions};

pub mod quote;
mod runner;

/// Errors that occur while launching or supervising a child process
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("empty command")]
    EmptyCommand,

    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
