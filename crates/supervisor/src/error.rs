//! Errors the supervisor surfaces when it cannot spawn, wait on, or signal
//! a worker process.

use std::io;
use std::path::PathBuf;

/// Failures in the process-per-job lifecycle (spec.md §4.9).
#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    /// The worker binary could not be spawned.
    #[error("failed to spawn {binary}: {source}")]
    Spawn {
        /// Path to the binary that was attempted.
        binary: PathBuf,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },

    /// Waiting on the child process failed.
    #[error("failed to wait on worker process: {0}")]
    Wait(#[source] io::Error),

    /// The upward proc-fin fifo could not be opened or written.
    #[error("failed to signal proc-fin on {path}: {source}")]
    ProcFin {
        /// Fifo path that was attempted.
        path: PathBuf,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },
}
