//! Worker-facing error type.
//!
//! Every fallible operation in the worker/transport/ssa crates ultimately
//! returns a [`WorkerError`]. The variants line up with spec.md §7's seven
//! error categories so a binary's `main` can convert `Err(e)` into the right
//! [`crate::ExitCode`] with a single `From` impl instead of re-deriving the
//! category at each call site.

use crate::ExitCode;
use std::io;

/// Errors a transfer worker can encounter.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    /// Transport-level connect failure (category 1: transient I/O).
    #[error("connect failed: {0}")]
    Connect(String),

    /// Remote read failure (category 1).
    #[error("remote read failed: {0}")]
    ReadRemote(String),

    /// Remote write failure (category 1).
    #[error("remote write failed: {0}")]
    WriteRemote(#[source] io::Error),

    /// Remote refused to open the path, not connection-fatal (category 2).
    #[error("remote open failed ({code}): {path}")]
    OpenRemote {
        /// Protocol status code (e.g. an HTTP-like 301/400/404).
        code: u32,
        /// The remote path that was rejected.
        path: String,
    },

    /// Local filesystem open failure (category 3: resource, fatal).
    #[error("local open failed: {0}")]
    OpenLocal(#[source] io::Error),

    /// Local read failure.
    #[error("local read failed: {0}")]
    ReadLocal(#[source] io::Error),

    /// Local write failure, including short writes.
    #[error("local write failed: {0}")]
    WriteLocal(#[source] io::Error),

    /// Remote delete failed after a successful fetch/send.
    #[error("remote delete failed: {0}")]
    DeleteRemote(String),

    /// Keep-alive `noop` failed; the connection is presumed gone.
    #[error("noop failed: {0}")]
    Noop(String),

    /// A buffer or SSA/RL slot could not be allocated.
    #[error("allocation failed: {0}")]
    Alloc(String),

    /// Per-file transfer-timeout exceeded (category 6).
    #[error("transfer timeout exceeded for {0}")]
    TransferTimeout(String),

    /// SSA/FRA position lost or the segment went STALE (category 5: clean
    /// exit, not an error the supervisor should retry differently).
    #[error("shared status area position lost: {0}")]
    StaleStatusArea(String),

    /// The scheduler handed this worker a job shaped for the other worker
    /// kind (send vs. fetch). spec.md's Open Question on
    /// `RETRIEVE_JOB_HACK` resolves this as a hard error (see DESIGN.md).
    #[error("misrouted job: expected {expected}, got {got}")]
    MisroutedJob {
        /// The worker kind this process was started as.
        expected: &'static str,
        /// The worker kind the job descriptor actually describes.
        got: &'static str,
    },
}

impl WorkerError {
    /// Maps this error onto the exit code a worker's `main` should return.
    #[must_use]
    pub const fn exit_code(&self) -> ExitCode {
        match self {
            Self::Connect(_) => ExitCode::ConnectError,
            Self::ReadRemote(_) => ExitCode::ReadRemoteError,
            Self::WriteRemote(_) => ExitCode::WriteRemoteError,
            Self::OpenRemote { .. } => ExitCode::OpenRemoteError,
            Self::OpenLocal(_) => ExitCode::OpenLocalError,
            Self::ReadLocal(_) => ExitCode::ReadLocalError,
            Self::WriteLocal(_) => ExitCode::WriteLocalError,
            Self::DeleteRemote(_) => ExitCode::DeleteRemoteError,
            Self::Noop(_) => ExitCode::NoopError,
            Self::Alloc(_) => ExitCode::AllocError,
            Self::TransferTimeout(_) => ExitCode::StillFilesToSend,
            Self::StaleStatusArea(_) => ExitCode::TransferSuccess,
            Self::MisroutedJob { .. } => ExitCode::OpenRemoteError,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_status_area_is_a_clean_exit() {
        let err = WorkerError::StaleStatusArea("fsa epoch changed".into());
        assert_eq!(err.exit_code(), ExitCode::TransferSuccess);
    }

    #[test]
    fn transfer_timeout_requeues() {
        let err = WorkerError::TransferTimeout("a.dat".into());
        assert_eq!(err.exit_code(), ExitCode::StillFilesToSend);
    }
}
