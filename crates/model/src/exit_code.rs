//! Worker exit codes.
//!
//! A worker always exits with one of these codes (spec.md §4.8). The
//! supervisor maps the code back onto retry/backoff policy; this crate only
//! owns the enumeration and its textual description.

use std::fmt;

/// Exit codes a send or fetch worker may terminate with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ExitCode {
    /// Job (and any burst jobs) completed normally.
    TransferSuccess = 0,
    /// A per-file transfer-timeout or a mid-session reconnect left files
    /// unsent/unfetched; the supervisor should requeue the job.
    StillFilesToSend = 1,
    /// `Transport::connect` failed (DNS, refused, TLS handshake, auth).
    ConnectError = 2,
    /// The remote refused to open the requested path for read/write.
    OpenRemoteError = 3,
    /// A read from the remote connection failed.
    ReadRemoteError = 4,
    /// A write to the remote connection failed.
    WriteRemoteError = 5,
    /// A local temp/final path could not be opened.
    OpenLocalError = 6,
    /// A read from a local file failed.
    ReadLocalError = 7,
    /// A write to a local file failed (includes short writes).
    WriteLocalError = 8,
    /// Deleting the remote source (after a successful fetch) failed.
    DeleteRemoteError = 9,
    /// `Transport::noop` failed during keep-alive; the connection is gone.
    NoopError = 10,
    /// A resource (buffer, slot) could not be allocated.
    AllocError = 11,
    /// The job had nothing to send (empty file list after dedup).
    NoFilesToSend = 12,
    /// The worker was terminated by SIGINT/SIGTERM outside of keep-alive.
    GotKilled = 13,
}

impl ExitCode {
    /// Returns the numeric exit status a worker process should return.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self as i32
    }

    /// Recovers the exit code a worker process returned, for a supervisor
    /// decoding a finished child's exit status. Any value outside the
    /// enumeration (crash, signal death reported as a bare code) maps to
    /// `None`.
    #[must_use]
    pub const fn from_i32(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::TransferSuccess),
            1 => Some(Self::StillFilesToSend),
            2 => Some(Self::ConnectError),
            3 => Some(Self::OpenRemoteError),
            4 => Some(Self::ReadRemoteError),
            5 => Some(Self::WriteRemoteError),
            6 => Some(Self::OpenLocalError),
            7 => Some(Self::ReadLocalError),
            8 => Some(Self::WriteLocalError),
            9 => Some(Self::DeleteRemoteError),
            10 => Some(Self::NoopError),
            11 => Some(Self::AllocError),
            12 => Some(Self::NoFilesToSend),
            13 => Some(Self::GotKilled),
            _ => None,
        }
    }

    /// Returns a short, stable, lowercase description suitable for log lines.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::TransferSuccess => "transfer success",
            Self::StillFilesToSend => "still files to send",
            Self::ConnectError => "connect error",
            Self::OpenRemoteError => "open remote error",
            Self::ReadRemoteError => "read remote error",
            Self::WriteRemoteError => "write remote error",
            Self::OpenLocalError => "open local error",
            Self::ReadLocalError => "read local error",
            Self::WriteLocalError => "write local error",
            Self::DeleteRemoteError => "delete remote error",
            Self::NoopError => "noop error",
            Self::AllocError => "alloc error",
            Self::NoFilesToSend => "no files to send",
            Self::GotKilled => "got killed",
        }
    }

    /// `true` for codes the supervisor should retry with backoff rather than
    /// treat as terminal for the job (spec.md §7 category 1).
    #[must_use]
    pub const fn is_transient(self) -> bool {
        matches!(
            self,
            Self::ConnectError | Self::ReadRemoteError | Self::WriteRemoteError
        )
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code.as_i32()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn as_i32_matches_repr() {
        assert_eq!(ExitCode::TransferSuccess.as_i32(), 0);
        assert_eq!(ExitCode::GotKilled.as_i32(), 13);
    }

    #[test]
    fn from_i32_round_trips_every_variant() {
        for code in 0..=13 {
            let decoded = ExitCode::from_i32(code).unwrap();
            assert_eq!(decoded.as_i32(), code);
        }
        assert!(ExitCode::from_i32(139).is_none());
    }

    #[test]
    fn transient_codes_are_exactly_the_retryable_ones() {
        assert!(ExitCode::ConnectError.is_transient());
        assert!(ExitCode::ReadRemoteError.is_transient());
        assert!(ExitCode::WriteRemoteError.is_transient());
        assert!(!ExitCode::TransferSuccess.is_transient());
        assert!(!ExitCode::NoFilesToSend.is_transient());
    }
}
