use std::path::PathBuf;

/// Failure attaching to, checking, or locking a Shared Status Area segment.
#[derive(Debug, thiserror::Error)]
pub enum SsaError {
    /// The segment file could not be opened, created, or sized.
    #[error("failed to open SSA segment {path}: {source}")]
    Open {
        /// Path of the segment file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// `memmap2` failed to map the segment file.
    #[error("failed to map SSA segment {path}: {source}")]
    Map {
        /// Path of the segment file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// A region lock (`LOCK_CON`/`LOCK_TFC`/error-lock) could not be
    /// acquired or released.
    #[error("failed to acquire lock {path}: {source}")]
    Lock {
        /// Path of the sidecar lock file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// `index` is outside the segment's configured record count.
    #[error("record index {index} out of bounds (segment holds {record_count} records)")]
    IndexOutOfBounds {
        /// Requested index.
        index: usize,
        /// Number of records the segment was sized for.
        record_count: usize,
    },
    /// The segment stayed `REREADING` past the bounded wait window
    /// (spec.md §4.2: "exceeding it marks the worker out-of-sync").
    #[error("timed out waiting for REREADING to clear on {path}")]
    RereadingTimeout {
        /// Path of the segment file.
        path: PathBuf,
    },
}
