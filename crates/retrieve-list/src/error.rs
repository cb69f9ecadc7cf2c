use std::path::PathBuf;

/// Failure attaching to, persisting, or mutating a Retrieve List.
#[derive(Debug, thiserror::Error)]
pub enum RlError {
    /// The backing file could not be read or written.
    #[error("failed to access retrieve list {path}: {source}")]
    Io {
        /// Path of the retrieve-list file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The on-disk record stream was truncated or otherwise malformed.
    #[error("corrupt retrieve list {path}: {reason}")]
    Corrupt {
        /// Path of the retrieve-list file.
        path: PathBuf,
        /// Human-readable reason.
        reason: String,
    },
    /// `assign` targeted a row that is already owned by another worker
    /// (spec.md §4.3: "rejecting already-assigned rows").
    #[error("retrieve list entry {index} is already assigned to slot {current_slot}")]
    AlreadyAssigned {
        /// Index of the offending row.
        index: usize,
        /// Slot currently holding the assignment.
        current_slot: u32,
    },
    /// An index passed to `assign`/`mark_retrieved` is out of range.
    #[error("retrieve list index {index} out of bounds ({len} entries)")]
    IndexOutOfBounds {
        /// Requested index.
        index: usize,
        /// Number of entries currently held.
        len: usize,
    },
}
