//! The mapped segment itself: attach/check/remap discipline (spec.md §4.2).

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fs2::FileExt;
use memmap2::MmapMut;

use crate::counters::{CounterRecord, RECORD_LEN};
use crate::error::SsaError;
use crate::header::{Header, HEADER_LEN};

/// Result of polling a segment's header against the epoch it was attached
/// with (spec.md §4.2 `check(&segment)`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SegmentState {
    /// The epoch is unchanged; the mapping is still valid.
    Current,
    /// The header carries the `STALE` sentinel; remap required.
    Stale,
    /// The header carries a different, non-sentinel epoch; the supervisor
    /// rebuilt the layout. Remap required.
    IdChanged,
}

/// Upper bound on how long a worker waits for `REREADING` to clear before
/// treating itself as out-of-sync (spec.md §4.2).
pub const REREADING_WAIT_BOUND: Duration = Duration::from_secs(30);

/// A memory-mapped Shared Status Area segment: an 8-byte header followed by
/// a fixed-size array of [`CounterRecord`]s, one per host or directory
/// position (spec.md §4.2, §6).
pub struct SsaSegment {
    path: PathBuf,
    mmap: MmapMut,
    record_count: usize,
    attached_epoch: u32,
}

impl SsaSegment {
    fn body_len(record_count: usize) -> usize {
        HEADER_LEN + record_count * RECORD_LEN
    }

    /// Creates (if absent) and maps the segment file at `path`, sized for
    /// `record_count` records, initializing the epoch to `initial_epoch` if
    /// the file is newly created.
    ///
    /// # Errors
    /// Returns [`SsaError::Open`] or [`SsaError::Map`] on failure.
    pub fn attach(
        path: impl Into<PathBuf>,
        record_count: usize,
        initial_epoch: u32,
    ) -> Result<Self, SsaError> {
        let path = path.into();
        let len = Self::body_len(record_count) as u64;

        let file: File = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|source| SsaError::Open {
                path: path.clone(),
                source,
            })?;

        let is_new = file
            .metadata()
            .map_err(|source| SsaError::Open {
                path: path.clone(),
                source,
            })?
            .len()
            < len;
        if is_new {
            file.set_len(len).map_err(|source| SsaError::Open {
                path: path.clone(),
                source,
            })?;
        }

        // SAFETY: the file is sized above and exclusively addressed through
        // this mapping's accessors; no other in-process code touches these
        // bytes directly.
        let mmap = unsafe { MmapMut::map_mut(&file) }.map_err(|source| SsaError::Map {
            path: path.clone(),
            source,
        })?;

        let mut segment = Self {
            path,
            mmap,
            record_count,
            attached_epoch: 0,
        };

        if is_new {
            segment.header_mut().set_epoch(initial_epoch);
        }
        segment.attached_epoch = segment.header_epoch();
        Ok(segment)
    }

    fn header_epoch(&self) -> u32 {
        u32::from_le_bytes(self.mmap[0..4].try_into().unwrap())
    }

    fn header_rereading(&self) -> bool {
        self.mmap[5] != 0
    }

    fn header_mut(&mut self) -> Header<'_> {
        let bytes: &mut [u8; HEADER_LEN] = (&mut self.mmap[0..HEADER_LEN])
            .try_into()
            .expect("segment body_len reserves HEADER_LEN bytes");
        Header::new(bytes)
    }

    fn record_range(&self, index: usize) -> Result<std::ops::Range<usize>, SsaError> {
        if index >= self.record_count {
            return Err(SsaError::IndexOutOfBounds {
                index,
                record_count: self.record_count,
            });
        }
        let start = HEADER_LEN + index * RECORD_LEN;
        Ok(start..start + RECORD_LEN)
    }

    /// Polls the header against the epoch this handle attached with.
    #[must_use]
    pub fn check(&self) -> SegmentState {
        let current = self.header_epoch();
        if current == crate::header::STALE_EPOCH {
            SegmentState::Stale
        } else if current != self.attached_epoch {
            SegmentState::IdChanged
        } else {
            SegmentState::Current
        }
    }

    /// Rebuilds the layout: bumps the epoch to `new_epoch`, invalidating
    /// every other attached mapping (spec.md §3 "Shared Lifecycle").
    pub fn rebuild(&mut self, new_epoch: u32) {
        self.header_mut().set_epoch(new_epoch);
        self.attached_epoch = new_epoch;
    }

    /// `true` while the supervisor is rereading configuration.
    #[must_use]
    pub fn is_rereading(&self) -> bool {
        self.header_rereading()
    }

    /// Sets the `REREADING` flag (supervisor-side).
    pub fn set_rereading(&mut self, rereading: bool) {
        self.header_mut().set_rereading(rereading);
    }

    /// Blocks (polling) until `REREADING` clears or [`REREADING_WAIT_BOUND`]
    /// elapses.
    ///
    /// # Errors
    /// Returns [`SsaError::RereadingTimeout`] if the bound is exceeded.
    pub fn wait_for_rereading_clear(&self) -> Result<(), SsaError> {
        let start = Instant::now();
        while self.is_rereading() {
            if start.elapsed() > REREADING_WAIT_BOUND {
                return Err(SsaError::RereadingTimeout {
                    path: self.path.clone(),
                });
            }
            std::thread::sleep(Duration::from_millis(50));
        }
        Ok(())
    }

    fn lock_path(&self, kind: &str, index: usize) -> PathBuf {
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.path
            .with_file_name(format!(".{file_name}.{kind}.{index}.lock"))
    }

    fn with_lock<R>(
        &mut self,
        kind: &str,
        index: usize,
        f: impl FnOnce(&mut CounterRecord) -> R,
    ) -> Result<R, SsaError> {
        let range = self.record_range(index)?;
        let lock_path = self.lock_path(kind, index);
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&lock_path)
            .map_err(|source| SsaError::Lock {
                path: lock_path.clone(),
                source,
            })?;
        lock_file
            .lock_exclusive()
            .map_err(|source| SsaError::Lock {
                path: lock_path.clone(),
                source,
            })?;

        let record_bytes: &mut [u8; RECORD_LEN] = (&mut self.mmap[range])
            .try_into()
            .expect("record_range yields exactly RECORD_LEN bytes");
        let mut record = CounterRecord::read_from(record_bytes);
        let result = f(&mut record);
        record.write_to(record_bytes);

        lock_file.unlock().map_err(|source| SsaError::Lock {
            path: lock_path,
            source,
        })?;
        Ok(result)
    }

    /// Runs `f` against the counter record at `index` under `LOCK_TFC`
    /// (spec.md §4.2, §5: total-file-counter updates).
    ///
    /// # Errors
    /// Returns [`SsaError::IndexOutOfBounds`] or [`SsaError::Lock`].
    pub fn with_tfc_lock<R>(
        &mut self,
        index: usize,
        f: impl FnOnce(&mut CounterRecord) -> R,
    ) -> Result<R, SsaError> {
        self.with_lock("tfc", index, f)
    }

    /// Runs `f` against the counter record at `index` under `LOCK_CON`
    /// (spec.md §4.2, §5: connection-counter updates).
    ///
    /// # Errors
    /// Returns [`SsaError::IndexOutOfBounds`] or [`SsaError::Lock`].
    pub fn with_con_lock<R>(
        &mut self,
        index: usize,
        f: impl FnOnce(&mut CounterRecord) -> R,
    ) -> Result<R, SsaError> {
        self.with_lock("con", index, f)
    }

    /// Runs `f` against the counter record at `index` under the error-lock
    /// (spec.md §4.2, §5: error-counter updates).
    ///
    /// # Errors
    /// Returns [`SsaError::IndexOutOfBounds`] or [`SsaError::Lock`].
    pub fn with_error_lock<R>(
        &mut self,
        index: usize,
        f: impl FnOnce(&mut CounterRecord) -> R,
    ) -> Result<R, SsaError> {
        self.with_lock("error", index, f)
    }

    /// Reads the counter record at `index` without acquiring a lock, for
    /// callers that only need a best-effort snapshot.
    ///
    /// # Errors
    /// Returns [`SsaError::IndexOutOfBounds`] if `index` is out of range.
    pub fn read_record(&self, index: usize) -> Result<CounterRecord, SsaError> {
        let range = self.record_range(index)?;
        let bytes: &[u8; RECORD_LEN] = (&self.mmap[range])
            .try_into()
            .expect("record_range yields exactly RECORD_LEN bytes");
        Ok(CounterRecord::read_from(bytes))
    }

    /// The filesystem path backing this segment.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of records this segment was sized for.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.record_count
    }
}
