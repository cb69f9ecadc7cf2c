use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use afd_model::RetrieveEntry;
use fs2::FileExt;

use crate::codec::{decode_entries, encode_entries};
use crate::error::RlError;

/// One row of a fresh remote directory listing, as passed to [`RetrieveList::scan`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListingRow {
    /// Remote file name.
    pub file_name: String,
    /// Remote size, if reported.
    pub size: Option<u64>,
    /// Remote mtime, if reported.
    pub mtime: Option<i64>,
    /// Optional extra fingerprint (e.g. an ETag).
    pub fingerprint: Option<String>,
}

/// What to do with the on-disk Retrieve List when a worker detaches
/// (spec.md §4.3: "in `stupid` or `remove` modes the RL is discarded on
/// detach, otherwise preserved").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetachPolicy {
    /// Persist the current in-memory entries back to disk.
    Preserve,
    /// Delete the on-disk file; the next `attach` starts from empty.
    Discard,
}

/// The set of entries a burst iteration should download, and the ones that
/// dropped out of the listing entirely (spec.md §4.3 `scan(listing) -> plan`).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScanPlan {
    /// Indices into the Retrieve List eligible for download: not yet
    /// retrieved, still `in_list`, and unassigned.
    pub to_fetch: Vec<usize>,
}

/// A directory's Retrieve List: the merged, persistent record of every
/// remote file this directory has seen (spec.md §4.3).
pub struct RetrieveList {
    path: PathBuf,
    entries: Vec<RetrieveEntry>,
}

impl RetrieveList {
    /// Attaches to the Retrieve List file for `dir`, loading any existing
    /// entries. A missing file is treated as an empty list.
    ///
    /// # Errors
    /// Returns [`RlError::Io`] or [`RlError::Corrupt`] on failure.
    pub fn attach(path: impl Into<PathBuf>) -> Result<Self, RlError> {
        let path = path.into();
        let entries = match File::open(&path) {
            Ok(mut file) => {
                file.lock_shared().map_err(|source| RlError::Io {
                    path: path.clone(),
                    source,
                })?;
                let result = decode_entries(&mut file).map_err(|source| {
                    if source.kind() == std::io::ErrorKind::InvalidData {
                        RlError::Corrupt {
                            path: path.clone(),
                            reason: source.to_string(),
                        }
                    } else {
                        RlError::Io {
                            path: path.clone(),
                            source,
                        }
                    }
                });
                FileExt::unlock(&file).ok();
                result?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(source) => {
                return Err(RlError::Io {
                    path: path.clone(),
                    source,
                })
            }
        };

        Ok(Self { path, entries })
    }

    /// Persists the current entries to disk and, per `policy`, either keeps
    /// or discards them going forward.
    ///
    /// # Errors
    /// Returns [`RlError::Io`] on failure.
    pub fn detach(self, policy: DetachPolicy) -> Result<(), RlError> {
        match policy {
            DetachPolicy::Preserve => self.persist(),
            DetachPolicy::Discard => match fs::remove_file(&self.path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(source) => Err(RlError::Io {
                    path: self.path,
                    source,
                }),
            },
        }
    }

    /// Writes the current in-memory entries back to the backing file.
    ///
    /// # Errors
    /// Returns [`RlError::Io`] on failure.
    pub fn persist(&self) -> Result<(), RlError> {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.path)
            .map_err(|source| RlError::Io {
                path: self.path.clone(),
                source,
            })?;
        file.lock_exclusive().map_err(|source| RlError::Io {
            path: self.path.clone(),
            source,
        })?;
        let result = encode_entries(&self.entries, &mut file).map_err(|source| RlError::Io {
            path: self.path.clone(),
            source,
        });
        FileExt::unlock(&file).ok();
        result
    }

    /// Merges `listing` into the stored entries (spec.md §4.3 "Merge
    /// rule"): identity is `(file_name, fingerprint)`; a row whose size or
    /// mtime changed is re-marked non-retrieved; rows absent from `listing`
    /// are retained unless `stupid_mode`.
    pub fn scan(&mut self, listing: &[ListingRow], stupid_mode: bool) -> ScanPlan {
        let mut seen = vec![false; self.entries.len()];

        for row in listing {
            let existing_index = self.entries.iter().position(|e| {
                e.identity() == (row.file_name.as_str(), row.fingerprint.as_deref())
            });

            if let Some(index) = existing_index {
                seen[index] = true;
                let entry = &mut self.entries[index];
                entry.in_list = true;
                if entry.changed_since(row.size, row.mtime) {
                    entry.previous_size = entry.size;
                    entry.size = row.size;
                    entry.mtime = row.mtime;
                    entry.retrieved = false;
                }
            } else {
                self.entries.push(RetrieveEntry::from_listing(
                    row.file_name.clone(),
                    row.size,
                    row.mtime,
                    row.fingerprint.clone(),
                ));
                seen.push(true);
            }
        }

        if stupid_mode {
            let mut keep = seen.into_iter();
            self.entries.retain(|_| keep.next().unwrap_or(true));
        }

        let to_fetch = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| !e.retrieved && e.in_list && e.assigned.is_none())
            .map(|(i, _)| i)
            .collect();

        ScanPlan { to_fetch }
    }

    /// Atomically assigns `worker_slot` to every entry in `indices`,
    /// rejecting the whole batch if any is already owned by a different
    /// slot (spec.md §4.3 "at-most-one concurrent worker per entry").
    ///
    /// # Errors
    /// Returns [`RlError::AlreadyAssigned`] or [`RlError::IndexOutOfBounds`].
    pub fn assign(&mut self, worker_slot: u32, indices: &[usize]) -> Result<(), RlError> {
        for &index in indices {
            let entry = self
                .entries
                .get(index)
                .ok_or(RlError::IndexOutOfBounds {
                    index,
                    len: self.entries.len(),
                })?;
            if let Some(owner) = entry.assigned {
                if owner != worker_slot + 1 {
                    return Err(RlError::AlreadyAssigned {
                        index,
                        current_slot: owner - 1,
                    });
                }
            }
        }
        for &index in indices {
            self.entries[index].assigned = Some(worker_slot + 1);
        }
        Ok(())
    }

    /// Marks the entry at `index` retrieved, clearing its assignment.
    ///
    /// # Errors
    /// Returns [`RlError::IndexOutOfBounds`] if `index` is out of range.
    pub fn mark_retrieved(&mut self, index: usize) -> Result<(), RlError> {
        let entry = self
            .entries
            .get_mut(index)
            .ok_or(RlError::IndexOutOfBounds {
                index,
                len: self.entries.len(),
            })?;
        entry.mark_retrieved();
        Ok(())
    }

    /// Hides the entry at `index` from future scans without marking it
    /// retrieved (spec.md §4.7 step 5d: a 404 removes the row from the
    /// listing but the file was never actually fetched).
    ///
    /// # Errors
    /// Returns [`RlError::IndexOutOfBounds`] if `index` is out of range.
    pub fn remove_from_list(&mut self, index: usize) -> Result<(), RlError> {
        let entry = self
            .entries
            .get_mut(index)
            .ok_or(RlError::IndexOutOfBounds {
                index,
                len: self.entries.len(),
            })?;
        entry.in_list = false;
        entry.assigned = None;
        Ok(())
    }

    /// Clears every assignment owned by `slot` (spec.md §4.3 `release`,
    /// called when a worker dies without completing its assigned rows).
    pub fn release(&mut self, slot: u32) {
        for entry in &mut self.entries {
            if entry.assigned == Some(slot + 1) {
                entry.assigned = None;
            }
        }
    }

    /// Borrows the entry at `index`.
    #[must_use]
    pub fn entry(&self, index: usize) -> Option<&RetrieveEntry> {
        self.entries.get(index)
    }

    /// The full set of entries currently held.
    #[must_use]
    pub fn entries(&self) -> &[RetrieveEntry] {
        &self.entries
    }

    /// The backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(name: &str, size: u64, mtime: i64) -> ListingRow {
        ListingRow {
            file_name: name.into(),
            size: Some(size),
            mtime: Some(mtime),
            fingerprint: None,
        }
    }

    #[test]
    fn scan_adds_new_entries_and_marks_them_fetchable() {
        let dir = tempfile::tempdir().unwrap();
        let mut rl = RetrieveList::attach(dir.path().join("rl.dat")).unwrap();
        let plan = rl.scan(&[row("a", 10, 1), row("b", 20, 2)], false);
        assert_eq!(plan.to_fetch, vec![0, 1]);
    }

    #[test]
    fn scan_does_not_refetch_unchanged_retrieved_entries() {
        let dir = tempfile::tempdir().unwrap();
        let mut rl = RetrieveList::attach(dir.path().join("rl.dat")).unwrap();
        rl.scan(&[row("a", 10, 1)], false);
        rl.mark_retrieved(0).unwrap();

        let plan = rl.scan(&[row("a", 10, 1)], false);
        assert!(plan.to_fetch.is_empty());
    }

    #[test]
    fn scan_reopens_entries_whose_size_or_mtime_changed() {
        let dir = tempfile::tempdir().unwrap();
        let mut rl = RetrieveList::attach(dir.path().join("rl.dat")).unwrap();
        rl.scan(&[row("a", 10, 1)], false);
        rl.mark_retrieved(0).unwrap();

        let plan = rl.scan(&[row("a", 11, 1)], false);
        assert_eq!(plan.to_fetch, vec![0]);
        assert_eq!(rl.entry(0).unwrap().previous_size, Some(10));
    }

    #[test]
    fn stupid_mode_drops_entries_absent_from_the_listing() {
        let dir = tempfile::tempdir().unwrap();
        let mut rl = RetrieveList::attach(dir.path().join("rl.dat")).unwrap();
        rl.scan(&[row("a", 10, 1), row("b", 20, 2)], false);
        rl.scan(&[row("a", 10, 1)], true);
        assert_eq!(rl.entries().len(), 1);
        assert_eq!(rl.entries()[0].file_name, "a");
    }

    #[test]
    fn assign_rejects_rows_already_owned_by_another_slot() {
        let dir = tempfile::tempdir().unwrap();
        let mut rl = RetrieveList::attach(dir.path().join("rl.dat")).unwrap();
        rl.scan(&[row("a", 10, 1)], false);
        rl.assign(0, &[0]).unwrap();
        let err = rl.assign(1, &[0]).unwrap_err();
        assert!(matches!(err, RlError::AlreadyAssigned { .. }));
    }

    #[test]
    fn release_clears_only_the_given_slots_assignments() {
        let dir = tempfile::tempdir().unwrap();
        let mut rl = RetrieveList::attach(dir.path().join("rl.dat")).unwrap();
        rl.scan(&[row("a", 10, 1), row("b", 20, 2)], false);
        rl.assign(0, &[0]).unwrap();
        rl.assign(1, &[1]).unwrap();
        rl.release(0);
        assert_eq!(rl.entry(0).unwrap().assigned, None);
        assert_eq!(rl.entry(1).unwrap().assigned, Some(2));
    }

    #[test]
    fn persist_and_reattach_round_trips_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rl.dat");
        let mut rl = RetrieveList::attach(&path).unwrap();
        rl.scan(&[row("a", 10, 1)], false);
        rl.mark_retrieved(0).unwrap();
        rl.persist().unwrap();

        let reattached = RetrieveList::attach(&path).unwrap();
        assert_eq!(reattached.entries().len(), 1);
        assert!(reattached.entries()[0].retrieved);
    }

    #[test]
    fn discard_on_detach_removes_the_backing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rl.dat");
        let mut rl = RetrieveList::attach(&path).unwrap();
        rl.scan(&[row("a", 10, 1)], false);
        rl.persist().unwrap();
        assert!(path.exists());

        let rl = RetrieveList::attach(&path).unwrap();
        rl.detach(DetachPolicy::Discard).unwrap();
        assert!(!path.exists());
    }
}
