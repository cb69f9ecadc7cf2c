//! Retrieve List (RL) entry, spec.md §3 and §4.3.

/// A single remote file known to a directory's retrieve list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetrieveEntry {
    /// Remote file name (identity key, together with `fingerprint`).
    pub file_name: String,
    /// Remote size in bytes, or `None` if the server didn't report one.
    pub size: Option<u64>,
    /// Size recorded the previous time this entry was seen; used to resume
    /// an `APPEND_ONLY`-mode partial transfer.
    pub previous_size: Option<u64>,
    /// Remote modification time (unix seconds), or `None` if unknown.
    pub mtime: Option<i64>,
    /// Whether this file has already been successfully retrieved.
    pub retrieved: bool,
    /// `false` once a 404 (or equivalent) has hidden this entry from future
    /// scans, per spec.md §4.7 step 5d.
    pub in_list: bool,
    /// `Some(slot)` while a worker owns this entry; `None` when free.
    pub assigned: Option<u32>,
    /// Optional extra fingerprint (e.g. an ETag) strengthening identity
    /// beyond `file_name` alone.
    pub fingerprint: Option<String>,
}

impl RetrieveEntry {
    /// Constructs a fresh, unretrieved, unassigned entry from a listing row.
    #[must_use]
    pub fn from_listing(
        file_name: String,
        size: Option<u64>,
        mtime: Option<i64>,
        fingerprint: Option<String>,
    ) -> Self {
        Self {
            file_name,
            size,
            previous_size: None,
            mtime,
            retrieved: false,
            in_list: true,
            assigned: None,
            fingerprint,
        }
    }

    /// Identity key used for merge/dedup: `(file_name, fingerprint)`
    /// (spec.md §4.3 "Merge rule").
    #[must_use]
    pub fn identity(&self) -> (&str, Option<&str>) {
        (&self.file_name, self.fingerprint.as_deref())
    }

    /// `true` if this listing row differs from `self` in a way that should
    /// re-mark it non-retrieved (spec.md §4.3: "an entry whose remote size
    /// or mtime changed is re-marked non-retrieved").
    #[must_use]
    pub fn changed_since(&self, new_size: Option<u64>, new_mtime: Option<i64>) -> bool {
        new_size != self.size || new_mtime != self.mtime
    }

    /// Marks this entry retrieved and releases any assignment, upholding
    /// the invariant `retrieved == YES ⇒ assigned == 0` (spec.md §3).
    pub fn mark_retrieved(&mut self) {
        self.retrieved = true;
        self.assigned = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mark_retrieved_clears_assignment() {
        let mut entry = RetrieveEntry::from_listing("a.dat".into(), Some(10), Some(1), None);
        entry.assigned = Some(3);
        entry.mark_retrieved();
        assert!(entry.retrieved);
        assert_eq!(entry.assigned, None);
    }

    #[test]
    fn changed_since_detects_size_or_mtime_drift() {
        let entry = RetrieveEntry::from_listing("a.dat".into(), Some(10), Some(1), None);
        assert!(!entry.changed_since(Some(10), Some(1)));
        assert!(entry.changed_since(Some(11), Some(1)));
        assert!(entry.changed_since(Some(10), Some(2)));
    }

    #[test]
    fn identity_uses_name_and_fingerprint() {
        let entry =
            RetrieveEntry::from_listing("a.dat".into(), None, None, Some("etag-1".into()));
        assert_eq!(entry.identity(), ("a.dat", Some("etag-1")));
    }
}
