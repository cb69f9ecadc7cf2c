//! Directory Status (FRA entry), spec.md §3.

/// A single cron-like time-entry row in a directory's check schedule.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeEntry {
    /// Minutes (0-59) this entry fires on, as a bitmask.
    pub minutes: u64,
    /// Hours (0-23) this entry fires on, as a bitmask.
    pub hours: u32,
    /// Days of month (1-31) this entry fires on, as a bitmask.
    pub days_of_month: u32,
    /// Months (1-12) this entry fires on, as a bitmask.
    pub months: u16,
    /// Days of week (0-6) this entry fires on, as a bitmask.
    pub days_of_week: u8,
}

/// Directory option bits (spec.md §3).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FraOptions(u32);

impl FraOptions {
    /// Only one process may scan this directory at a time.
    pub const ONE_PROCESS_JUST_SCANNING: Self = Self(1 << 0);
    /// Do not spawn helper workers to parallelize a large listing.
    pub const DO_NOT_PARALLELIZE: Self = Self(1 << 1);
    /// Preserve the remote directory structure locally.
    pub const KEEP_PATH: Self = Self(1 << 2);
    /// The remote listing has no path delimiter; treat names as flat.
    pub const NO_DELIMITER: Self = Self(1 << 3);
    /// Skip size/mtime comparisons; refetch everything every scan.
    pub const STUPID_MODE: Self = Self(1 << 4);
    /// Delete the remote file after a successful fetch.
    pub const REMOVE: Self = Self(1 << 5);
    /// The directory URL names an index file to fetch, not a listing.
    pub const URL_WITH_INDEX_FILE_NAME: Self = Self(1 << 6);
    /// The server creates the destination filename; learn it from the
    /// response (spec.md §4.7 step 5a).
    pub const URL_CREATES_FILE_NAME: Self = Self(1 << 7);
    /// Skip `list`; synthesize a single-entry listing from a known pattern.
    pub const DONT_GET_DIR_LIST: Self = Self(1 << 8);
    /// Consult the retrieve-list for duplicate suppression.
    pub const DUPCHECK: Self = Self(1 << 9);

    /// Empty option set.
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Returns `true` if `flag` is set.
    #[must_use]
    pub const fn has(self, flag: Self) -> bool {
        self.0 & flag.0 == flag.0
    }

    /// Returns the union of two option sets.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

/// One Directory Status (FRA) entry: one per configured fetch directory.
#[derive(Clone, Debug)]
pub struct DirectoryStatus {
    /// Short configured alias for this directory.
    pub alias: String,
    /// The fetch URL (protocol, host, path).
    pub url: String,
    /// Seconds between remote-file-check attempts.
    pub check_interval: u32,
    /// Unix timestamp of the next scheduled check.
    pub next_check_time: i64,
    /// Cron-like schedule table; if non-empty it governs `next_check_time`
    /// instead of a flat interval.
    pub time_table: Vec<TimeEntry>,
    /// Directory option bits.
    pub options: FraOptions,
    /// Consecutive-error counter, cleared on a successful scan.
    pub error_counter: u32,
}

impl DirectoryStatus {
    /// Returns the next scheduled check time given `now` and `keep_connected`
    /// deadline `timeup`, per spec.md §4.6 step 1-2.
    #[must_use]
    pub fn next_check_after(&self, now: i64) -> i64 {
        if self.next_check_time > now {
            self.next_check_time
        } else {
            now + i64::from(self.check_interval.max(1))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DirectoryStatus {
        DirectoryStatus {
            alias: "dir-a".into(),
            url: "http://h/p/".into(),
            check_interval: 60,
            next_check_time: 1_000,
            time_table: Vec::new(),
            options: FraOptions::empty(),
            error_counter: 0,
        }
    }

    #[test]
    fn next_check_after_keeps_future_schedule() {
        let dir = sample();
        assert_eq!(dir.next_check_after(500), 1_000);
    }

    #[test]
    fn next_check_after_advances_past_interval() {
        let dir = sample();
        assert_eq!(dir.next_check_after(1_000), 1_060);
    }

    #[test]
    fn fra_options_union_and_has() {
        let opts = FraOptions::REMOVE.union(FraOptions::STUPID_MODE);
        assert!(opts.has(FraOptions::REMOVE));
        assert!(opts.has(FraOptions::STUPID_MODE));
        assert!(!opts.has(FraOptions::KEEP_PATH));
    }
}
