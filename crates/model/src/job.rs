//! Job Descriptor (DB), spec.md §3.

use std::time::Duration;

/// Transfer mode, carried over from the classic `'I'`/`'A'`/`'N'` encoding
/// (image/binary, ASCII, "don't care").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransferMode {
    /// Binary/image transfer, no translation.
    Binary,
    /// ASCII transfer with line-ending translation.
    Ascii,
    /// Let the transport pick based on its own defaults.
    Auto,
}

/// Active vs. passive vs. extended-passive connection mode (FTP-flavoured,
/// but also read by other transports that have an analogous choice).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModeFlag {
    /// Active mode.
    Active,
    /// Passive mode.
    Passive,
    /// Extended passive mode (EPSV).
    ExtendedPassive,
}

/// Which kind of worker a job descriptor is destined for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobKind {
    /// A send job: push local files to a remote host.
    Send,
    /// A fetch job: pull remote files into the local spool.
    Fetch,
}

impl JobKind {
    /// Short name used in log lines and error messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Send => "send",
            Self::Fetch => "fetch",
        }
    }
}

/// A decomposed target URL/path: protocol, host toggle, port, credentials,
/// and remote path (spec.md §3).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Target {
    /// Protocol scheme (`"http"`, `"ftp"`, `"sftp"`, `"smtp"`, `"loc"`, `"exec"`).
    pub protocol: String,
    /// Remote port, or `None` to use the protocol default.
    pub port: Option<u16>,
    /// Remote username.
    pub user: String,
    /// Remote password.
    pub password: String,
    /// Remote directory path.
    pub path: String,
}

/// Per-worker-process Job Descriptor (spec.md §3). Created by the
/// supervisor from a per-job message file (send) or the directory's URL
/// (fetch); mutated by the worker; destroyed on exit.
#[derive(Clone, Debug)]
pub struct JobDescriptor {
    /// Whether this descriptor drives a send or fetch worker.
    pub kind: JobKind,
    /// The decomposed target.
    pub target: Target,
    /// Transfer mode.
    pub transfer_mode: TransferMode,
    /// Active/passive/extended connection mode.
    pub mode_flag: ModeFlag,
    /// Block size for reads/writes.
    pub block_size: u32,
    /// Per-process transfer-rate limit, bytes/sec (0 = unlimited).
    pub rate_limit: u64,
    /// Unix timestamp used to compute the archive sub-directory for sends.
    pub archive_time: i64,
    /// Archive directory root; `None` disables archiving (unlink instead).
    pub archive_dir: Option<String>,
    /// Shell-style rename rule applied to the final local/remote name.
    pub rename_rule: Option<String>,
    /// Files older than this (seconds) are skipped.
    pub age_limit: Option<Duration>,
    /// Duplicate-check settings: `(ttl, use_content_hash)`.
    pub dupcheck: Option<(Duration, bool)>,
    /// TLS client-auth material identifier, if any.
    pub tls_auth: Option<String>,
    /// Retry count so far for this job.
    pub retry_count: u32,
    /// The send job id (`Some` for `JobKind::Send`).
    pub job_id: Option<u32>,
    /// The fetch directory id (`Some` for `JobKind::Fetch`).
    pub dir_id: Option<u32>,
    /// Derived: the currently active target directory, tracked separately
    /// from `target.path` so a burst rebind (`TARGET_DIR_CHANGED`) can be
    /// detected by comparing against it (spec.md §4.5 step 7).
    pub active_target_dir: String,
    /// Derived: the currently active user, for burst value-change
    /// detection.
    pub active_user: String,
    /// Derived: the currently active transfer mode, for burst value-change
    /// detection.
    pub active_transfer_mode: TransferMode,
    /// Derived: the currently active TLS auth identifier, for burst
    /// value-change detection.
    pub active_auth: Option<String>,
}

/// Bitmask returned alongside a burst decision describing which derived
/// "active_*" fields changed (spec.md §4.5 step 7, §4.6 step 6).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ValuesChanged(u8);

impl ValuesChanged {
    /// The target directory changed (URL re-evaluated to a new path).
    pub const TARGET_DIR_CHANGED: Self = Self(1 << 0);
    /// The active user changed.
    pub const USER_CHANGED: Self = Self(1 << 1);
    /// The active transfer mode changed.
    pub const MODE_CHANGED: Self = Self(1 << 2);

    /// Empty change set.
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Returns `true` if `flag` is set.
    #[must_use]
    pub const fn has(self, flag: Self) -> bool {
        self.0 & flag.0 == flag.0
    }

    /// Returns the union of two change sets.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

impl JobDescriptor {
    /// Compares `self`'s active fields against a freshly-decoded
    /// descriptor for the *same* job/dir id and returns the
    /// [`ValuesChanged`] bitmask (spec.md §4.5 step 7, "Same id, path-may
    /// change").
    #[must_use]
    pub fn diff_active_fields(&self, fresh: &Self) -> ValuesChanged {
        let mut changed = ValuesChanged::empty();
        if self.active_target_dir != fresh.target.path {
            changed = changed.union(ValuesChanged::TARGET_DIR_CHANGED);
        }
        if self.active_user != fresh.target.user {
            changed = changed.union(ValuesChanged::USER_CHANGED);
        }
        if self.active_transfer_mode != fresh.transfer_mode {
            changed = changed.union(ValuesChanged::MODE_CHANGED);
        }
        changed
    }

    /// Whether a fresh descriptor can reuse the current connection: port,
    /// TLS auth, and (for SFTP) user must match (spec.md §4.5 step 7, "New
    /// id" branch).
    #[must_use]
    pub fn connection_reusable_for(&self, fresh: &Self) -> bool {
        if self.target.port != fresh.target.port {
            return false;
        }
        if self.active_auth != fresh.active_auth {
            return false;
        }
        if self.target.protocol == "sftp" && self.active_user != fresh.target.user {
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(path: &str, port: Option<u16>, user: &str) -> JobDescriptor {
        JobDescriptor {
            kind: JobKind::Fetch,
            target: Target {
                protocol: "sftp".into(),
                port,
                user: user.into(),
                password: String::new(),
                path: path.into(),
            },
            transfer_mode: TransferMode::Binary,
            mode_flag: ModeFlag::Passive,
            block_size: 65536,
            rate_limit: 0,
            archive_time: 0,
            archive_dir: None,
            rename_rule: None,
            age_limit: None,
            dupcheck: None,
            tls_auth: None,
            retry_count: 0,
            job_id: None,
            dir_id: Some(1),
            active_target_dir: path.into(),
            active_user: user.into(),
            active_transfer_mode: TransferMode::Binary,
            active_auth: None,
        }
    }

    #[test]
    fn diff_active_fields_detects_target_dir_change() {
        let current = descriptor("/incoming", Some(22), "bob");
        let fresh = descriptor("/incoming/new", Some(22), "bob");
        let changed = current.diff_active_fields(&fresh);
        assert!(changed.has(ValuesChanged::TARGET_DIR_CHANGED));
        assert!(!changed.has(ValuesChanged::USER_CHANGED));
    }

    #[test]
    fn connection_not_reusable_when_port_differs() {
        let current = descriptor("/incoming", Some(22), "bob");
        let fresh = descriptor("/incoming", Some(2222), "bob");
        assert!(!current.connection_reusable_for(&fresh));
    }

    #[test]
    fn sftp_connection_not_reusable_when_user_differs() {
        let current = descriptor("/incoming", Some(22), "bob");
        let fresh = descriptor("/incoming", Some(22), "alice");
        assert!(!current.connection_reusable_for(&fresh));
    }

    #[test]
    fn connection_reusable_when_nothing_relevant_changed() {
        let current = descriptor("/incoming", Some(22), "bob");
        let fresh = descriptor("/incoming/sub", Some(22), "bob");
        assert!(current.connection_reusable_for(&fresh));
    }
}
