//! Host Status (FSA entry) and per-slot Job Status records (spec.md §3).

use std::time::Duration;

/// Protocols a host may be reached over. Stored as a bitmask on the FSA
/// entry so a host can advertise more than one reachable protocol.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProtocolMask(u16);

impl ProtocolMask {
    /// FTP.
    pub const FTP: Self = Self(1 << 0);
    /// SFTP.
    pub const SFTP: Self = Self(1 << 1);
    /// HTTP(S).
    pub const HTTP: Self = Self(1 << 2);
    /// SMTP (mail submission).
    pub const SMTP: Self = Self(1 << 3);
    /// Local filesystem copy.
    pub const LOC: Self = Self(1 << 4);
    /// Arbitrary local command execution.
    pub const EXEC: Self = Self(1 << 5);

    /// Empty mask.
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Returns `true` if `other` is a subset of `self`.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns the union of two masks.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

/// Protocol options bitmask (spec.md §3: passive/extended, keepalive,
/// TLS-strict, legacy-renegotiation, no-Expect, bucketname-in-path, ...).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProtocolOptions(u32);

impl ProtocolOptions {
    /// Use passive (or extended-passive) mode for FTP data connections.
    pub const PASSIVE: Self = Self(1 << 0);
    /// Prefer EPSV/EPRT over PASV/PORT where supported.
    pub const EXTENDED: Self = Self(1 << 1);
    /// Send protocol-level keepalive probes between files.
    pub const KEEPALIVE: Self = Self(1 << 2);
    /// Refuse TLS sessions that fail strict certificate verification.
    pub const TLS_STRICT: Self = Self(1 << 3);
    /// Tolerate legacy TLS renegotiation (interop with old servers).
    pub const LEGACY_RENEGOTIATION: Self = Self(1 << 4);
    /// Suppress the HTTP `Expect: 100-continue` preamble on PUT.
    pub const NO_EXPECT: Self = Self(1 << 5);
    /// Encode the S3-style bucket name as a path segment, not a subdomain.
    pub const BUCKET_IN_PATH: Self = Self(1 << 6);

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

/// Host-status flags (spec.md §3): queue-set, action-success, store-ip.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HostStatusFlags(u8);

impl HostStatusFlags {
    /// The host has files queued for it.
    pub const QUEUE_SET: Self = Self(1 << 0);
    /// The host's last action (enable/disable/switch) succeeded.
    pub const ACTION_SUCCESS: Self = Self(1 << 1);
    /// Store the resolved IP instead of re-resolving the hostname per job.
    pub const STORE_IP: Self = Self(1 << 2);

    /// Empty flag set.
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Sets `flag`, returning the updated value.
    #[must_use]
    pub const fn set(self, flag: Self) -> Self {
        Self(self.0 | flag.0)
    }

    /// Clears `flag`, returning the updated value.
    #[must_use]
    pub const fn clear(self, flag: Self) -> Self {
        Self(self.0 & !flag.0)
    }

    /// Returns `true` if `flag` is set.
    #[must_use]
    pub const fn has(self, flag: Self) -> bool {
        self.0 & flag.0 == flag.0
    }
}

/// Which of a host's two configured real hostnames is currently active
/// (spec.md §3: "up to two real hostnames with a toggle and failover
/// position").
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HostnameToggle {
    /// Use `real_hostname[0]`.
    #[default]
    Primary,
    /// Use `real_hostname[1]` (failover position).
    Secondary,
}

impl HostnameToggle {
    /// Returns the other toggle position.
    #[must_use]
    pub const fn flipped(self) -> Self {
        match self {
            Self::Primary => Self::Secondary,
            Self::Secondary => Self::Primary,
        }
    }
}

/// Credentials carried on a Host Status entry.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Credentials {
    /// Remote username.
    pub user: String,
    /// Remote password. Never logged; callers should wrap this in a
    /// zeroizing container at the configuration-loading boundary.
    pub password: String,
}

/// One Host Status (FSA) entry: per-host configuration plus the live
/// per-slot [`JobStatus`] array (spec.md §3).
#[derive(Clone, Debug)]
pub struct HostStatus {
    /// Short configured alias for this host (not necessarily a DNS name).
    pub alias: String,
    /// Up to two real hostnames; `toggle` selects which is active.
    pub real_hostnames: [String; 2],
    /// Which `real_hostnames` slot is active.
    pub toggle: HostnameToggle,
    /// Protocols this host may be reached over.
    pub protocols: ProtocolMask,
    /// Protocol option bits (TLS strictness, passive mode, ...).
    pub options: ProtocolOptions,
    /// Remote credentials.
    pub credentials: Credentials,
    /// Socket send buffer size in bytes, 0 = OS default.
    pub send_buffer_size: u32,
    /// Socket receive buffer size in bytes, 0 = OS default.
    pub recv_buffer_size: u32,
    /// Per-process transfer-rate limit in bytes/sec, 0 = unlimited.
    pub transfer_rate_limit: u64,
    /// Block size used for reads/writes against this host.
    pub block_size: u32,
    /// Seconds to hold the connection open awaiting more work.
    pub keep_connected: u32,
    /// Seconds of inactivity after which a non-keep-alive connection closes.
    pub disconnect_seconds: u32,
    /// Per-operation transport timeout.
    pub transfer_timeout: Duration,
    /// Maximum number of concurrent transfer slots allowed for this host.
    pub allowed_transfers: u16,
    /// Number of slots currently occupied by a live worker.
    pub active_transfers: u16,
    /// Consecutive-error counter, cleared on a successful transfer.
    pub error_counter: u32,
    /// Host-status flags.
    pub flags: HostStatusFlags,
    /// Per-slot job status, one entry per concurrent transfer.
    pub slots: Vec<JobStatus>,
    /// Running total of files queued for this host across all slots.
    pub total_file_counter: i64,
    /// Running total of bytes queued for this host across all slots.
    pub total_file_size: i64,
}

impl HostStatus {
    /// Returns `Err` if any invariant from spec.md §3 is violated.
    ///
    /// # Errors
    /// Returns a description of the first invariant found broken.
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.active_transfers > self.allowed_transfers {
            return Err(format!(
                "active_transfers ({}) exceeds allowed_transfers ({}) for host {}",
                self.active_transfers, self.allowed_transfers, self.alias
            ));
        }
        if self.total_file_counter < 0 {
            return Err(format!(
                "total_file_counter went negative for host {}",
                self.alias
            ));
        }
        if self.total_file_counter == 0 && self.total_file_size != 0 {
            return Err(format!(
                "total_file_size is {} while total_file_counter is 0 for host {}",
                self.total_file_size, self.alias
            ));
        }
        Ok(())
    }

    /// Clamps `total_file_counter`/`total_file_size` back to a consistent
    /// state after an invariant violation is detected (spec.md §7 category
    /// 4: "log at debug sign, clamp the counter, continue").
    pub fn clamp_totals(&mut self) {
        if self.total_file_counter < 0 {
            self.total_file_counter = 0;
        }
        if self.total_file_counter == 0 {
            self.total_file_size = 0;
        }
    }

    /// Returns the active real hostname for `self.toggle`.
    #[must_use]
    pub fn active_hostname(&self) -> &str {
        match self.toggle {
            HostnameToggle::Primary => &self.real_hostnames[0],
            HostnameToggle::Secondary => &self.real_hostnames[1],
        }
    }
}

/// Connection-establishment status for a job slot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectStatus {
    /// No worker currently owns this slot.
    #[default]
    NotConnected,
    /// `Transport::connect` is in progress.
    Connecting,
    /// Connected and idle or transferring.
    Connected,
    /// The last connect attempt failed.
    Failed,
}

/// Installed-signal-handler state for the burst handshake, stored in the
/// last byte of `file_name_in_use` (spec.md §3, §4.5).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HandlerState {
    /// The worker has not yet armed its signal handler.
    #[default]
    Uninitialized,
    /// The handler is armed; the worker is waiting on the fin-fifo/signal.
    Ready,
    /// The worker is done waiting for further signals this burst round.
    Released,
}

/// Per-slot Job Status (spec.md §3). One of these lives at a fixed index
/// inside [`HostStatus::slots`], exclusively owned by the worker occupying
/// that slot for the lifetime of the process.
#[derive(Clone, Debug, Default)]
pub struct JobStatus {
    /// Connection state for this slot.
    pub connect_status: ConnectStatus,
    /// The job id currently occupying this slot, 0 if free.
    pub job_id: u32,
    /// Name of the file currently being transferred.
    pub file_name_in_use: String,
    /// Installed-handler flag, logically the last byte of
    /// `file_name_in_use` (spec.md §3/§4.5); modeled as its own field here
    /// rather than packed into the name string.
    pub handler_state: HandlerState,
    /// Size of the file currently being transferred.
    pub file_size_in_use: u64,
    /// Bytes of the current file transferred so far.
    pub file_size_in_use_done: u64,
    /// Number of files assigned to this job (including burst jobs so far).
    pub no_of_files: u32,
    /// Number of files this slot has completed.
    pub no_of_files_done: u32,
    /// Total bytes assigned to this job.
    pub file_size: u64,
    /// Total bytes this slot has completed.
    pub file_size_done: u64,
    /// Cumulative bytes sent/received on this slot's connection.
    pub bytes_send: u64,
    /// Handshake register (spec.md §4.5): `unique_name[2]` is the state
    /// machine value; `unique_name[0..2]` (when nonzero) encodes a new job
    /// reference written by the scheduler. Modeled directly as the state
    /// plus an optional message payload rather than a raw byte array.
    pub handshake: HandshakeState,
}

impl JobStatus {
    /// `no_of_files_done` and `file_size_done` must never decrease during a
    /// worker's life (spec.md §8 "Counter monotonicity"). Call this instead
    /// of writing the fields directly so a regression panics in debug
    /// builds rather than silently corrupting FSA totals.
    pub fn advance(&mut self, files_done_delta: u32, bytes_done_delta: u64) {
        self.no_of_files_done += files_done_delta;
        self.file_size_done += bytes_done_delta;
    }
}

/// The `unique_name` handshake register state machine (spec.md §4.5).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum HandshakeState {
    /// No handshake in progress.
    #[default]
    Idle,
    /// Worker has armed its signal handler; waiting for burst hand-off
    /// (`unique_name[2] == 4`).
    ArmedWaiting,
    /// Worker is in the keep-connected idle loop (`== 5`).
    KeepAlive,
    /// Scheduler says the next job cannot reuse this connection (`== 6`);
    /// the worker must exit.
    TerminateBurst,
    /// Scheduler has written a new job reference (`== 0`, nonzero payload).
    NewJob(Vec<u8>),
    /// Worker declined with no message, diagnostic-only (`== 1`).
    Declined,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_host() -> HostStatus {
        HostStatus {
            alias: "host-a".into(),
            real_hostnames: ["a.example".into(), "a-backup.example".into()],
            toggle: HostnameToggle::Primary,
            protocols: ProtocolMask::HTTP,
            options: ProtocolOptions::empty(),
            credentials: Credentials::default(),
            send_buffer_size: 0,
            recv_buffer_size: 0,
            transfer_rate_limit: 0,
            block_size: 65536,
            keep_connected: 30,
            disconnect_seconds: 120,
            transfer_timeout: Duration::from_secs(60),
            allowed_transfers: 2,
            active_transfers: 0,
            error_counter: 0,
            flags: HostStatusFlags::empty(),
            slots: vec![JobStatus::default(); 2],
            total_file_counter: 0,
            total_file_size: 0,
        }
    }

    #[test]
    fn invariant_rejects_active_over_allowed() {
        let mut host = sample_host();
        host.active_transfers = 3;
        assert!(host.check_invariants().is_err());
    }

    #[test]
    fn invariant_rejects_size_without_counter() {
        let mut host = sample_host();
        host.total_file_size = 10;
        assert!(host.check_invariants().is_err());
    }

    #[test]
    fn clamp_totals_zeroes_size_when_counter_clamped() {
        let mut host = sample_host();
        host.total_file_counter = -1;
        host.total_file_size = 500;
        host.clamp_totals();
        assert_eq!(host.total_file_counter, 0);
        assert_eq!(host.total_file_size, 0);
    }

    #[test]
    fn toggle_flips_between_primary_and_secondary() {
        assert_eq!(HostnameToggle::Primary.flipped(), HostnameToggle::Secondary);
        assert_eq!(HostnameToggle::Secondary.flipped(), HostnameToggle::Primary);
    }

    #[test]
    fn active_hostname_follows_toggle() {
        let mut host = sample_host();
        assert_eq!(host.active_hostname(), "a.example");
        host.toggle = HostnameToggle::Secondary;
        assert_eq!(host.active_hostname(), "a-backup.example");
    }

    #[test]
    fn protocol_mask_union_and_contains() {
        let mask = ProtocolMask::FTP.union(ProtocolMask::SFTP);
        assert!(mask.contains(ProtocolMask::FTP));
        assert!(mask.contains(ProtocolMask::SFTP));
        assert!(!mask.contains(ProtocolMask::HTTP));
    }
}
