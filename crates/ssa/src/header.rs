//! The 8-byte segment header (spec.md §3 "Shared Lifecycle", §6 "Persisted
//! state layout" — the `AFD_WORD_OFFSET` header implementers must preserve).

/// Length in bytes of the segment header.
pub const HEADER_LEN: usize = 8;

/// Epoch value meaning "this mapping has been rebuilt and is no longer
/// valid"; a worker observing this must unmap and re-attach.
pub const STALE_EPOCH: u32 = u32::MAX;

/// Feature-flag bit: retrieval is administratively disabled for this
/// segment (spec.md §6).
pub const FEATURE_DISABLE_RETRIEVE: u8 = 1 << 0;
/// Feature-flag bit: workers may create missing target directories rather
/// than treat a missing directory as an error (spec.md §6).
pub const FEATURE_ENABLE_CREATE_TARGET_DIR: u8 = 1 << 1;

const EPOCH_RANGE: std::ops::Range<usize> = 0..4;
const FEATURE_FLAGS_OFFSET: usize = 4;
const REREADING_OFFSET: usize = 5;

/// A view over the header bytes of a mapped segment.
///
/// Layout (little-endian): `epoch: u32` at offset 0, `feature_flags: u8` at
/// offset 4, `rereading: u8` at offset 5, two reserved bytes at 6-7. The
/// body (record array) layout beyond this header is implementation-defined
/// (spec.md §6: "implementer-defined provided access discipline holds").
pub struct Header<'a> {
    bytes: &'a mut [u8; HEADER_LEN],
}

impl<'a> Header<'a> {
    /// Wraps the first [`HEADER_LEN`] bytes of a mapped segment.
    pub fn new(bytes: &'a mut [u8; HEADER_LEN]) -> Self {
        Self { bytes }
    }

    /// The current version epoch.
    #[must_use]
    pub fn epoch(&self) -> u32 {
        u32::from_le_bytes(self.bytes[EPOCH_RANGE].try_into().unwrap())
    }

    /// Sets the version epoch (called by the segment owner when rebuilding
    /// the layout; bumping this invalidates every other attached mapping).
    pub fn set_epoch(&mut self, epoch: u32) {
        self.bytes[EPOCH_RANGE].copy_from_slice(&epoch.to_le_bytes());
    }

    /// Marks the segment `STALE`, forcing every attached worker to remap.
    pub fn mark_stale(&mut self) {
        self.set_epoch(STALE_EPOCH);
    }

    /// The feature-flag byte (`DISABLE_RETRIEVE`, `ENABLE_CREATE_TARGET_DIR`).
    #[must_use]
    pub fn feature_flags(&self) -> u8 {
        self.bytes[FEATURE_FLAGS_OFFSET]
    }

    /// Replaces the feature-flag byte.
    pub fn set_feature_flags(&mut self, flags: u8) {
        self.bytes[FEATURE_FLAGS_OFFSET] = flags;
    }

    /// `true` while the supervisor is rereading configuration (spec.md
    /// §4.2): workers must release any intent-to-wait marker quickly so the
    /// supervisor's lock acquisition is not blocked.
    #[must_use]
    pub fn is_rereading(&self) -> bool {
        self.bytes[REREADING_OFFSET] != 0
    }

    /// Sets or clears the `REREADING` flag.
    pub fn set_rereading(&mut self, rereading: bool) {
        self.bytes[REREADING_OFFSET] = u8::from(rereading);
    }
}
