use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};

use crate::flags::DupCheckFlags;

/// Computes the `crc_id` a fingerprint is keyed on: a CRC-32 of the file
/// name and size (spec.md §4.4).
#[must_use]
pub fn crc_id(name: &str, size: u64) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(name.as_bytes());
    hasher.update(&size.to_le_bytes());
    hasher.finalize()
}

struct Fingerprint {
    expires_at: Instant,
    content_hash: Option<[u8; 32]>,
}

/// A process-local duplicate-send cache (spec.md §4.4). Keyed on
/// [`crc_id`], each entry expires after its configured TTL.
#[derive(Default)]
pub struct DupCache {
    entries: HashMap<u32, Fingerprint>,
}

impl DupCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn hash_file(path: &Path) -> io::Result<[u8; 32]> {
        let contents = fs::read(path)?;
        let mut hasher = Sha256::new();
        hasher.update(&contents);
        Ok(hasher.finalize().into())
    }

    /// Checks whether `(name, size)` — optionally strengthened by a content
    /// hash of `fullname` when [`DupCheckFlags::CONTENT_HASH`] is set — is a
    /// duplicate of something already seen within its TTL.
    ///
    /// A miss records the fingerprint so a subsequent identical send within
    /// `ttl` is suppressed.
    ///
    /// # Errors
    /// Returns an I/O error if `CONTENT_HASH` is requested and `fullname`
    /// cannot be read.
    pub fn isdup(
        &mut self,
        now: Instant,
        fullname: &Path,
        name: &str,
        size: u64,
        ttl: Duration,
        flags: DupCheckFlags,
    ) -> io::Result<bool> {
        let id = crc_id(name, size);
        let content_hash = if flags.has(DupCheckFlags::CONTENT_HASH) {
            Some(Self::hash_file(fullname)?)
        } else {
            None
        };

        let is_dup = match self.entries.get(&id) {
            Some(existing) if existing.expires_at > now => existing.content_hash == content_hash,
            _ => false,
        };

        if !is_dup {
            self.entries.insert(
                id,
                Fingerprint {
                    expires_at: now + ttl,
                    content_hash,
                },
            );
        }

        Ok(is_dup)
    }

    /// On a duplicate hit with [`DupCheckFlags::DC_DELETE`] set, unlinks the
    /// source file and drops its cache entry so the space is reclaimed
    /// immediately (spec.md §4.4).
    ///
    /// # Errors
    /// Returns an I/O error if the file cannot be removed.
    pub fn handle_dupcheck_delete(
        &mut self,
        fullname: &Path,
        name: &str,
        size: u64,
    ) -> io::Result<()> {
        fs::remove_file(fullname)?;
        self.entries.remove(&crc_id(name, size));
        Ok(())
    }

    /// Removes a cache entry after a failed send, so a retry is not
    /// falsely suppressed as a duplicate (spec.md §4.4 "Design rationale").
    pub fn rm_dupcheck_crc(&mut self, name: &str, size: u64) {
        self.entries.remove(&crc_id(name, size));
    }

    /// Number of live (not necessarily unexpired) fingerprints held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` if no fingerprints are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(contents: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents).unwrap();
        file
    }

    #[test]
    fn first_send_is_not_a_duplicate() {
        let mut cache = DupCache::new();
        let file = write_temp(b"hello");
        let now = Instant::now();
        let is_dup = cache
            .isdup(now, file.path(), "a.dat", 5, Duration::from_secs(60), DupCheckFlags::empty())
            .unwrap();
        assert!(!is_dup);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn repeated_send_within_ttl_is_a_duplicate() {
        let mut cache = DupCache::new();
        let file = write_temp(b"hello");
        let now = Instant::now();
        cache
            .isdup(now, file.path(), "a.dat", 5, Duration::from_secs(60), DupCheckFlags::empty())
            .unwrap();
        let is_dup = cache
            .isdup(now, file.path(), "a.dat", 5, Duration::from_secs(60), DupCheckFlags::empty())
            .unwrap();
        assert!(is_dup);
    }

    #[test]
    fn expired_ttl_allows_resend() {
        let mut cache = DupCache::new();
        let file = write_temp(b"hello");
        let now = Instant::now();
        cache
            .isdup(now, file.path(), "a.dat", 5, Duration::from_secs(10), DupCheckFlags::empty())
            .unwrap();
        let later = now + Duration::from_secs(11);
        let is_dup = cache
            .isdup(later, file.path(), "a.dat", 5, Duration::from_secs(10), DupCheckFlags::empty())
            .unwrap();
        assert!(!is_dup);
    }

    #[test]
    fn content_hash_strengthens_against_crc_collisions() {
        let mut cache = DupCache::new();
        let first = write_temp(b"hello");
        let now = Instant::now();
        cache
            .isdup(now, first.path(), "a.dat", 5, Duration::from_secs(60), DupCheckFlags::CONTENT_HASH)
            .unwrap();

        let second = write_temp(b"world");
        let is_dup = cache
            .isdup(now, second.path(), "a.dat", 5, Duration::from_secs(60), DupCheckFlags::CONTENT_HASH)
            .unwrap();
        assert!(!is_dup);
    }

    #[test]
    fn rm_dupcheck_crc_clears_entry_so_retry_is_not_suppressed() {
        let mut cache = DupCache::new();
        let file = write_temp(b"hello");
        let now = Instant::now();
        cache
            .isdup(now, file.path(), "a.dat", 5, Duration::from_secs(60), DupCheckFlags::empty())
            .unwrap();
        cache.rm_dupcheck_crc("a.dat", 5);
        assert!(cache.is_empty());
    }

    #[test]
    fn handle_dupcheck_delete_removes_file_and_entry() {
        let mut cache = DupCache::new();
        let file = write_temp(b"hello");
        let now = Instant::now();
        cache
            .isdup(now, file.path(), "a.dat", 5, Duration::from_secs(60), DupCheckFlags::empty())
            .unwrap();
        cache
            .handle_dupcheck_delete(file.path(), "a.dat", 5)
            .unwrap();
        assert!(!file.path().exists());
        assert!(cache.is_empty());
    }
}
