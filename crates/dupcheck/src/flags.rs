/// Duplicate-check option bits (spec.md §4.4 "per flags").
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DupCheckFlags(u8);

impl DupCheckFlags {
    /// Strengthen the `(name, size)` fingerprint with a content hash,
    /// guarding against a `crc_id` collision between two different files.
    pub const CONTENT_HASH: Self = Self(1 << 0);
    /// On a duplicate hit, unlink the source file after suppressing the
    /// send (spec.md §8 scenario 6: "if `DC_DELETE` set the source is
    /// unlinked").
    pub const DC_DELETE: Self = Self(1 << 1);

    /// Empty flag set.
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Returns `true` if `flag` is set.
    #[must_use]
    pub const fn has(self, flag: Self) -> bool {
        self.0 & flag.0 == flag.0
    }

    /// Returns the union of two flag sets.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_and_has() {
        let flags = DupCheckFlags::CONTENT_HASH.union(DupCheckFlags::DC_DELETE);
        assert!(flags.has(DupCheckFlags::CONTENT_HASH));
        assert!(flags.has(DupCheckFlags::DC_DELETE));
    }
}
