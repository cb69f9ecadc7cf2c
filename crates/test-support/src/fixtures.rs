//! Tempfile-backed builders for the on-disk state
//! [`afd_ssa::SsaSegment`]/[`afd_retrieve_list::RetrieveList`] own, so
//! integration tests don't each re-derive the attach/size boilerplate.

use afd_retrieve_list::RetrieveList;
use afd_ssa::SsaSegment;
use tempfile::TempDir;

/// A freshly attached [`SsaSegment`] plus the [`TempDir`] backing it. The
/// directory is kept alive by the returned value; drop it last.
pub struct SsaFixture {
    /// Backing directory; dropping this removes the segment file.
    pub dir: TempDir,
    /// The attached segment, sized for `record_count` positions.
    pub segment: SsaSegment,
}

/// Attaches a fresh SSA segment sized for `record_count` records at
/// epoch `1` in a new temporary directory.
///
/// # Panics
/// Panics if the temp directory or segment cannot be created; this is test
/// fixture code, not a production path.
#[must_use]
pub fn ssa_fixture(record_count: usize) -> SsaFixture {
    let dir = tempfile::tempdir().expect("create temp dir for ssa fixture");
    let segment =
        SsaSegment::attach(dir.path().join("ssa.dat"), record_count, 1).expect("attach ssa segment");
    SsaFixture { dir, segment }
}

/// A freshly attached [`RetrieveList`] plus the [`TempDir`] backing it.
pub struct RetrieveListFixture {
    /// Backing directory; dropping this removes the list file.
    pub dir: TempDir,
    /// The attached, empty Retrieve List.
    pub list: RetrieveList,
}

/// Attaches a fresh, empty Retrieve List in a new temporary directory.
///
/// # Panics
/// Panics if the temp directory or list file cannot be created; this is
/// test fixture code, not a production path.
#[must_use]
pub fn retrieve_list_fixture() -> RetrieveListFixture {
    let dir = tempfile::tempdir().expect("create temp dir for retrieve list fixture");
    let list = RetrieveList::attach(dir.path().join("rl.dat")).expect("attach retrieve list");
    RetrieveListFixture { dir, list }
}
