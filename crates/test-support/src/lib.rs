//! Shared test fixtures for the AFD transfer-execution crates: a
//! scriptable in-memory [`afd_transport::Transport`] and tempfile-backed
//! SSA/Retrieve List builders, so integration tests in the bin crates
//! don't re-derive what each crate's unit tests already hand-rolled.

mod fake_transport;
mod fixtures;

pub use fake_transport::ScriptedTransport;
pub use fixtures::{retrieve_list_fixture, ssa_fixture, RetrieveListFixture, SsaFixture};
