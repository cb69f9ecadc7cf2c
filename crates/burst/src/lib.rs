//! Burst/keep-alive handshake coordinator (spec.md §4.5).

mod coordinator;
mod fin_fifo;
mod signal_waiter;

pub use coordinator::{BurstCoordinator, BurstOutcome, JobDescriptorLoader};
pub use signal_waiter::{PosixSignalWaiter, ScriptedSignalWaiter, SignalWaiter};
