//! Thin outer-process supervision for AFD transfer workers (spec.md §2
//! table: "thin adapter: start worker with job descriptor, collect
//! termination, send proc-fin upward").
//!
//! This crate is deliberately narrow: it spawns one child process per job
//! (spec.md §5 "Process-per-job"), waits for it to exit, and reports the
//! outcome. The scheduler that decides *which* job to run next, and the
//! burst handshake that happens *inside* a running worker, are out of
//! scope here — see `afd-burst` and `afd-worker`.

mod error;
mod handle;
mod proc_fin;
mod spawn;

pub use error::SupervisorError;
pub use handle::{WorkerHandle, WorkerOutcome};
pub use proc_fin::{proc_fin, ProcFinRecord};
pub use spawn::{spawn_worker, WorkerBinaries, WorkerInvocation};
