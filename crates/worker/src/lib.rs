//! Fetch/send transfer worker loop for the AFD transfer-execution core
//! (spec.md §4.6-§4.8).
//!
//! One process owns exactly one [`afd_model::HostStatus`] slot for its
//! lifetime. The owning binary drives `afd-burst`'s handshake coordinator
//! to decide between a fresh job, a burst hand-off, or the keep-alive loop
//! in [`keepalive`]; [`fetch`]/[`send`] run one burst's transfer; every
//! exit path funnels through [`termination::terminate`].

mod fetch;
mod keepalive;
mod proc_fin;
mod send;
mod termination;

pub use fetch::{hostname_changed, FetchCycleOutcome, FetchWorker};
pub use keepalive::{FetchKeepAliveOutcome, KeepAliveClock, KeepAliveLoop, SystemClock};
pub use proc_fin::{push_trl_position, send_proc_fin, write_burst_ack, BurstAckRecord};
pub use send::{SendFile, SendOptions, SendOutcome, SendWorker};
pub use termination::{terminate, PendingRename, TerminationContext, TerminationSummary};
