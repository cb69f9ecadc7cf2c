//! Event-log writer for the AFD transfer-execution core (spec.md §6,
//! SPEC_FULL.md §4.10).
//!
//! The 70-entry action enumeration and record shape live in `afd-model`
//! since other crates (notably `afd-worker`) need to construct
//! `EventRecord` values without depending on this crate's file-writing
//! concerns. This crate owns only the append-only sink.

mod writer;

pub use afd_model::{EventAction, EventClass, EventRecord, EventType, FIELD_SEPARATOR};
pub use writer::{EventLogError, EventLogWriter};
