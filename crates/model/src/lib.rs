//! Shared data model for the AFD transfer-execution core.
//!
//! This crate has no I/O of its own. It defines the record shapes that
//! `afd-ssa`, `afd-retrieve-list`, `afd-transport`, `afd-burst` and
//! `afd-worker` all read and write: the Host Status / Job Status pair that
//! lives in the Filetransfer Status Area, the Directory Status that lives
//! in the Fileretrieve Status Area, Retrieve List entries, the per-process
//! Job Descriptor, worker exit codes/errors, and the event-log wire
//! contract.

mod directory;
mod error;
mod event;
mod exit_code;
mod host;
mod job;
mod retrieve;

pub use directory::{DirectoryStatus, FraOptions, TimeEntry};
pub use error::WorkerError;
pub use event::{EventAction, EventClass, EventRecord, EventType, FIELD_SEPARATOR};
pub use exit_code::ExitCode;
pub use host::{
    ConnectStatus, Credentials, HandlerState, HandshakeState, HostStatus, HostStatusFlags,
    HostnameToggle, JobStatus, ProtocolMask, ProtocolOptions,
};
pub use job::{JobDescriptor, JobKind, ModeFlag, Target, TransferMode, ValuesChanged};
pub use retrieve::RetrieveEntry;
