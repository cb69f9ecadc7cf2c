//! The Shared Status Area: memory-mapped, versioned state for hosts and
//! directories, with region locks and a stale/rotation discipline (spec.md
//! §4.2).

mod counters;
mod error;
mod header;
mod segment;

pub use counters::{CounterRecord, RECORD_LEN};
pub use error::SsaError;
pub use header::{
    FEATURE_DISABLE_RETRIEVE, FEATURE_ENABLE_CREATE_TARGET_DIR, HEADER_LEN, STALE_EPOCH,
};
pub use segment::{SegmentState, SsaSegment, REREADING_WAIT_BOUND};
