//! Content-fingerprint duplicate-send suppression (spec.md §4.4).

mod cache;
mod flags;

pub use cache::{crc_id, DupCache};
pub use flags::DupCheckFlags;
