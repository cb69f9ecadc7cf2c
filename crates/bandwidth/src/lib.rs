#![deny(missing_docs)]

//! Per-process transfer-rate limiting.
//!
//! spec.md §3 gives every Host Status entry a `transfer_rate_limit` in
//! bytes/sec and a block size; spec.md §4.7 requires the fetch/send worker
//! to apply that limit per block while downloading or uploading; spec.md §5
//! describes total-host bandwidth as cooperatively adjusted through the
//! TRL-calc fifo whenever active-transfer counts change. This crate owns the
//! token-bucket pacing algorithm; the fifo plumbing itself lives in
//! `afd-worker`.

mod limiter;
mod parse;

pub use limiter::RateLimiter;
#[cfg(any(test, feature = "test-support"))]
pub use limiter::{recorded_sleep_session, RecordedSleepSession};
pub use parse::{parse_rate_argument, RateParseError};
