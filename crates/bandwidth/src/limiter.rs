use std::cell::RefCell;
use std::num::NonZeroU64;
use std::time::{Duration, Instant};

const MICROS_PER_SECOND: u128 = 1_000_000;
const MINIMUM_SLEEP_MICROS: u128 = 100_000;
const MIN_WRITE_MAX: usize = 512;

fn recommended_chunk(limit: NonZeroU64) -> usize {
    let kib = (limit.get() / 1024).max(1);
    let chunk = u128::from(kib).saturating_mul(128).min(usize::MAX as u128);
    (chunk as usize).max(MIN_WRITE_MAX)
}

/// Token-bucket limiter bounding a single worker process to a configured
/// bytes/sec rate (spec.md §3 `transfer_rate_limit`, §4.7 step 5e).
#[derive(Debug)]
pub struct RateLimiter {
    limit_bytes_per_sec: NonZeroU64,
    chunk_size: usize,
    total_written: u128,
    started_at: Option<Instant>,
}

impl RateLimiter {
    /// Constructs a limiter bounding writes to `limit_bytes_per_sec`.
    #[must_use]
    pub fn new(limit_bytes_per_sec: NonZeroU64) -> Self {
        Self {
            limit_bytes_per_sec,
            chunk_size: recommended_chunk(limit_bytes_per_sec),
            total_written: 0,
            started_at: None,
        }
    }

    /// Replaces the configured rate, resetting accumulated debt (spec.md §5:
    /// the supervisor recomputes per-process caps when active-transfer
    /// counts change, and pushes the new cap down the TRL-calc fifo).
    pub fn update_limit(&mut self, limit_bytes_per_sec: NonZeroU64) {
        self.limit_bytes_per_sec = limit_bytes_per_sec;
        self.chunk_size = recommended_chunk(limit_bytes_per_sec);
        self.total_written = 0;
        self.started_at = None;
    }

    /// The block size this limiter recommends reading/writing at once, so
    /// pacing sleeps don't happen more often than necessary.
    #[must_use]
    pub const fn recommended_chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Records that `bytes` were just transferred and sleeps long enough to
    /// keep the running average at or below the configured rate.
    pub fn register(&mut self, bytes: usize) {
        let now = Instant::now();
        let started_at = *self.started_at.get_or_insert(now);
        self.total_written = self.total_written.saturating_add(bytes as u128);

        let elapsed_us = now.duration_since(started_at).as_micros().max(1);
        let expected_us = self
            .total_written
            .saturating_mul(MICROS_PER_SECOND)
            / u128::from(self.limit_bytes_per_sec.get());

        if expected_us > elapsed_us {
            let sleep_us = expected_us - elapsed_us;
            if sleep_us >= MINIMUM_SLEEP_MICROS {
                sleep_for(Duration::from_micros(sleep_us.min(u64::MAX as u128) as u64));
            }
        }
    }

    /// Drops accumulated debt without changing the configured rate.
    pub fn reset(&mut self) {
        self.total_written = 0;
        self.started_at = None;
    }
}

#[cfg(any(test, feature = "test-support"))]
thread_local! {
    static RECORDED_SLEEPS: RefCell<Option<Vec<Duration>>> = const { RefCell::new(None) };
}

#[cfg(any(test, feature = "test-support"))]
fn sleep_for(duration: Duration) {
    let recorded = RECORDED_SLEEPS.with(|cell| {
        let mut cell = cell.borrow_mut();
        if let Some(sleeps) = cell.as_mut() {
            sleeps.push(duration);
            true
        } else {
            false
        }
    });
    if !recorded {
        std::thread::sleep(duration);
    }
}

#[cfg(not(any(test, feature = "test-support")))]
fn sleep_for(duration: Duration) {
    std::thread::sleep(duration);
}

/// A recording of every sleep the limiter would have performed during a
/// `test-support` session, instead of actually sleeping.
#[cfg(any(test, feature = "test-support"))]
#[derive(Debug)]
pub struct RecordedSleepSession;

#[cfg(any(test, feature = "test-support"))]
impl RecordedSleepSession {
    /// Returns the sleeps recorded so far and clears the log.
    #[must_use]
    pub fn take(&self) -> Vec<Duration> {
        RECORDED_SLEEPS.with(|cell| cell.borrow_mut().as_mut().map(std::mem::take).unwrap_or_default())
    }
}

#[cfg(any(test, feature = "test-support"))]
impl Drop for RecordedSleepSession {
    fn drop(&mut self) {
        RECORDED_SLEEPS.with(|cell| *cell.borrow_mut() = None);
    }
}

/// Starts recording sleeps on the current thread for the lifetime of the
/// returned guard, so tests can assert on pacing without actually waiting.
#[cfg(any(test, feature = "test-support"))]
#[must_use]
pub fn recorded_sleep_session() -> RecordedSleepSession {
    RECORDED_SLEEPS.with(|cell| *cell.borrow_mut() = Some(Vec::new()));
    RecordedSleepSession
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_without_limit_pressure_does_not_sleep() {
        let _session = recorded_sleep_session();
        let limit = NonZeroU64::new(10 * 1024 * 1024).unwrap();
        let mut limiter = RateLimiter::new(limit);
        limiter.register(1024);
        assert!(_session.take().is_empty());
    }

    #[test]
    fn register_over_limit_eventually_sleeps() {
        let session = recorded_sleep_session();
        let limit = NonZeroU64::new(1024).unwrap();
        let mut limiter = RateLimiter::new(limit);
        // Simulate bursting well past the 1 KiB/s budget.
        for _ in 0..50 {
            limiter.register(limiter.recommended_chunk_size());
        }
        assert!(!session.take().is_empty());
    }

    #[test]
    fn update_limit_resets_debt() {
        let limit = NonZeroU64::new(1024).unwrap();
        let mut limiter = RateLimiter::new(limit);
        limiter.total_written = 10_000;
        limiter.update_limit(NonZeroU64::new(4096).unwrap());
        assert_eq!(limiter.total_written, 0);
    }

    #[test]
    fn recommended_chunk_has_a_floor() {
        let limit = NonZeroU64::new(1).unwrap();
        let limiter = RateLimiter::new(limit);
        assert!(limiter.recommended_chunk_size() >= MIN_WRITE_MAX);
    }
}
