//! Keep-alive loop: held open between bursts while `keep_connected > 0`
//! (spec.md §4.6).

use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use afd_eventlog::{EventAction, EventClass, EventLogWriter, EventRecord, EventType};
use afd_model::{DirectoryStatus, FraOptions, HandshakeState, JobStatus, WorkerError};
use afd_transport::Transport;

use crate::proc_fin::push_trl_position;

/// Supplies the current time and performs the inter-poll sleep. Production
/// code uses [`SystemClock`]; tests script a fixed sequence of advances so
/// the loop terminates deterministically without a real sleep.
pub trait KeepAliveClock {
    /// Current Unix timestamp, seconds.
    fn now(&self) -> i64;
    /// Sleeps for `duration`, then advances `now()` by at least that much.
    fn sleep(&mut self, duration: Duration);
}

/// The real-time clock used outside of tests.
#[derive(Default)]
pub struct SystemClock;

impl KeepAliveClock for SystemClock {
    fn now(&self) -> i64 {
        SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs() as i64
    }

    fn sleep(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Why a fetch keep-alive round ended.
#[derive(Debug, PartialEq, Eq)]
pub enum FetchKeepAliveOutcome {
    /// The scheduler declined further bursts on this connection; exit.
    Exit,
    /// `ONE_PROCESS_JUST_SCANNING` is set and no helper is scanning on our
    /// behalf; the caller must rescan the source directory itself.
    RescanSource,
    /// The directory URL re-evaluated to a different target directory.
    TargetDirChanged(String),
}

/// Shared fetch/send keep-alive state: the open connection and the
/// optional TRL-calculation fifo a rate-limited host pushes its queue
/// position into (spec.md §4.6 step 5).
pub struct KeepAliveLoop<'w> {
    /// The open protocol connection, probed with `noop()` each round.
    pub transport: &'w mut dyn Transport,
    /// `TRL_CALC_FIFO`-equivalent path, if this host is rate-limited.
    pub trl_fifo: Option<&'w Path>,
    /// Whether this host has an active transfer-rate limit (gates the
    /// `trl_fifo` push; spec.md §4.6 step 5 "if transfer-rate-limit is
    /// active").
    pub rate_limited: bool,
}

impl KeepAliveLoop<'_> {
    fn poll_connection(&mut self, slot: &JobStatus) -> Result<(), WorkerError> {
        if self.rate_limited {
            if let Some(fifo) = self.trl_fifo {
                push_trl_position(fifo, slot.job_id as i32)?;
            }
        }
        self.transport.noop()
    }

    /// Runs the fetch keep-alive loop (spec.md §4.6 fetch variant) until
    /// one of its exit conditions fires.
    ///
    /// `reevaluate_target_dir` re-resolves the directory URL to a target
    /// path; `active_target_dir` is updated in place when it changes.
    ///
    /// # Errors
    /// Returns [`WorkerError::Noop`] if the connection probe fails.
    #[allow(clippy::too_many_arguments)]
    pub fn run_fetch(
        &mut self,
        clock: &mut dyn KeepAliveClock,
        slot: &mut JobStatus,
        directory: &DirectoryStatus,
        start_time: i64,
        keep_connected: Duration,
        poll_interval: Duration,
        has_distributed_helper: bool,
        path_may_change: bool,
        active_target_dir: &mut String,
        reevaluate_target_dir: &dyn Fn() -> String,
    ) -> Result<FetchKeepAliveOutcome, WorkerError> {
        loop {
            let timeup = start_time + keep_connected.as_secs() as i64;
            let now = clock.now();
            let next_check = directory.next_check_after(now);
            if next_check > timeup {
                return Ok(FetchKeepAliveOutcome::Exit);
            }

            let remaining = (timeup - now).max(0) as u64;
            clock.sleep(poll_interval.min(Duration::from_secs(remaining)));

            if slot.handshake == HandshakeState::TerminateBurst {
                return Ok(FetchKeepAliveOutcome::Exit);
            }
            if directory.options.has(FraOptions::ONE_PROCESS_JUST_SCANNING) && !has_distributed_helper {
                return Ok(FetchKeepAliveOutcome::RescanSource);
            }

            if start_time < timeup {
                self.poll_connection(slot)?;
            }

            if path_may_change {
                let fresh = reevaluate_target_dir();
                if &fresh != active_target_dir {
                    *active_target_dir = fresh.clone();
                    return Ok(FetchKeepAliveOutcome::TargetDirChanged(fresh));
                }
            }
        }
    }

    /// Runs the send keep-alive loop (spec.md §4.6 send variant): same
    /// timeup/probe discipline as [`KeepAliveLoop::run_fetch`], minus the
    /// directory-schedule and target-dir concerns a send job has no FRA
    /// entry for, plus a one-time "burst/append" summary line.
    ///
    /// # Errors
    /// Returns [`WorkerError::Noop`] if the connection probe fails.
    pub fn run_send(
        &mut self,
        clock: &mut dyn KeepAliveClock,
        slot: &mut JobStatus,
        start_time: i64,
        keep_connected: Duration,
        poll_interval: Duration,
        event_log: &mut EventLogWriter,
        alias: &str,
    ) -> Result<(), WorkerError> {
        let mut summary_logged = false;
        loop {
            let timeup = start_time + keep_connected.as_secs() as i64;
            let now = clock.now();
            if now > timeup {
                return Ok(());
            }

            let remaining = (timeup - now).max(0) as u64;
            clock.sleep(poll_interval.min(Duration::from_secs(remaining)));

            if slot.handshake == HandshakeState::TerminateBurst {
                return Ok(());
            }

            if !summary_logged {
                let record = EventRecord {
                    timestamp: now.max(0) as u64,
                    class: EventClass::Host,
                    event_type: EventType::Auto,
                    action: EventAction::ProductionLog,
                    alias: Some(alias.to_string()),
                    fields: vec!["burst/append".to_string()],
                };
                if let Err(e) = event_log.record(&record) {
                    tracing::warn!("failed to append keep-alive summary record: {e}");
                }
                summary_logged = true;
            }

            if start_time < timeup {
                self.poll_connection(slot)?;
            }
        }
    }
}
