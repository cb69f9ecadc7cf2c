//! Blocks a worker on SIGALRM/SIGUSR1 the way spec.md §4.5 step 3 requires
//! (`alarm(wait_secs)` then `sigsuspend`), abstracted behind a trait so the
//! coordinator's decision logic can be tested without real signals.

use std::time::Duration;

use afd_model::{JobStatus, WorkerError};
use signal_hook::consts::{SIGALRM, SIGUSR1};
use signal_hook::iterator::Signals;

/// Waits for the scheduler's burst hand-off signal or a timeout.
pub trait SignalWaiter {
    /// Arms the wait-timeout alarm.
    fn arm(&mut self, wait: Duration) -> Result<(), WorkerError>;

    /// Blocks until SIGUSR1 (hand-off, returns `true`) or SIGALRM (timeout,
    /// returns `false`) arrives. `slot` is the worker's own status record;
    /// a real implementation never touches it (the scheduler mutates the
    /// shared segment backing it directly), but a test double uses it to
    /// simulate the scheduler's write landing just before wake-up.
    fn wait(&mut self, slot: &mut JobStatus) -> Result<bool, WorkerError>;

    /// Cancels a pending alarm.
    fn disarm(&mut self);
}

/// Real implementation: arms `alarm(2)` and blocks on a `signal-hook`
/// iterator registered for SIGALRM/SIGUSR1.
pub struct PosixSignalWaiter {
    signals: Signals,
}

impl PosixSignalWaiter {
    /// Registers the SIGALRM/SIGUSR1 handlers this waiter will block on.
    ///
    /// # Errors
    /// Returns [`WorkerError::Alloc`] if the signal handlers could not be
    /// installed.
    pub fn new() -> Result<Self, WorkerError> {
        let signals = Signals::new([SIGALRM, SIGUSR1])
            .map_err(|e| WorkerError::Alloc(format!("registering signal handlers: {e}")))?;
        Ok(Self { signals })
    }
}

impl SignalWaiter for PosixSignalWaiter {
    fn arm(&mut self, wait: Duration) -> Result<(), WorkerError> {
        // SAFETY: alarm() has no preconditions; it only schedules SIGALRM.
        unsafe {
            libc::alarm(u32::try_from(wait.as_secs()).unwrap_or(u32::MAX));
        }
        Ok(())
    }

    fn wait(&mut self, _slot: &mut JobStatus) -> Result<bool, WorkerError> {
        match self.signals.forever().next() {
            Some(sig) if sig == SIGUSR1 => Ok(true),
            Some(_) => Ok(false),
            None => Err(WorkerError::Alloc("signal stream ended unexpectedly".into())),
        }
    }

    fn disarm(&mut self) {
        // SAFETY: alarm() has no preconditions; 0 cancels any pending alarm.
        unsafe {
            libc::alarm(0);
        }
    }
}

/// Test double driven by a scripted sequence of outcomes, avoiding real
/// signal delivery in unit tests. Each scripted round optionally writes a
/// new handshake value into the worker's slot, simulating the scheduler's
/// write landing just before the signal arrives.
#[derive(Default)]
pub struct ScriptedSignalWaiter {
    rounds: std::collections::VecDeque<(bool, Option<afd_model::HandshakeState>)>,
}

impl ScriptedSignalWaiter {
    /// Creates a waiter that returns each of `outcomes` in order, one per
    /// call to [`SignalWaiter::wait`], writing no handshake value.
    #[must_use]
    pub fn new(outcomes: Vec<bool>) -> Self {
        Self { rounds: outcomes.into_iter().map(|o| (o, None)).collect() }
    }

    /// Creates a waiter whose rounds also write `handshake` into the slot
    /// at the moment `wait` returns.
    #[must_use]
    pub fn with_handshake(rounds: Vec<(bool, afd_model::HandshakeState)>) -> Self {
        Self { rounds: rounds.into_iter().map(|(o, h)| (o, Some(h))).collect() }
    }
}

impl SignalWaiter for ScriptedSignalWaiter {
    fn arm(&mut self, _wait: Duration) -> Result<(), WorkerError> {
        Ok(())
    }

    fn wait(&mut self, slot: &mut JobStatus) -> Result<bool, WorkerError> {
        let (outcome, handshake) = self
            .rounds
            .pop_front()
            .ok_or_else(|| WorkerError::Alloc("scripted signal waiter exhausted".into()))?;
        if let Some(handshake) = handshake {
            slot.handshake = handshake;
        }
        Ok(outcome)
    }

    fn disarm(&mut self) {}
}
