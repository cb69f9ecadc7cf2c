//! Burst/keep-alive decision logic (spec.md §4.5 steps 1-8).

use std::path::Path;
use std::time::Duration;

use afd_model::{HandlerState, HandshakeState, JobDescriptor, JobStatus, ValuesChanged, WorkerError};
use tracing::debug;

use crate::fin_fifo;
use crate::signal_waiter::SignalWaiter;

/// What the worker should do after a burst negotiation round.
#[derive(Debug, PartialEq, Eq)]
pub enum BurstOutcome {
    /// Same job id and target path: continue on the current connection.
    Burst,
    /// Same job id, target path (or other active field) changed: continue
    /// on the current connection after applying the change.
    BurstWithRebind(ValuesChanged),
    /// A new job arrived that cannot reuse this connection (port, TLS
    /// auth, or SFTP user differs).
    Neither,
    /// No job arrived; the scheduler still wants the connection held
    /// open (spec.md §4.6).
    KeepAlive,
    /// No job arrived and keep-alive is disabled: exit.
    Idle,
}

/// Loads a fresh [`JobDescriptor`] from the scheduler-written handshake
/// payload (a send message-file reference or a fetch URL), depending on
/// which worker kind is negotiating.
pub trait JobDescriptorLoader {
    /// Decodes `payload` (the bytes the scheduler wrote into
    /// `unique_name[0..2]`) into a fresh descriptor.
    ///
    /// # Errors
    /// Returns [`WorkerError::Alloc`] if the payload cannot be resolved to
    /// a job descriptor.
    fn load(&self, payload: &[u8]) -> Result<JobDescriptor, WorkerError>;
}

/// Drives the fin-fifo / `unique_name` handshake for one worker slot
/// (spec.md §4.5).
pub struct BurstCoordinator<'a> {
    fin_fifo_path: &'a Path,
}

impl<'a> BurstCoordinator<'a> {
    /// Creates a coordinator writing to `fin_fifo_path` on hand-off
    /// requests.
    #[must_use]
    pub fn new(fin_fifo_path: &'a Path) -> Self {
        Self { fin_fifo_path }
    }

    /// Runs one negotiation round for `slot`, blocking on `waiter` for up
    /// to `wait` for the scheduler's response.
    ///
    /// `current` is the job descriptor the connection is presently bound
    /// to; `keep_connected` is the host's configured keep-alive duration
    /// (zero disables keep-alive).
    ///
    /// # Errors
    /// Returns [`WorkerError::Alloc`] if the fin-fifo write or the signal
    /// wait fails outright (step 2's "write error → exit").
    pub fn negotiate(
        &self,
        slot: &mut JobStatus,
        current: &JobDescriptor,
        loader: &dyn JobDescriptorLoader,
        waiter: &mut dyn SignalWaiter,
        wait: Duration,
        keep_connected: Duration,
    ) -> Result<BurstOutcome, WorkerError> {
        // Step 1: arm the handshake register.
        slot.handshake = HandshakeState::ArmedWaiting;
        slot.handler_state = HandlerState::Ready;

        // Step 2: announce readiness; a write failure is fatal to this round.
        let pid = std::process::id() as i32;
        if let Err(e) = fin_fifo::write_ready(self.fin_fifo_path, pid) {
            slot.handshake = HandshakeState::Idle;
            slot.handler_state = HandlerState::Uninitialized;
            return Err(e);
        }

        // Step 3: wait for SIGUSR1 (hand-off) or SIGALRM (timeout).
        waiter.arm(wait)?;
        let got_handoff = waiter.wait(slot)?;

        // Step 4-5: cancel the alarm, mark no-more-signals-wanted.
        waiter.disarm();
        slot.handler_state = HandlerState::Released;

        // Step 7: inspect what the scheduler left in the handshake register.
        let outcome = match std::mem::take(&mut slot.handshake) {
            HandshakeState::NewJob(payload) => {
                let fresh = loader.load(&payload)?;
                self.classify_new_job(current, &fresh)
            }
            HandshakeState::TerminateBurst => BurstOutcome::Neither,
            _ if got_handoff => {
                debug!("SIGUSR1 received but handshake register carried no job; declining");
                BurstOutcome::Idle
            }
            _ => {
                // Step 8: no job arrived; fall into keep-alive if configured.
                if keep_connected > Duration::ZERO {
                    slot.handshake = HandshakeState::KeepAlive;
                    BurstOutcome::KeepAlive
                } else {
                    BurstOutcome::Idle
                }
            }
        };
        Ok(outcome)
    }

    fn classify_new_job(&self, current: &JobDescriptor, fresh: &JobDescriptor) -> BurstOutcome {
        let same_job = current.job_id == fresh.job_id && current.dir_id == fresh.dir_id;
        if same_job {
            let changed = current.diff_active_fields(fresh);
            if changed == ValuesChanged::empty() {
                BurstOutcome::Burst
            } else {
                BurstOutcome::BurstWithRebind(changed)
            }
        } else if current.connection_reusable_for(fresh) {
            let changed = current.diff_active_fields(fresh);
            BurstOutcome::BurstWithRebind(changed)
        } else {
            BurstOutcome::Neither
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal_waiter::ScriptedSignalWaiter;
    use afd_model::{JobKind, ModeFlag, Target, TransferMode};
    use std::ffi::CString;

    fn make_fifo() -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fin.fifo");
        let c_path = CString::new(path.to_str().unwrap()).unwrap();
        assert_eq!(unsafe { libc::mkfifo(c_path.as_ptr(), 0o600) }, 0);
        (dir, path)
    }

    fn descriptor(job_id: Option<u32>, dir_id: Option<u32>, path: &str, port: Option<u16>, user: &str) -> JobDescriptor {
        JobDescriptor {
            kind: JobKind::Fetch,
            target: Target { protocol: "sftp".into(), port, user: user.into(), password: String::new(), path: path.into() },
            transfer_mode: TransferMode::Binary,
            mode_flag: ModeFlag::Passive,
            block_size: 65536,
            rate_limit: 0,
            archive_time: 0,
            archive_dir: None,
            rename_rule: None,
            age_limit: None,
            dupcheck: None,
            tls_auth: None,
            retry_count: 0,
            job_id,
            dir_id,
            active_target_dir: path.into(),
            active_user: user.into(),
            active_transfer_mode: TransferMode::Binary,
            active_auth: None,
        }
    }

    struct FixedLoader(JobDescriptor);
    impl JobDescriptorLoader for FixedLoader {
        fn load(&self, _payload: &[u8]) -> Result<JobDescriptor, WorkerError> {
            Ok(self.0.clone())
        }
    }

    fn drain_fifo(path: std::path::PathBuf) -> std::thread::JoinHandle<()> {
        std::thread::spawn(move || {
            use std::io::Read;
            let mut fifo = std::fs::File::open(path).unwrap();
            let mut buf = [0u8; 4];
            let _ = fifo.read_exact(&mut buf);
        })
    }

    #[test]
    fn no_handoff_with_keep_connected_enters_keep_alive() {
        let (_dir, fifo_path) = make_fifo();
        let reader = drain_fifo(fifo_path.clone());
        let coordinator = BurstCoordinator::new(&fifo_path);
        let mut slot = JobStatus::default();
        let current = descriptor(Some(1), None, "/incoming", Some(22), "bob");
        let loader = FixedLoader(current.clone());
        let mut waiter = ScriptedSignalWaiter::new(vec![false]);

        let outcome = coordinator
            .negotiate(&mut slot, &current, &loader, &mut waiter, Duration::from_secs(2), Duration::from_secs(30))
            .unwrap();
        reader.join().unwrap();
        assert_eq!(outcome, BurstOutcome::KeepAlive);
        assert_eq!(slot.handshake, HandshakeState::KeepAlive);
    }

    #[test]
    fn no_handoff_without_keep_connected_is_idle() {
        let (_dir, fifo_path) = make_fifo();
        let reader = drain_fifo(fifo_path.clone());
        let coordinator = BurstCoordinator::new(&fifo_path);
        let mut slot = JobStatus::default();
        let current = descriptor(Some(1), None, "/incoming", Some(22), "bob");
        let loader = FixedLoader(current.clone());
        let mut waiter = ScriptedSignalWaiter::new(vec![false]);

        let outcome = coordinator
            .negotiate(&mut slot, &current, &loader, &mut waiter, Duration::from_secs(2), Duration::ZERO)
            .unwrap();
        reader.join().unwrap();
        assert_eq!(outcome, BurstOutcome::Idle);
    }

    #[test]
    fn same_id_same_path_is_a_plain_burst() {
        let (_dir, fifo_path) = make_fifo();
        let reader = drain_fifo(fifo_path.clone());
        let coordinator = BurstCoordinator::new(&fifo_path);
        let mut slot = JobStatus::default();
        let current = descriptor(Some(1), None, "/incoming", Some(22), "bob");
        let loader = FixedLoader(descriptor(Some(1), None, "/incoming", Some(22), "bob"));
        let mut waiter =
            ScriptedSignalWaiter::with_handshake(vec![(true, HandshakeState::NewJob(vec![1, 2, 3]))]);

        let outcome = coordinator
            .negotiate(&mut slot, &current, &loader, &mut waiter, Duration::from_secs(2), Duration::from_secs(30))
            .unwrap();
        reader.join().unwrap();
        assert_eq!(outcome, BurstOutcome::Burst);
    }

    #[test]
    fn same_id_changed_path_bursts_with_rebind() {
        let (_dir, fifo_path) = make_fifo();
        let reader = drain_fifo(fifo_path.clone());
        let coordinator = BurstCoordinator::new(&fifo_path);
        let mut slot = JobStatus::default();
        let current = descriptor(Some(1), None, "/incoming", Some(22), "bob");
        let loader = FixedLoader(descriptor(Some(1), None, "/incoming/new", Some(22), "bob"));
        let mut waiter = ScriptedSignalWaiter::with_handshake(vec![(true, HandshakeState::NewJob(vec![1]))]);

        let outcome = coordinator
            .negotiate(&mut slot, &current, &loader, &mut waiter, Duration::from_secs(2), Duration::from_secs(30))
            .unwrap();
        reader.join().unwrap();
        match outcome {
            BurstOutcome::BurstWithRebind(changed) => {
                assert!(changed.has(ValuesChanged::TARGET_DIR_CHANGED));
            }
            other => panic!("expected BurstWithRebind, got {other:?}"),
        }
    }

    #[test]
    fn new_id_with_different_port_cannot_reuse_connection() {
        let (_dir, fifo_path) = make_fifo();
        let reader = drain_fifo(fifo_path.clone());
        let coordinator = BurstCoordinator::new(&fifo_path);
        let mut slot = JobStatus::default();
        let current = descriptor(Some(1), None, "/incoming", Some(22), "bob");
        let loader = FixedLoader(descriptor(Some(2), None, "/other", Some(2222), "bob"));
        let mut waiter = ScriptedSignalWaiter::with_handshake(vec![(true, HandshakeState::NewJob(vec![9]))]);

        let outcome = coordinator
            .negotiate(&mut slot, &current, &loader, &mut waiter, Duration::from_secs(2), Duration::from_secs(30))
            .unwrap();
        reader.join().unwrap();
        assert_eq!(outcome, BurstOutcome::Neither);
    }

    #[test]
    fn scheduler_signalled_terminate_burst() {
        let (_dir, fifo_path) = make_fifo();
        let reader = drain_fifo(fifo_path.clone());
        let coordinator = BurstCoordinator::new(&fifo_path);
        let mut slot = JobStatus::default();
        let current = descriptor(Some(1), None, "/incoming", Some(22), "bob");
        let loader = FixedLoader(current.clone());
        let mut waiter = ScriptedSignalWaiter::with_handshake(vec![(true, HandshakeState::TerminateBurst)]);

        let outcome = coordinator
            .negotiate(&mut slot, &current, &loader, &mut waiter, Duration::from_secs(2), Duration::from_secs(30))
            .unwrap();
        reader.join().unwrap();
        assert_eq!(outcome, BurstOutcome::Neither);
    }
}
