//! The running child process and the outcome its exit reports upward.

use std::process::{Child, ExitStatus};

use afd_model::ExitCode;

use crate::error::SupervisorError;

/// A spawned worker process, owned for its lifetime by the job that
/// started it (spec.md §5 "Process-per-job").
pub struct WorkerHandle {
    child: Child,
    job_id: Option<u32>,
    dir_id: Option<u32>,
}

/// What a finished worker reported, translated back through
/// [`afd_model::ExitCode`].
#[derive(Debug)]
pub struct WorkerOutcome {
    /// The job id this worker ran, if it was a send job.
    pub job_id: Option<u32>,
    /// The directory id this worker ran, if it was a fetch job.
    pub dir_id: Option<u32>,
    /// The decoded exit code, or `None` if the process died by signal or
    /// returned a value outside the enumeration (spec.md §7 has no
    /// category for this; treat as a crash, not a clean exit).
    pub exit_code: Option<ExitCode>,
    /// The raw OS exit status, kept for logging.
    pub raw_status: ExitStatus,
    /// `true` if the worker left more files to move and should be
    /// respawned immediately rather than going through backoff. A burst
    /// hand-off already happened inside the worker process itself; this
    /// flag is purely bookkeeping for the next process-per-job spawn.
    pub respawn: bool,
}

impl WorkerHandle {
    pub(crate) fn new(child: Child, job_id: Option<u32>, dir_id: Option<u32>) -> Self {
        Self { child, job_id, dir_id }
    }

    /// This worker's OS process id.
    #[must_use]
    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    /// Blocks until the worker process exits and reports its outcome.
    ///
    /// # Errors
    /// Returns [`SupervisorError::Wait`] if the OS `wait` call itself
    /// fails; a worker that crashed or was killed is still a successful
    /// `wait` with `exit_code: None`, not an `Err`.
    pub fn wait(mut self) -> Result<WorkerOutcome, SupervisorError> {
        let raw_status = self.child.wait().map_err(SupervisorError::Wait)?;
        let exit_code = raw_status.code().and_then(ExitCode::from_i32);
        let respawn = matches!(exit_code, Some(ExitCode::StillFilesToSend));

        if exit_code.is_none() {
            tracing::warn!(
                job_id = ?self.job_id,
                dir_id = ?self.dir_id,
                status = ?raw_status,
                "worker process exited without a recognised exit code"
            );
        }

        Ok(WorkerOutcome { job_id: self.job_id, dir_id: self.dir_id, exit_code, raw_status, respawn })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;

    fn spawn_sh(code: i32) -> WorkerHandle {
        let child = Command::new("/bin/sh")
            .arg("-c")
            .arg(format!("exit {code}"))
            .spawn()
            .unwrap();
        WorkerHandle::new(child, Some(9), None)
    }

    #[test]
    fn decodes_a_recognised_exit_code() {
        let outcome = spawn_sh(0).wait().unwrap();
        assert_eq!(outcome.exit_code, Some(ExitCode::TransferSuccess));
        assert_eq!(outcome.job_id, Some(9));
        assert!(!outcome.respawn);
    }

    #[test]
    fn still_files_to_send_asks_for_an_immediate_respawn() {
        let outcome = spawn_sh(1).wait().unwrap();
        assert_eq!(outcome.exit_code, Some(ExitCode::StillFilesToSend));
        assert!(outcome.respawn);
    }

    #[test]
    fn an_unrecognised_exit_status_decodes_to_none_without_erroring() {
        let outcome = spawn_sh(139).wait().unwrap();
        assert_eq!(outcome.exit_code, None);
        assert!(!outcome.respawn);
    }
}
