//! The supervisor's own upward signal to the scheduler above it, sent once
//! a [`crate::WorkerOutcome`] is in hand (spec.md §4.8 step 5, §6
//! "Fifos" — same packed-record style as `SF_BURST_ACK_FIFO`).

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use crate::error::SupervisorError;
use crate::handle::WorkerOutcome;

const RECORD_LEN: usize = 8 + 8 + 4 + 1;

/// The fixed-size record written to the upward proc-fin fifo once a worker
/// has exited and its outcome has been decoded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProcFinRecord {
    /// The job id, or `-1` if this was a fetch job.
    pub job_id: i64,
    /// The directory id, or `-1` if this was a send job.
    pub dir_id: i64,
    /// The raw exit code the worker returned.
    pub exit_code: i32,
    /// Whether the scheduler should spawn a replacement immediately.
    pub respawn: bool,
}

impl From<&WorkerOutcome> for ProcFinRecord {
    fn from(outcome: &WorkerOutcome) -> Self {
        Self {
            job_id: outcome.job_id.map_or(-1, i64::from),
            dir_id: outcome.dir_id.map_or(-1, i64::from),
            exit_code: outcome.raw_status.code().unwrap_or(-1),
            respawn: outcome.respawn,
        }
    }
}

impl ProcFinRecord {
    fn to_bytes(self) -> [u8; RECORD_LEN] {
        let mut bytes = [0u8; RECORD_LEN];
        bytes[0..8].copy_from_slice(&self.job_id.to_le_bytes());
        bytes[8..16].copy_from_slice(&self.dir_id.to_le_bytes());
        bytes[16..20].copy_from_slice(&self.exit_code.to_le_bytes());
        bytes[20] = u8::from(self.respawn);
        bytes
    }
}

/// Writes `outcome` to `fifo_path` as a [`ProcFinRecord`], the message sent
/// upward once a worker's termination has been collected.
///
/// # Errors
/// Returns [`SupervisorError::ProcFin`] if the fifo cannot be opened or
/// written.
pub fn proc_fin(fifo_path: &Path, outcome: &WorkerOutcome) -> Result<(), SupervisorError> {
    let record = ProcFinRecord::from(outcome);
    let mut fifo = OpenOptions::new()
        .write(true)
        .open(fifo_path)
        .map_err(|source| SupervisorError::ProcFin { path: fifo_path.to_path_buf(), source })?;
    fifo.write_all(&record.to_bytes())
        .map_err(|source| SupervisorError::ProcFin { path: fifo_path.to_path_buf(), source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;
    use std::io::Read;
    use std::process::Command;

    fn make_fifo(path: &Path) {
        let c_path = CString::new(path.to_str().unwrap()).unwrap();
        assert_eq!(unsafe { libc::mkfifo(c_path.as_ptr(), 0o600) }, 0);
    }

    #[test]
    fn proc_fin_round_trips_the_outcome_fields() {
        let dir = tempfile::tempdir().unwrap();
        let fifo_path = dir.path().join("sup.fifo");
        make_fifo(&fifo_path);

        let reader_path = fifo_path.clone();
        let reader = std::thread::spawn(move || {
            let mut fifo = std::fs::File::open(&reader_path).unwrap();
            let mut buf = [0u8; RECORD_LEN];
            fifo.read_exact(&mut buf).unwrap();
            buf
        });

        let child = Command::new("/bin/sh").arg("-c").arg("exit 1").spawn().unwrap();
        let raw_status = child.wait_with_output().unwrap().status;
        let outcome = WorkerOutcome {
            job_id: Some(42),
            dir_id: None,
            exit_code: afd_model::ExitCode::from_i32(raw_status.code().unwrap()),
            raw_status,
            respawn: true,
        };

        proc_fin(&fifo_path, &outcome).unwrap();

        let bytes = reader.join().unwrap();
        assert_eq!(i64::from_le_bytes(bytes[0..8].try_into().unwrap()), 42);
        assert_eq!(i64::from_le_bytes(bytes[8..16].try_into().unwrap()), -1);
        assert_eq!(i32::from_le_bytes(bytes[16..20].try_into().unwrap()), 1);
        assert_eq!(bytes[20], 1);
    }
}
