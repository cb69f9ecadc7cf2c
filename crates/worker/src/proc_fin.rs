//! Upward signalling to the supervisor: `SF_BURST_ACK_FIFO` and the
//! proc-fin hint (spec.md §4.7 step 3, §4.8 step 5, §6 "Fifos").

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use afd_model::WorkerError;

const RECORD_LEN: usize = 8 * 4;

/// The packed record written to `SF_BURST_ACK_FIFO` to acknowledge a
/// completed burst (spec.md §6).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BurstAckRecord {
    /// Unix timestamp the burst started at.
    pub creation_time: i64,
    /// The job id this acknowledgement concerns.
    pub job_id: u32,
    /// How many burst hand-offs this worker accepted on the job's
    /// connection, including the initial job (spec.md §8 scenario 2's
    /// `burst_2_counter`).
    pub split_job_counter: u32,
    /// Scheduler-assigned correlation number for this burst round.
    pub unique_number: u32,
    /// The directory id this acknowledgement concerns (fetch jobs only).
    pub dir_no: u32,
}

impl BurstAckRecord {
    fn to_bytes(self) -> [u8; RECORD_LEN] {
        let mut bytes = [0u8; RECORD_LEN];
        bytes[0..8].copy_from_slice(&self.creation_time.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.job_id.to_le_bytes());
        bytes[12..16].copy_from_slice(&self.split_job_counter.to_le_bytes());
        bytes[16..20].copy_from_slice(&self.unique_number.to_le_bytes());
        bytes[20..24].copy_from_slice(&self.dir_no.to_le_bytes());
        bytes
    }
}

/// Writes `record` to `fifo_path` as a single fixed-size datagram.
///
/// # Errors
/// Returns [`WorkerError::Alloc`] if the fifo cannot be opened or written.
pub fn write_burst_ack(fifo_path: &Path, record: BurstAckRecord) -> Result<(), WorkerError> {
    let mut fifo = OpenOptions::new().write(true).open(fifo_path).map_err(|e| {
        WorkerError::Alloc(format!("opening burst-ack fifo {}: {e}", fifo_path.display()))
    })?;
    fifo.write_all(&record.to_bytes())
        .map_err(|e| WorkerError::Alloc(format!("writing burst-ack record: {e}")))
}

/// Sends the "proc-fin" hint upward: `true` asks the supervisor to spawn a
/// helper worker for the remainder of a large, parallelisable listing
/// (spec.md §4.7 step 3); `false` is the ordinary step-5 "no more work"
/// signal on exit (spec.md §4.8 step 5).
///
/// # Errors
/// Returns [`WorkerError::Alloc`] if the fifo cannot be opened or written.
pub fn send_proc_fin(fifo_path: &Path, want_helper: bool) -> Result<(), WorkerError> {
    let mut fifo = OpenOptions::new().write(true).open(fifo_path).map_err(|e| {
        WorkerError::Alloc(format!("opening proc-fin fifo {}: {e}", fifo_path.display()))
    })?;
    fifo.write_all(&[u8::from(want_helper)])
        .map_err(|e| WorkerError::Alloc(format!("writing proc-fin byte: {e}")))
}

/// Pushes an updated host position into `TRL_CALC_FIFO` so the supervisor
/// can recompute per-process rate caps (spec.md §4.6 step 5, §5 "Resource
/// policy").
///
/// # Errors
/// Returns [`WorkerError::Alloc`] if the fifo cannot be opened or written.
pub fn push_trl_position(fifo_path: &Path, position: i32) -> Result<(), WorkerError> {
    let mut fifo = OpenOptions::new().write(true).open(fifo_path).map_err(|e| {
        WorkerError::Alloc(format!("opening trl-calc fifo {}: {e}", fifo_path.display()))
    })?;
    fifo.write_all(&position.to_le_bytes())
        .map_err(|e| WorkerError::Alloc(format!("writing trl-calc position: {e}")))
}
