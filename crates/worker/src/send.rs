//! Send-worker transfer algorithm: symmetrical to the fetch algorithm
//! (spec.md §4.7's closing paragraph), with file-name-is-header framing,
//! an optional WMO sequence counter, and archive-or-unlink on completion.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use afd_bandwidth::RateLimiter;
use afd_dupcheck::{DupCache, DupCheckFlags};
use afd_eventlog::{EventAction, EventClass, EventLogWriter, EventRecord, EventType};
use afd_model::WorkerError;
use afd_ssa::SsaSegment;
use afd_transport::{PutResponse, Transport};

fn ssa_err(e: afd_ssa::SsaError) -> WorkerError {
    WorkerError::Alloc(e.to_string())
}

/// 2-byte type tag opening the 10-byte file-name-is-header indicator.
const HEADER_TAG: &[u8; 2] = b"FN";
/// 4-byte end-of-record marker appended after a file-name-is-header body.
const END_MARKER: [u8; 4] = [0xff, 0xff, 0xff, 0xff];

/// One local file a send worker has been assigned.
#[derive(Clone, Debug)]
pub struct SendFile {
    /// Path to the source file on local disk.
    pub local_path: PathBuf,
    /// Name to send the file under.
    pub remote_name: String,
    /// Size of `local_path` in bytes.
    pub size: u64,
}

/// Per-job send options (spec.md §4.7 closing paragraph, §4.4).
pub struct SendOptions<'a> {
    /// Remote directory to PUT into.
    pub remote_path: &'a str,
    /// Prepend the 10-byte indicator + header block and append the 4-byte
    /// end marker.
    pub file_name_is_header: bool,
    /// When `Some`, a 3-digit WMO bulletin sequence number is interleaved
    /// ahead of the header.
    pub wmo_sequence: Option<u32>,
    /// Archive root; `None` unlinks the source on completion instead.
    pub archive_dir: Option<&'a Path>,
    /// Unix timestamp used to compute the archive sub-directory.
    pub archive_time: i64,
    /// Duplicate-check TTL; `None` disables dupcheck for this job.
    pub dupcheck_ttl: Option<Duration>,
    /// Duplicate-check option bits.
    pub dupcheck_flags: DupCheckFlags,
    /// Per-file transfer-timeout.
    pub transfer_timeout: Duration,
    /// Whether this is the first file sent on the current connection
    /// (passed through to [`Transport::put`]'s `first_in_session`).
    pub first_in_session: bool,
}

/// Outcome of sending one file.
#[derive(Debug, PartialEq, Eq)]
pub enum SendOutcome {
    /// The file was transmitted and archived/unlinked.
    Sent {
        /// Bytes written to the wire, including any framing overhead.
        bytes: u64,
    },
    /// Duplicate-check suppressed the send (spec.md §8 scenario 6).
    Duplicate,
    /// The remote cycled the connection on `put_response`; the caller
    /// should treat the containing job as still-files-to-send rather than
    /// retry on this connection (spec.md §4.7 closing paragraph).
    Requeue,
}

fn build_framed_body(file_name: &str, contents: &[u8], wmo_sequence: Option<u32>) -> Vec<u8> {
    let mut body = Vec::with_capacity(contents.len() + file_name.len() + 16);
    if let Some(seq) = wmo_sequence {
        body.extend_from_slice(format!("{:03}\r\r\n", seq % 1000).as_bytes());
    }
    let header = file_name.as_bytes();
    body.extend_from_slice(HEADER_TAG);
    body.extend_from_slice(&(header.len() as u64).to_le_bytes());
    body.extend_from_slice(header);
    body.extend_from_slice(contents);
    body.extend_from_slice(&END_MARKER);
    body
}

fn archive_or_unlink(local_path: &Path, archive_dir: Option<&Path>, archive_time: i64) -> std::io::Result<()> {
    match archive_dir {
        Some(root) => {
            let sub = root.join(archive_time.to_string());
            fs::create_dir_all(&sub)?;
            let dest = sub.join(local_path.file_name().unwrap_or_default());
            if fs::hard_link(local_path, &dest).is_err() {
                fs::copy(local_path, &dest)?;
            }
            fs::remove_file(local_path)
        }
        None => fs::remove_file(local_path),
    }
}

/// Ties together the shared resources one send needs: the open connection,
/// this host's FSA totals slot, the rate limiter, the dupcheck cache, and
/// the event log.
pub struct SendWorker<'w> {
    /// The open protocol connection.
    pub transport: &'w mut dyn Transport,
    /// The Shared Status Area segment carrying this host's FSA totals.
    pub ssa: &'w mut SsaSegment,
    /// Index of this host's counter record within `ssa`.
    pub fsa_index: usize,
    /// Per-process transfer-rate limiter.
    pub rate_limiter: &'w mut RateLimiter,
    /// Process-local duplicate-send cache.
    pub dupcheck: &'w mut DupCache,
    /// The event/output log.
    pub event_log: &'w mut EventLogWriter,
}

impl<'w> SendWorker<'w> {
    fn adjust_totals(&mut self, files_delta: i64, bytes_delta: i64) -> Result<(), WorkerError> {
        self.ssa
            .with_tfc_lock(self.fsa_index, |record| {
                record.total_file_counter += files_delta;
                record.total_file_size += bytes_delta;
                record.clamp_totals();
            })
            .map_err(ssa_err)
    }

    fn record_production_log(&mut self, name: &str, size: u64, delivery_type: &str, transfer_time: Duration) {
        let record = EventRecord {
            timestamp: 0,
            class: EventClass::Production,
            event_type: EventType::Auto,
            action: EventAction::ProductionLog,
            alias: Some(name.to_string()),
            fields: vec![size.to_string(), delivery_type.to_string(), transfer_time.as_millis().to_string()],
        };
        if let Err(e) = self.event_log.record(&record) {
            tracing::warn!("failed to append send output-log record: {e}");
        }
    }

    /// Sends one file, applying dupcheck, framing, rate limiting, and the
    /// archive-or-unlink completion step.
    pub fn send_file(&mut self, file: &SendFile, options: &SendOptions<'_>, now: Instant) -> Result<SendOutcome, WorkerError> {
        self.adjust_totals(1, file.size as i64)?;

        if let Some(ttl) = options.dupcheck_ttl {
            let is_dup = self
                .dupcheck
                .isdup(now, &file.local_path, &file.remote_name, file.size, ttl, options.dupcheck_flags)
                .map_err(WorkerError::ReadLocal)?;
            if is_dup {
                if options.dupcheck_flags.has(DupCheckFlags::DC_DELETE) {
                    self.dupcheck
                        .handle_dupcheck_delete(&file.local_path, &file.remote_name, file.size)
                        .map_err(WorkerError::WriteLocal)?;
                }
                self.adjust_totals(-1, -(file.size as i64))?;
                self.record_production_log(&file.remote_name, file.size, "OT_NORMAL_DELIVERED", Duration::ZERO);
                return Ok(SendOutcome::Duplicate);
            }
        }

        let start = Instant::now();
        let contents = fs::read(&file.local_path).map_err(WorkerError::ReadLocal)?;
        let body = if options.file_name_is_header {
            build_framed_body(&file.remote_name, &contents, options.wmo_sequence)
        } else {
            contents
        };

        let put_result = (|| -> Result<PutResponse, WorkerError> {
            self.transport
                .put(options.remote_path, &file.remote_name, body.len() as u64, options.first_in_session)?;

            let chunk_size = self.rate_limiter.recommended_chunk_size();
            for chunk in body.chunks(chunk_size) {
                if start.elapsed() > options.transfer_timeout {
                    return Err(WorkerError::TransferTimeout(file.remote_name.clone()));
                }
                self.transport.write(chunk)?;
                self.rate_limiter.register(chunk.len());
            }
            self.transport.put_response()
        })();

        let response = match put_result {
            Ok(response) => response,
            Err(e) => {
                if let Some(ttl) = options.dupcheck_ttl {
                    let _ = ttl;
                    self.dupcheck.rm_dupcheck_crc(&file.remote_name, file.size);
                }
                return Err(e);
            }
        };

        self.adjust_totals(-1, -(file.size as i64))?;

        archive_or_unlink(&file.local_path, options.archive_dir, options.archive_time)
            .map_err(WorkerError::WriteLocal)?;

        self.record_production_log(&file.remote_name, body.len() as u64, "OT_NORMAL_DELIVERED", start.elapsed());

        if matches!(response, PutResponse::ConnectionReopened) {
            return Ok(SendOutcome::Requeue);
        }

        Ok(SendOutcome::Sent { bytes: body.len() as u64 })
    }
}
