//! Fetch-worker transfer algorithm (spec.md §4.7, HTTP-flavoured but
//! written against the protocol-agnostic [`Transport`] contract).

use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use afd_bandwidth::RateLimiter;
use afd_eventlog::{EventAction, EventClass, EventLogWriter, EventRecord, EventType};
use afd_model::{DirectoryStatus, FraOptions, WorkerError};
use afd_retrieve_list::{ListingRow, RetrieveList};
use afd_ssa::SsaSegment;
use afd_transport::{GetOutcome, ListOutcome, ListingEntry, Transport};

use crate::proc_fin::send_proc_fin;

/// Above this many eligible entries, a single worker asks the supervisor
/// for a helper (spec.md §4.7 step 3).
const HELPER_THRESHOLD: usize = 8;

/// `true` if the host this connection was opened against no longer
/// matches the currently configured real hostname (spec.md §4.7 step 1,
/// §4.6 step 4's equivalent check in the keep-alive loop).
#[must_use]
pub fn hostname_changed(bound_to: &str, active_now: &str) -> bool {
    bound_to != active_now
}

fn ssa_err(e: afd_ssa::SsaError) -> WorkerError {
    WorkerError::Alloc(e.to_string())
}

fn rl_err(e: afd_retrieve_list::RlError) -> WorkerError {
    WorkerError::Alloc(e.to_string())
}

/// Result of one fetch burst iteration (spec.md §4.7 steps 1-6).
#[derive(Debug, PartialEq, Eq)]
pub enum FetchCycleOutcome {
    /// Every eligible entry in the listing was processed.
    Done {
        /// Number of files fetched this cycle.
        files: u32,
        /// Bytes actually transferred this cycle.
        bytes: u64,
    },
    /// The bound hostname changed mid-cycle; the caller should exit
    /// cleanly with `TRANSFER_SUCCESS` (spec.md §7 category 5).
    HostnameChanged,
}

/// Ties together the shared resources one fetch-worker burst iteration
/// needs: the open connection, the directory's Retrieve List, its FSA
/// totals slot, the per-process rate limiter, and the event log.
pub struct FetchWorker<'w> {
    /// The open protocol connection.
    pub transport: &'w mut dyn Transport,
    /// This directory's Retrieve List.
    pub retrieve_list: &'w mut RetrieveList,
    /// The Shared Status Area segment carrying this host's FSA totals.
    pub ssa: &'w mut SsaSegment,
    /// Index of this host's counter record within `ssa`.
    pub fsa_index: usize,
    /// Per-process transfer-rate limiter.
    pub rate_limiter: &'w mut RateLimiter,
    /// The event/output log.
    pub event_log: &'w mut EventLogWriter,
    /// This worker's FSA slot number (1-based assignment owner id).
    pub slot: u32,
}

fn to_listing_rows(entries: Vec<ListingEntry>) -> Vec<ListingRow> {
    entries
        .into_iter()
        .map(|e| ListingRow {
            file_name: e.name,
            size: e.size,
            mtime: e.mtime,
            fingerprint: None,
        })
        .collect()
}

/// Replaces path delimiters in a remote name so it can be used as a local
/// file name without creating unintended sub-directories (spec.md §4.7
/// step 5b).
fn encode_local_name(remote_name: &str) -> String {
    remote_name.replace('/', "\\")
}

fn tmp_path(local_dir: &Path, remote_name: &str) -> PathBuf {
    local_dir.join(format!(".{}.afd-tmp", encode_local_name(remote_name)))
}

fn final_path(local_dir: &Path, remote_name: &str, slot: u32, counter: u32) -> PathBuf {
    let encoded = encode_local_name(remote_name);
    if encoded.is_empty() {
        local_dir.join(format!("NO_NAME.{slot}.{counter}"))
    } else {
        local_dir.join(encoded)
    }
}

impl<'w> FetchWorker<'w> {
    fn adjust_totals(&mut self, files_delta: i64, bytes_delta: i64) -> Result<(), WorkerError> {
        self.ssa
            .with_tfc_lock(self.fsa_index, |record| {
                record.total_file_counter += files_delta;
                record.total_file_size += bytes_delta;
                record.clamp_totals();
            })
            .map_err(ssa_err)
    }

    fn record_production_log(
        &mut self,
        name: &str,
        size: u64,
        retries: u32,
        transfer_time: Duration,
    ) {
        let record = EventRecord {
            timestamp: 0,
            class: EventClass::Production,
            event_type: EventType::Auto,
            action: EventAction::ProductionLog,
            alias: Some(name.to_string()),
            fields: vec![
                size.to_string(),
                retries.to_string(),
                transfer_time.as_millis().to_string(),
                "fetch".to_string(),
            ],
        };
        if let Err(e) = self.event_log.record(&record) {
            tracing::warn!("failed to append fetch output-log record: {e}");
        }
    }

    /// One fetch burst iteration over `remote_path` (spec.md §4.7 steps
    /// 1-6). `bound_hostname`/`active_hostname` implement step 1;
    /// `helper_fifo` is where the step-3 parallelisation hint is written.
    #[allow(clippy::too_many_arguments)]
    pub fn run_cycle(
        &mut self,
        directory: &DirectoryStatus,
        remote_path: &str,
        local_dir: &Path,
        transfer_timeout: Duration,
        resume_allowed: bool,
        helper_fifo: Option<&Path>,
        bound_hostname: &str,
        active_hostname: &str,
    ) -> Result<FetchCycleOutcome, WorkerError> {
        // Step 1.
        if hostname_changed(bound_hostname, active_hostname) {
            return Ok(FetchCycleOutcome::HostnameChanged);
        }

        // Step 2.
        let rows = if directory.options.has(FraOptions::DONT_GET_DIR_LIST) {
            vec![ListingRow {
                file_name: directory.alias.clone(),
                size: None,
                mtime: None,
                fingerprint: None,
            }]
        } else {
            match self.transport.list(remote_path)? {
                ListOutcome::Entries(entries) => to_listing_rows(entries),
                ListOutcome::Unsupported => Vec::new(),
            }
        };
        let stupid_mode = directory.options.has(FraOptions::STUPID_MODE);
        let plan = self.retrieve_list.scan(&rows, stupid_mode);

        // Step 3.
        if plan.to_fetch.len() > HELPER_THRESHOLD
            && !directory.options.has(FraOptions::DO_NOT_PARALLELIZE)
        {
            if let Some(fifo) = helper_fifo {
                send_proc_fin(fifo, true)?;
            }
        }

        if plan.to_fetch.is_empty() {
            return Ok(FetchCycleOutcome::Done { files: 0, bytes: 0 });
        }

        self.retrieve_list
            .assign(self.slot - 1, &plan.to_fetch)
            .map_err(rl_err)?;

        let reserved_bytes: i64 = plan
            .to_fetch
            .iter()
            .map(|&i| self.retrieve_list.entry(i).and_then(|e| e.size).unwrap_or(0) as i64)
            .sum();

        // Step 4.
        self.adjust_totals(plan.to_fetch.len() as i64, reserved_bytes)?;

        let remove_after_fetch = directory.options.has(FraOptions::REMOVE);
        let mut files_done = 0u32;
        let mut bytes_done = 0u64;

        // Step 5.
        for (counter, &index) in plan.to_fetch.iter().enumerate() {
            let entry = self
                .retrieve_list
                .entry(index)
                .expect("index came from this scan's own plan")
                .clone();
            let estimated_size = entry.size.unwrap_or(0) as i64;

            let start = Instant::now();
            let tmp = tmp_path(local_dir, &entry.file_name);
            let offset = if resume_allowed {
                tmp.metadata().map(|m| m.len()).unwrap_or(0)
            } else {
                0
            };

            match self.transport.get(remote_path, &entry.file_name, offset)? {
                GetOutcome::Terminal { code } => {
                    let _ = std::fs::remove_file(&tmp);
                    self.retrieve_list.mark_retrieved(index).map_err(rl_err)?;
                    if code == 404 {
                        self.retrieve_list
                            .remove_from_list(index)
                            .map_err(rl_err)?;
                    }
                    self.adjust_totals(-1, -estimated_size)?;
                    tracing::debug!(
                        "fetch of {} terminated with code {code}; entry marked retrieved",
                        entry.file_name
                    );
                }
                GetOutcome::NothingToFetch => {
                    self.retrieve_list.mark_retrieved(index).map_err(rl_err)?;
                    self.adjust_totals(-1, -estimated_size)?;
                }
                outcome @ (GetOutcome::Success { .. } | GetOutcome::Chunked) => {
                    let chunked = matches!(outcome, GetOutcome::Chunked);
                    let mut file = OpenOptions::new()
                        .create(true)
                        .write(true)
                        .append(offset > 0)
                        .truncate(offset == 0)
                        .open(&tmp)
                        .map_err(WorkerError::OpenLocal)?;

                    let chunk_size = self.rate_limiter.recommended_chunk_size();
                    let mut buf = vec![0u8; chunk_size];
                    let mut written = 0u64;
                    loop {
                        if start.elapsed() > transfer_timeout {
                            return Err(WorkerError::TransferTimeout(entry.file_name.clone()));
                        }
                        let n = if chunked {
                            self.transport.chunk_read(&mut buf)?
                        } else {
                            self.transport.read(&mut buf)?
                        };
                        if n == 0 {
                            break;
                        }
                        file.write_all(&buf[..n]).map_err(WorkerError::WriteLocal)?;
                        written += n as u64;
                        self.rate_limiter.register(n);
                    }
                    drop(file);

                    let dest = final_path(local_dir, &entry.file_name, self.slot, counter as u32);
                    std::fs::rename(&tmp, &dest).map_err(WorkerError::WriteLocal)?;
                    self.retrieve_list.mark_retrieved(index).map_err(rl_err)?;

                    if remove_after_fetch {
                        if let Err(e) = self.transport.delete(remote_path, &entry.file_name) {
                            if stupid_mode {
                                return Err(e);
                            }
                            tracing::warn!(
                                "failed to delete remote source {} after fetch: {e}",
                                entry.file_name
                            );
                        }
                    }

                    // Step h: release the reservation, then reconcile the
                    // residual difference between estimated and actual size.
                    self.adjust_totals(-1, -estimated_size)?;
                    let residual = written as i64 - estimated_size;
                    if residual != 0 {
                        self.adjust_totals(0, residual)?;
                    }

                    files_done += 1;
                    bytes_done += written;
                    self.record_production_log(&entry.file_name, written, 0, start.elapsed());
                }
            }
        }

        Ok(FetchCycleOutcome::Done {
            files: files_done,
            bytes: bytes_done,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use afd_transport::{ListOutcome, ListingEntry, PutResponse};
    use std::collections::VecDeque;

    struct FakeTransport {
        listing: Vec<ListingEntry>,
        bodies: std::collections::HashMap<String, Vec<u8>>,
        terminal: std::collections::HashMap<String, u32>,
        read_cursor: VecDeque<u8>,
        deleted: Vec<String>,
    }

    impl Transport for FakeTransport {
        fn connect(
            &mut self,
            _host: &str,
            _port: Option<u16>,
            _credentials: &afd_model::Credentials,
            _options: afd_model::ProtocolOptions,
        ) -> Result<(), WorkerError> {
            Ok(())
        }

        fn list(&mut self, _path: &str) -> Result<ListOutcome, WorkerError> {
            Ok(ListOutcome::Entries(self.listing.clone()))
        }

        fn get(&mut self, _path: &str, name: &str, offset: u64) -> Result<GetOutcome, WorkerError> {
            if let Some(&code) = self.terminal.get(name) {
                return Ok(GetOutcome::Terminal { code });
            }
            let body = self.bodies.get(name).cloned().unwrap_or_default();
            self.read_cursor = body[offset as usize..].iter().copied().collect();
            Ok(GetOutcome::Success {
                expected_size: self.read_cursor.len() as u64,
            })
        }

        fn read(&mut self, buf: &mut [u8]) -> Result<usize, WorkerError> {
            let mut n = 0;
            while n < buf.len() {
                match self.read_cursor.pop_front() {
                    Some(byte) => {
                        buf[n] = byte;
                        n += 1;
                    }
                    None => break,
                }
            }
            Ok(n)
        }

        fn put(
            &mut self,
            _path: &str,
            _name: &str,
            _size: u64,
            _first_in_session: bool,
        ) -> Result<(), WorkerError> {
            Ok(())
        }

        fn write(&mut self, _buf: &[u8]) -> Result<(), WorkerError> {
            Ok(())
        }

        fn put_response(&mut self) -> Result<PutResponse, WorkerError> {
            Ok(PutResponse::Accepted)
        }

        fn delete(&mut self, _path: &str, name: &str) -> Result<(), WorkerError> {
            self.deleted.push(name.to_string());
            Ok(())
        }

        fn noop(&mut self) -> Result<(), WorkerError> {
            Ok(())
        }

        fn quit(&mut self) {}
    }

    fn sample_directory() -> DirectoryStatus {
        DirectoryStatus {
            alias: "dir-a".into(),
            url: "http://h/p/".into(),
            check_interval: 60,
            next_check_time: 0,
            time_table: Vec::new(),
            options: FraOptions::empty(),
            error_counter: 0,
        }
    }

    fn env(dir: &tempfile::TempDir) -> (SsaSegment, RetrieveList, RateLimiter, EventLogWriter) {
        let ssa = SsaSegment::attach(dir.path().join("fsa.dat"), 1, 1).unwrap();
        let rl = RetrieveList::attach(dir.path().join("rl.dat")).unwrap();
        let limiter = RateLimiter::new(std::num::NonZeroU64::new(10 * 1024 * 1024).unwrap());
        let log = EventLogWriter::new(dir.path(), "event.log");
        (ssa, rl, limiter, log)
    }

    #[test]
    fn hostname_change_short_circuits_before_any_listing() {
        assert!(hostname_changed("a.example", "b.example"));
        assert!(!hostname_changed("a.example", "a.example"));
    }

    #[test]
    fn simple_fetch_downloads_every_listed_entry() {
        let dir = tempfile::tempdir().unwrap();
        let local = tempfile::tempdir().unwrap();
        let (mut ssa, mut rl, mut limiter, mut log) = env(&dir);

        let mut transport = FakeTransport {
            listing: vec![
                ListingEntry { name: "a".into(), size: Some(10), mtime: Some(1), extra: None },
                ListingEntry { name: "b".into(), size: Some(20), mtime: Some(2), extra: None },
            ],
            bodies: [("a".to_string(), vec![1u8; 10]), ("b".to_string(), vec![2u8; 20])]
                .into_iter()
                .collect(),
            terminal: Default::default(),
            read_cursor: VecDeque::new(),
            deleted: Vec::new(),
        };

        let mut worker = FetchWorker {
            transport: &mut transport,
            retrieve_list: &mut rl,
            ssa: &mut ssa,
            fsa_index: 0,
            rate_limiter: &mut limiter,
            event_log: &mut log,
            slot: 1,
        };

        let outcome = worker
            .run_cycle(
                &sample_directory(),
                "/p",
                local.path(),
                Duration::from_secs(30),
                true,
                None,
                "h",
                "h",
            )
            .unwrap();

        assert_eq!(outcome, FetchCycleOutcome::Done { files: 2, bytes: 30 });
        assert!(local.path().join("a").exists());
        assert!(local.path().join("b").exists());
        assert!(rl.entry(0).unwrap().retrieved);
        assert!(rl.entry(1).unwrap().retrieved);
        assert_eq!(ssa.read_record(0).unwrap().total_file_counter, 0);
        assert_eq!(ssa.read_record(0).unwrap().total_file_size, 0);
    }

    #[test]
    fn terminal_404_marks_retrieved_and_hides_from_future_scans() {
        let dir = tempfile::tempdir().unwrap();
        let local = tempfile::tempdir().unwrap();
        let (mut ssa, mut rl, mut limiter, mut log) = env(&dir);

        let mut transport = FakeTransport {
            listing: vec![ListingEntry { name: "x".into(), size: Some(5), mtime: None, extra: None }],
            bodies: Default::default(),
            terminal: [("x".to_string(), 404)].into_iter().collect(),
            read_cursor: VecDeque::new(),
            deleted: Vec::new(),
        };

        let mut worker = FetchWorker {
            transport: &mut transport,
            retrieve_list: &mut rl,
            ssa: &mut ssa,
            fsa_index: 0,
            rate_limiter: &mut limiter,
            event_log: &mut log,
            slot: 1,
        };

        let outcome = worker
            .run_cycle(&sample_directory(), "/p", local.path(), Duration::from_secs(30), true, None, "h", "h")
            .unwrap();

        assert_eq!(outcome, FetchCycleOutcome::Done { files: 0, bytes: 0 });
        assert!(rl.entry(0).unwrap().retrieved);
        assert!(!rl.entry(0).unwrap().in_list);
        assert!(!local.path().join("x").exists());
        assert_eq!(ssa.read_record(0).unwrap().total_file_counter, 0);
        assert_eq!(ssa.read_record(0).unwrap().total_file_size, 0);
    }

    #[test]
    fn transfer_timeout_aborts_mid_file_without_marking_retrieved() {
        let dir = tempfile::tempdir().unwrap();
        let local = tempfile::tempdir().unwrap();
        let (mut ssa, mut rl, mut limiter, mut log) = env(&dir);

        struct StallingTransport;
        impl Transport for StallingTransport {
            fn connect(&mut self, _: &str, _: Option<u16>, _: &afd_model::Credentials, _: afd_model::ProtocolOptions) -> Result<(), WorkerError> { Ok(()) }
            fn list(&mut self, _: &str) -> Result<ListOutcome, WorkerError> {
                Ok(ListOutcome::Entries(vec![ListingEntry { name: "slow".into(), size: Some(100), mtime: None, extra: None }]))
            }
            fn get(&mut self, _: &str, _: &str, _: u64) -> Result<GetOutcome, WorkerError> {
                Ok(GetOutcome::Success { expected_size: 100 })
            }
            fn read(&mut self, _buf: &mut [u8]) -> Result<usize, WorkerError> {
                std::thread::sleep(Duration::from_millis(20));
                Ok(1)
            }
            fn put(&mut self, _: &str, _: &str, _: u64, _: bool) -> Result<(), WorkerError> { Ok(()) }
            fn write(&mut self, _: &[u8]) -> Result<(), WorkerError> { Ok(()) }
            fn put_response(&mut self) -> Result<PutResponse, WorkerError> { Ok(PutResponse::Accepted) }
            fn delete(&mut self, _: &str, _: &str) -> Result<(), WorkerError> { Ok(()) }
            fn noop(&mut self) -> Result<(), WorkerError> { Ok(()) }
            fn quit(&mut self) {}
        }

        let mut transport = StallingTransport;
        let mut worker = FetchWorker {
            transport: &mut transport,
            retrieve_list: &mut rl,
            ssa: &mut ssa,
            fsa_index: 0,
            rate_limiter: &mut limiter,
            event_log: &mut log,
            slot: 1,
        };

        let err = worker
            .run_cycle(&sample_directory(), "/p", local.path(), Duration::from_millis(5), true, None, "h", "h")
            .unwrap_err();

        assert!(matches!(err, WorkerError::TransferTimeout(_)));
        assert!(!rl.entry(0).unwrap().retrieved);
    }

    #[test]
    fn run_cycle_exits_cleanly_when_hostname_changed_before_listing() {
        let dir = tempfile::tempdir().unwrap();
        let local = tempfile::tempdir().unwrap();
        let (mut ssa, mut rl, mut limiter, mut log) = env(&dir);

        let mut transport = FakeTransport {
            listing: Vec::new(),
            bodies: Default::default(),
            terminal: Default::default(),
            read_cursor: VecDeque::new(),
            deleted: Vec::new(),
        };

        let mut worker = FetchWorker {
            transport: &mut transport,
            retrieve_list: &mut rl,
            ssa: &mut ssa,
            fsa_index: 0,
            rate_limiter: &mut limiter,
            event_log: &mut log,
            slot: 1,
        };

        let outcome = worker
            .run_cycle(&sample_directory(), "/p", local.path(), Duration::from_secs(30), true, None, "old.example", "new.example")
            .unwrap();

        assert_eq!(outcome, FetchCycleOutcome::HostnameChanged);
    }
}
