//! AFD send-direction transfer worker: reads its per-job message file,
//! sends every listed file over one connection, then runs the five-step
//! exit discipline (spec.md §4.4, §4.7, §4.8).

mod job;
mod transport_factory;

use std::num::NonZeroU64;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use afd_bandwidth::RateLimiter;
use afd_burst::{BurstCoordinator, BurstOutcome, PosixSignalWaiter};
use afd_config::SendWorkerArgs;
use afd_dupcheck::{DupCache, DupCheckFlags};
use afd_eventlog::EventLogWriter;
use afd_logging::WorkerContext;
use afd_model::{ExitCode, JobDescriptor, JobStatus, WorkerError};
use afd_retrieve_list::{DetachPolicy, RetrieveList};
use afd_ssa::SsaSegment;
use afd_worker::{terminate, PendingRename, SendOptions, SendOutcome, SendWorker, TerminationContext, TerminationSummary};
use clap::Parser;

use job::parse_message_file;

fn effective_rate(rate_limit: u64) -> NonZeroU64 {
    NonZeroU64::new(rate_limit).unwrap_or(NonZeroU64::new(u64::MAX).unwrap())
}

/// `negotiate` reports only which fields changed on a burst hand-off, not
/// the fresh descriptor it classified them against (spec.md §9's
/// `RETRIEVE_JOB_HACK` open question covers the same kind of handshake
/// ambiguity on the fetch side). A send worker has nothing to reload from
/// the payload bytes alone without a richer wire format, so it logs the
/// rebind and keeps sending under the descriptor already bound.
struct NoopLoader<'a> {
    current: &'a JobDescriptor,
}

impl afd_burst::JobDescriptorLoader for NoopLoader<'_> {
    fn load(&self, _payload: &[u8]) -> Result<JobDescriptor, WorkerError> {
        Ok(self.current.clone())
    }
}

fn run(args: &SendWorkerArgs) -> Result<ExitCode, WorkerError> {
    let work_dir = PathBuf::from(&args.work_dir);
    let message_path = work_dir.join(&args.msg_name);
    let parsed = parse_message_file(&message_path, args.toggle, args.retries)?;
    let job = parsed.descriptor;
    let host = parsed.host;
    let file_name_is_header = parsed.file_name_is_header;
    let wmo_sequence = parsed.wmo_sequence;
    let mut files = parsed.files;
    if args.resend {
        files.reverse();
    }

    let ctx = WorkerContext { host_alias: args.msg_name.clone(), slot: args.slot, job_id: job.job_id };
    let _span = ctx.span().entered();

    let mut transport = transport_factory::for_protocol(&job.target.protocol)
        .ok_or_else(|| WorkerError::Alloc(format!("unsupported protocol '{}'", job.target.protocol)))?;

    let mut ssa = SsaSegment::attach(work_dir.join("fsa.dat"), 1, args.fsa_id).map_err(|e| WorkerError::Alloc(e.to_string()))?;
    let mut retrieve_list =
        RetrieveList::attach(work_dir.join(format!("{}.rl", args.msg_name))).map_err(|e| WorkerError::Alloc(e.to_string()))?;
    let mut rate_limiter = RateLimiter::new(effective_rate(job.rate_limit));
    let mut dupcache = DupCache::new();
    let mut event_log = EventLogWriter::new(&work_dir, "fsa.log");

    let credentials = afd_model::Credentials { user: job.target.user.clone(), password: job.target.password.clone() };
    transport.connect(&host, job.target.port, &credentials, afd_model::ProtocolOptions::empty())?;

    let fin_fifo = work_dir.join("fin.fifo");
    let coordinator = BurstCoordinator::new(&fin_fifo);
    let mut waiter = PosixSignalWaiter::new()?;

    let dupcheck_ttl = job.dupcheck.map(|(ttl, _)| ttl);
    let dupcheck_flags = job
        .dupcheck
        .map_or(DupCheckFlags::empty(), |(_, hash)| if hash { DupCheckFlags::CONTENT_HASH } else { DupCheckFlags::empty() });
    let archive_dir = job.archive_dir.as_deref().filter(|_| !args.no_archive).map(PathBuf::from);

    let mut total_files = 0u32;
    let mut total_bytes = 0u64;
    let mut burst_count = 0u32;
    let mut exit_code = ExitCode::TransferSuccess;
    let mut first_in_session = true;

    'bursts: loop {
        burst_count += 1;

        for file in &files {
            let mut worker = SendWorker {
                transport: transport.as_mut(),
                ssa: &mut ssa,
                fsa_index: args.fsa_pos as usize,
                rate_limiter: &mut rate_limiter,
                dupcheck: &mut dupcache,
                event_log: &mut event_log,
            };
            let options = SendOptions {
                remote_path: &job.active_target_dir,
                file_name_is_header,
                wmo_sequence,
                archive_dir: archive_dir.as_deref(),
                archive_time: job.archive_time,
                dupcheck_ttl,
                dupcheck_flags,
                transfer_timeout: Duration::from_secs(60),
                first_in_session,
            };

            match worker.send_file(file, &options, Instant::now()) {
                Ok(SendOutcome::Sent { bytes }) => {
                    total_files += 1;
                    total_bytes += bytes;
                }
                Ok(SendOutcome::Duplicate) => {}
                Ok(SendOutcome::Requeue) => {
                    exit_code = ExitCode::StillFilesToSend;
                    break 'bursts;
                }
                Err(e) => {
                    exit_code = e.exit_code();
                    transport.quit();
                    return finish(work_dir, retrieve_list, event_log, args, total_files, total_bytes, burst_count, exit_code, None);
                }
            }
            first_in_session = false;
        }

        let mut slot_status = JobStatus::default();
        let loader = NoopLoader { current: &job };
        let keep_connected = Duration::ZERO;
        let round = coordinator.negotiate(&mut slot_status, &job, &loader, &mut waiter, Duration::from_secs(2), keep_connected)?;

        match round {
            BurstOutcome::Burst | BurstOutcome::BurstWithRebind(_) => {
                tracing::info!("burst hand-off accepted, resending the same job's files again");
            }
            BurstOutcome::KeepAlive | BurstOutcome::Neither | BurstOutcome::Idle => break,
        }
    }

    transport.quit();
    finish(work_dir, retrieve_list, event_log, args, total_files, total_bytes, burst_count, exit_code, None)
}

#[allow(clippy::too_many_arguments)]
fn finish(
    work_dir: PathBuf,
    retrieve_list: RetrieveList,
    mut event_log: EventLogWriter,
    args: &SendWorkerArgs,
    files: u32,
    bytes: u64,
    burst_count: u32,
    exit_code: ExitCode,
    pending_rename: Option<PendingRename>,
) -> Result<ExitCode, WorkerError> {
    let fin_fifo = work_dir.join("proc_fin.fifo");
    let ctx = TerminationContext {
        retrieve_list,
        detach_policy: DetachPolicy::Preserve,
        event_log: &mut event_log,
        proc_fin_fifo: &fin_fifo,
        slot: args.slot,
    };
    terminate(ctx, pending_rename, TerminationSummary { files, bytes, burst_count }, &args.msg_name)?;
    Ok(exit_code)
}

fn install_logging() {
    let _ = afd_logging::init(tracing::Level::INFO);
}

fn main() {
    install_logging();
    let args = SendWorkerArgs::parse();

    let outcome = run(&args);
    let code = match outcome {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("send worker exiting: {e}");
            e.exit_code()
        }
    };
    std::process::exit(code.as_i32());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_rate_treats_zero_as_unlimited() {
        assert_eq!(effective_rate(0), NonZeroU64::new(u64::MAX).unwrap());
    }

    #[test]
    fn effective_rate_passes_through_a_configured_limit() {
        assert_eq!(effective_rate(2048), NonZeroU64::new(2048).unwrap());
    }
}
