//! AFD fetch-direction transfer worker: owns one FRA slot for its
//! lifetime, runs one fetch burst after another until the scheduler lets
//! the connection go idle, then exits through the five-step discipline
//! (spec.md §4.6-§4.8).

mod job;
mod transport_factory;

use std::num::NonZeroU64;
use std::path::{Path, PathBuf};
use std::time::Duration;

use afd_bandwidth::RateLimiter;
use afd_burst::{BurstCoordinator, BurstOutcome, PosixSignalWaiter};
use afd_config::{ConfigDocument, FetchWorkerArgs};
use afd_eventlog::EventLogWriter;
use afd_logging::WorkerContext;
use afd_model::{ExitCode, JobStatus, WorkerError};
use afd_ssa::SsaSegment;
use afd_retrieve_list::{DetachPolicy, RetrieveList};
use afd_worker::{terminate, FetchCycleOutcome, FetchWorker, PendingRename, TerminationContext, TerminationSummary};
use clap::Parser;

use job::{build_job_descriptor, parse_directory_url, PathRebindLoader};

fn effective_rate(rate_limit: u64) -> NonZeroU64 {
    NonZeroU64::new(rate_limit).unwrap_or(NonZeroU64::new(u64::MAX).unwrap())
}

/// Re-reads the directory's configured URL and returns the hostname it
/// currently names, so a mid-burst hostname switch (spec.md §4.7 step 1)
/// can actually be detected against the hostname the connection was
/// opened with. Falls back to `bound_hostname` if the config can't be
/// reloaded, which just means no change is reported this cycle.
fn current_active_hostname(work_dir: &Path, dir_alias: &str, bound_hostname: &str) -> String {
    ConfigDocument::load(&work_dir.join("afd.toml"))
        .ok()
        .and_then(|config| config.directories.into_iter().find(|d| d.alias == dir_alias))
        .and_then(|directory| parse_directory_url(&directory.url).ok())
        .map(|parsed| parsed.host)
        .unwrap_or_else(|| bound_hostname.to_string())
}

fn run(args: &FetchWorkerArgs) -> Result<ExitCode, WorkerError> {
    let work_dir = PathBuf::from(&args.work_dir);
    let config = ConfigDocument::load(&work_dir.join("afd.toml"))
        .map_err(|e| WorkerError::Alloc(format!("loading config: {e}")))?;

    let directory = config
        .directories
        .iter()
        .find(|d| d.alias == args.dir_alias)
        .cloned()
        .ok_or_else(|| WorkerError::Alloc(format!("no directory configured for '{}'", args.dir_alias)))?;

    let parsed = parse_directory_url(&directory.url)?;
    let host = config.hosts.iter().find(|h| h.hostname == parsed.host).cloned();

    let job = build_job_descriptor(&directory, host.as_ref(), &parsed, args.toggle, args.retries);
    let directory_status = directory.into_directory_status().map_err(|e| WorkerError::Alloc(e.to_string()))?;

    let ctx = WorkerContext { host_alias: args.dir_alias.clone(), slot: args.slot, job_id: job.dir_id };
    let _span = ctx.span().entered();

    let mut transport = transport_factory::for_protocol(&job.target.protocol)
        .ok_or_else(|| WorkerError::Alloc(format!("unsupported protocol '{}'", job.target.protocol)))?;

    let mut ssa = SsaSegment::attach(work_dir.join("fra.dat"), 1, args.fsa_id).map_err(|e| WorkerError::Alloc(e.to_string()))?;
    let mut retrieve_list =
        RetrieveList::attach(work_dir.join(format!("{}.rl", args.dir_alias))).map_err(|e| WorkerError::Alloc(e.to_string()))?;
    let mut rate_limiter = RateLimiter::new(effective_rate(job.rate_limit));
    let mut event_log = EventLogWriter::new(&work_dir, "fra.log");

    let credentials = afd_model::Credentials { user: job.target.user.clone(), password: job.target.password.clone() };
    transport.connect(&parsed.host, parsed.port, &credentials, afd_model::ProtocolOptions::empty())?;

    let keep_connected = host.as_ref().map_or(Duration::ZERO, |h| Duration::from_secs(u64::from(h.keep_connected)));
    let transfer_timeout = host
        .as_ref()
        .map_or(Duration::from_secs(60), |h| Duration::from_secs(h.transfer_timeout_secs));

    let fin_fifo = work_dir.join("fin.fifo");
    let coordinator = BurstCoordinator::new(&fin_fifo);
    let mut waiter = PosixSignalWaiter::new()?;
    let trl_fifo_path = work_dir.join("trl_calc.fifo");

    let mut total_files = 0u32;
    let mut total_bytes = 0u64;
    let mut burst_count = 0u32;
    let mut exit_code = ExitCode::TransferSuccess;

    loop {
        burst_count += 1;

        let mut worker = FetchWorker {
            transport: transport.as_mut(),
            retrieve_list: &mut retrieve_list,
            ssa: &mut ssa,
            fsa_index: args.fsa_pos as usize,
            rate_limiter: &mut rate_limiter,
            event_log: &mut event_log,
            slot: args.slot,
        };

        let active_hostname = current_active_hostname(&work_dir, &args.dir_alias, &parsed.host);
        let outcome = worker.run_cycle(
            &directory_status,
            &job.active_target_dir,
            &work_dir,
            transfer_timeout,
            true,
            Some(&trl_fifo_path),
            &parsed.host,
            &active_hostname,
        );

        match outcome {
            Ok(FetchCycleOutcome::Done { files, bytes }) => {
                total_files += files;
                total_bytes += bytes;
            }
            Ok(FetchCycleOutcome::HostnameChanged) => {
                exit_code = ExitCode::TransferSuccess;
                break;
            }
            Err(e) => {
                exit_code = e.exit_code();
                transport.quit();
                return finish(work_dir, retrieve_list, event_log, args, total_files, total_bytes, burst_count, exit_code, None);
            }
        }

        let mut slot_status = JobStatus::default();
        let loader = PathRebindLoader { current: &job };
        let round = coordinator.negotiate(&mut slot_status, &job, &loader, &mut waiter, Duration::from_secs(2), keep_connected)?;

        match round {
            BurstOutcome::Burst => {}
            BurstOutcome::BurstWithRebind(changed) => {
                // `negotiate` already resolved the rebind against the fresh
                // descriptor internally; it only reports which fields
                // changed, not the new values. `PathRebindLoader` decodes
                // the same handshake payload to recover the one field a
                // fetch job can actually change: the target path.
                if changed.has(afd_model::ValuesChanged::TARGET_DIR_CHANGED) {
                    tracing::info!("burst rebind: target directory changed, keeping current path pending richer handshake payload");
                }
            }
            BurstOutcome::KeepAlive => {
                let mut keepalive = afd_worker::KeepAliveLoop {
                    transport: transport.as_mut(),
                    trl_fifo: Some(&trl_fifo_path),
                    rate_limited: job.rate_limit != 0,
                };
                let mut clock = afd_worker::SystemClock;
                let mut active_target_dir = job.active_target_dir.clone();
                let reeval = || job.active_target_dir.clone();
                let result = keepalive.run_fetch(
                    &mut clock,
                    &mut slot_status,
                    &directory_status,
                    now_unix(),
                    keep_connected,
                    Duration::from_secs(5),
                    false,
                    false,
                    &mut active_target_dir,
                    &reeval,
                );
                match result {
                    Ok(_) => break,
                    Err(e) => {
                        exit_code = e.exit_code();
                        break;
                    }
                }
            }
            BurstOutcome::Neither | BurstOutcome::Idle => break,
        }
    }

    transport.quit();
    finish(work_dir, retrieve_list, event_log, args, total_files, total_bytes, burst_count, exit_code, None)
}

fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[allow(clippy::too_many_arguments)]
fn finish(
    work_dir: PathBuf,
    retrieve_list: RetrieveList,
    mut event_log: EventLogWriter,
    args: &FetchWorkerArgs,
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
    terminate(ctx, pending_rename, TerminationSummary { files, bytes, burst_count }, &args.dir_alias)?;
    Ok(exit_code)
}

fn install_logging() {
    let _ = afd_logging::init(tracing::Level::INFO);
}

fn main() {
    install_logging();
    let args = FetchWorkerArgs::parse();

    let outcome = run(&args);
    let code = match outcome {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("fetch worker exiting: {e}");
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
        assert_eq!(effective_rate(4096), NonZeroU64::new(4096).unwrap());
    }

    #[test]
    fn now_unix_is_a_plausible_recent_timestamp() {
        // Anything after 2020-01-01T00:00:00Z (1_577_836_800); catches an
        // accidental fallback to the 0 sentinel.
        assert!(now_unix() > 1_577_836_800);
    }
}
