//! Thin process-per-job supervisor: for every configured directory,
//! spawns one `afd-fetch-worker` child, waits for it to exit, and forwards
//! its outcome upstream over the proc-fin fifo (spec.md §2 table,
//! SPEC_FULL.md §4.9).
//!
//! This binary is deliberately not the production scheduler: it runs one
//! pass over the configured directories and exits. Deciding *when* to run
//! the next pass against each directory's check interval lives in the
//! Fileretrieve Status Area the real scheduler maintains; rebuilding the
//! Shared Status Area layout and the burst handshake inside a running
//! worker are also out of scope here.

use std::path::PathBuf;

use afd_config::ConfigDocument;
use afd_model::{JobDescriptor, JobKind, ModeFlag, Target, TransferMode};
use afd_supervisor::{proc_fin, spawn_worker, SupervisorError, WorkerBinaries, WorkerInvocation};
use clap::Parser;

/// `afd-supervisord <config> <work_dir> <bin_dir> <proc_fin_fifo>`: runs
/// one supervision pass over every directory due for a check.
#[derive(Debug, Parser)]
#[command(name = "afd-supervisord", about = "Thin process-per-job supervisor for AFD fetch directories")]
struct SupervisordArgs {
    /// Path to the `afd.toml` configuration document.
    config: PathBuf,
    /// Spool working directory handed to each spawned worker.
    work_dir: PathBuf,
    /// Directory containing the `afd-fetch-worker`/`afd-send-worker` binaries.
    bin_dir: PathBuf,
    /// Fifo this process writes each worker's outcome to.
    proc_fin_fifo: PathBuf,
}

fn fetch_job_descriptor(dir_index: u32) -> JobDescriptor {
    JobDescriptor {
        kind: JobKind::Fetch,
        target: Target { protocol: String::new(), port: None, user: String::new(), password: String::new(), path: String::new() },
        transfer_mode: TransferMode::Auto,
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
        job_id: None,
        dir_id: Some(dir_index),
        active_target_dir: String::new(),
        active_user: String::new(),
        active_transfer_mode: TransferMode::Auto,
        active_auth: None,
    }
}

fn run(config: &ConfigDocument, args: &SupervisordArgs) -> Result<u32, SupervisorError> {
    let binaries = WorkerBinaries { send_worker: args.bin_dir.join("afd-send-worker"), fetch_worker: args.bin_dir.join("afd-fetch-worker") };

    let mut spawned = 0u32;
    for (index, directory) in config.directories.iter().enumerate() {
        if directory.url.is_empty() {
            continue;
        }

        let invocation = WorkerInvocation {
            job: fetch_job_descriptor(index as u32),
            work_dir: args.work_dir.to_string_lossy().into_owned(),
            slot: index as u32,
            fsa_id: 1,
            fsa_pos: index as u32,
            name_arg: directory.alias.clone(),
            retries: 0,
            toggle: false,
            distributed_helper: false,
            resend: false,
            no_archive: false,
            age_limit: None,
        };

        tracing::info!(alias = %directory.alias, "spawning fetch worker");
        let handle = spawn_worker(&binaries, &invocation)?;
        let outcome = handle.wait()?;
        if outcome.respawn {
            tracing::info!(alias = %directory.alias, "worker asked for an immediate respawn");
        }
        proc_fin(&args.proc_fin_fifo, &outcome)?;
        spawned += 1;
    }

    Ok(spawned)
}

fn install_logging() {
    let _ = afd_logging::init(tracing::Level::INFO);
}

fn main() {
    install_logging();
    let args = SupervisordArgs::parse();

    let config = match ConfigDocument::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("failed to load '{}': {e}", args.config.display());
            std::process::exit(1);
        }
    };

    match run(&config, &args) {
        Ok(count) => {
            tracing::info!(count, "supervision pass complete");
        }
        Err(e) => {
            tracing::error!("supervision pass failed: {e}");
            std::process::exit(1);
        }
    }
}
