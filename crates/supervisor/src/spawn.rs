//! Builds the CLI invocation for a send or fetch worker and spawns it as a
//! child process (spec.md §5 "Process-per-job", §6 "CLI surface").

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

use afd_model::{JobDescriptor, JobKind};

use crate::error::SupervisorError;
use crate::handle::WorkerHandle;

/// Paths to the two worker binaries the supervisor spawns children from.
#[derive(Clone, Debug)]
pub struct WorkerBinaries {
    /// Path to the `afd-send-worker` executable.
    pub send_worker: PathBuf,
    /// Path to the `afd-fetch-worker` executable.
    pub fetch_worker: PathBuf,
}

/// Everything needed to build one worker's CLI invocation: the job
/// descriptor plus the positional/flag arguments spec.md §6 defines for
/// the worker's kind.
#[derive(Clone, Debug)]
pub struct WorkerInvocation {
    /// The job this process will run.
    pub job: JobDescriptor,
    /// Spool working directory for the job.
    pub work_dir: String,
    /// FSA/FRA slot index this worker will own.
    pub slot: u32,
    /// FSA segment id (epoch) to attach to.
    pub fsa_id: u32,
    /// Position of this host within the FSA.
    pub fsa_pos: u32,
    /// Send: per-job message file name. Fetch: directory alias.
    pub name_arg: String,
    /// Retry count already attempted for this job.
    pub retries: u32,
    /// Toggle the host's hostname before connecting.
    pub toggle: bool,
    /// Fetch only: this worker is a distributed helper (spec.md §4.7 step 3).
    pub distributed_helper: bool,
    /// Send only: resend from the archive tree rather than the spool.
    pub resend: bool,
    /// Send only: disable archiving of successfully sent files.
    pub no_archive: bool,
    /// Send only: age limit past which a file is no longer eligible.
    pub age_limit: Option<u64>,
}

fn build_argv(invocation: &WorkerInvocation) -> Vec<OsString> {
    let mut argv: Vec<OsString> = vec![
        invocation.work_dir.clone().into(),
        invocation.slot.to_string().into(),
        invocation.fsa_id.to_string().into(),
        invocation.fsa_pos.to_string().into(),
        invocation.name_arg.clone().into(),
    ];

    match invocation.job.kind {
        JobKind::Send => {
            if let Some(age) = invocation.age_limit {
                argv.push("-a".into());
                argv.push(age.to_string().into());
            }
            if invocation.no_archive {
                argv.push("-A".into());
            }
            argv.push("-o".into());
            argv.push(invocation.retries.to_string().into());
            if invocation.resend {
                argv.push("-r".into());
            }
            if invocation.toggle {
                argv.push("-t".into());
            }
        }
        JobKind::Fetch => {
            if invocation.distributed_helper {
                argv.push("-d".into());
            }
            argv.push("-o".into());
            argv.push(invocation.retries.to_string().into());
            if invocation.toggle {
                argv.push("-t".into());
            }
        }
    }

    argv
}

fn binary_for<'a>(binaries: &'a WorkerBinaries, kind: JobKind) -> &'a Path {
    match kind {
        JobKind::Send => &binaries.send_worker,
        JobKind::Fetch => &binaries.fetch_worker,
    }
}

/// Spawns `invocation`'s job as a worker child process, one process per
/// job (spec.md §5).
///
/// # Errors
/// Returns [`SupervisorError::Spawn`] if the OS refuses to start the
/// process (binary missing, permissions).
pub fn spawn_worker(
    binaries: &WorkerBinaries,
    invocation: &WorkerInvocation,
) -> Result<WorkerHandle, SupervisorError> {
    let binary = binary_for(binaries, invocation.job.kind).to_path_buf();
    let child = Command::new(&binary)
        .args(build_argv(invocation))
        .spawn()
        .map_err(|source| SupervisorError::Spawn { binary: binary.clone(), source })?;

    Ok(WorkerHandle::new(child, invocation.job.job_id, invocation.job.dir_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use afd_model::{ModeFlag, Target, TransferMode};

    fn send_invocation() -> WorkerInvocation {
        WorkerInvocation {
            job: JobDescriptor {
                kind: JobKind::Send,
                target: Target {
                    protocol: "ftp".into(),
                    port: None,
                    user: "anon".into(),
                    password: String::new(),
                    path: "/out".into(),
                },
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
                job_id: Some(42),
                dir_id: None,
                active_target_dir: "/out".into(),
                active_user: "anon".into(),
                active_transfer_mode: TransferMode::Binary,
                active_auth: None,
            },
            work_dir: "/spool/host-a".into(),
            slot: 0,
            fsa_id: 7,
            fsa_pos: 3,
            name_arg: "msg.42".into(),
            retries: 2,
            toggle: true,
            distributed_helper: false,
            resend: true,
            no_archive: true,
            age_limit: Some(3600),
        }
    }

    #[test]
    fn send_argv_matches_the_cli_surface_order() {
        let argv = build_argv(&send_invocation());
        let argv: Vec<String> = argv.into_iter().map(|s| s.into_string().unwrap()).collect();
        assert_eq!(
            argv,
            vec![
                "/spool/host-a", "0", "7", "3", "msg.42", "-a", "3600", "-A", "-o", "2", "-r",
                "-t",
            ]
        );
    }

    #[test]
    fn fetch_argv_carries_the_distributed_helper_flag() {
        let mut invocation = send_invocation();
        invocation.job.kind = JobKind::Fetch;
        invocation.job.job_id = None;
        invocation.job.dir_id = Some(5);
        invocation.name_arg = "dir-a".into();
        invocation.distributed_helper = true;
        invocation.toggle = false;

        let argv = build_argv(&invocation);
        let argv: Vec<String> = argv.into_iter().map(|s| s.into_string().unwrap()).collect();
        assert_eq!(
            argv,
            vec!["/spool/host-a", "0", "7", "3", "dir-a", "-d", "-o", "2"]
        );
    }

    #[test]
    fn binary_selection_follows_job_kind() {
        let binaries = WorkerBinaries {
            send_worker: PathBuf::from("/usr/libexec/afd-send-worker"),
            fetch_worker: PathBuf::from("/usr/libexec/afd-fetch-worker"),
        };
        assert_eq!(binary_for(&binaries, JobKind::Send), binaries.send_worker.as_path());
        assert_eq!(binary_for(&binaries, JobKind::Fetch), binaries.fetch_worker.as_path());
    }
}
