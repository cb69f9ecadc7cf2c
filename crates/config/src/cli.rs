//! CLI argument surface for the send and fetch worker binaries, exactly as
//! spec.md §6 specifies it.

use clap::Parser;

/// `<work_dir> <slot> <fsa_id> <fsa_pos> <msg_name>` plus flags, for a send
/// worker process.
#[derive(Debug, Clone, Parser)]
#[command(name = "afd-send-worker", about = "AFD send-direction transfer worker")]
pub struct SendWorkerArgs {
    /// Spool working directory for this job.
    pub work_dir: String,
    /// FSA slot index this worker owns for its lifetime.
    pub slot: u32,
    /// FSA segment id (epoch) the caller attached to.
    pub fsa_id: u32,
    /// Position of this host within the FSA.
    pub fsa_pos: u32,
    /// Name of the per-job message file describing what to send.
    pub msg_name: String,

    /// Age limit past which a file is no longer eligible to send.
    #[arg(short = 'a', long = "age-limit")]
    pub age_limit: Option<u64>,
    /// Disable archiving of successfully sent files.
    #[arg(short = 'A', long = "no-archive")]
    pub no_archive: bool,
    /// Number of retries already attempted for this job.
    #[arg(short = 'o', long = "retries", default_value_t = 0)]
    pub retries: u32,
    /// Resend the file from the archive tree rather than the spool.
    #[arg(short = 'r', long = "resend")]
    pub resend: bool,
    /// Toggle the host's hostname before connecting.
    #[arg(short = 't', long = "toggle")]
    pub toggle: bool,
}

/// `<work_dir> <slot> <fsa_id> <fsa_pos> <dir_alias>` plus flags, for a fetch
/// worker process.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "afd-fetch-worker",
    about = "AFD fetch-direction transfer worker"
)]
pub struct FetchWorkerArgs {
    /// Spool working directory for this job.
    pub work_dir: String,
    /// FRA slot index this worker owns for its lifetime.
    pub slot: u32,
    /// FSA segment id (epoch) the caller attached to.
    pub fsa_id: u32,
    /// Position of this host within the FSA.
    pub fsa_pos: u32,
    /// Alias of the directory being fetched.
    pub dir_alias: String,

    /// This worker is a distributed helper spawned to parallelise a large
    /// listing (spec.md §4.7 step 3).
    #[arg(short = 'd', long = "distributed-helper")]
    pub distributed_helper: bool,
    /// Number of retries already attempted for this job.
    #[arg(short = 'o', long = "retries", default_value_t = 0)]
    pub retries: u32,
    /// Toggle the host's hostname before connecting.
    #[arg(short = 't', long = "toggle")]
    pub toggle: bool,
}
