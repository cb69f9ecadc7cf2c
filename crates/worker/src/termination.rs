//! The five-step exit discipline every worker runs on every exit path
//! (spec.md §4.8).

use std::path::{Path, PathBuf};

use afd_eventlog::{EventAction, EventClass, EventLogWriter, EventRecord, EventType};
use afd_model::WorkerError;
use afd_retrieve_list::{DetachPolicy, RetrieveList};

use crate::proc_fin::send_proc_fin;

fn rl_err(e: afd_retrieve_list::RlError) -> WorkerError {
    WorkerError::Alloc(e.to_string())
}

/// A download/upload that reached its final local-filesystem step but had
/// not yet been confirmed complete when the worker decided to exit (spec.md
/// §4.8 step 1).
pub struct PendingRename {
    /// Temporary local path written so far.
    pub tmp: PathBuf,
    /// Final local path the rename would have produced.
    pub dest: PathBuf,
    /// The Retrieve List row this file corresponds to.
    pub rl_index: usize,
    /// `true` if the transfer body was fully received and the rename
    /// should be completed; `false` to abandon it and leave the tmp file
    /// for a future resume.
    pub complete: bool,
}

/// Everything [`terminate`] needs: the Retrieve List to release and
/// detach, the event log to write the closing summary to, and the
/// proc-fin fifo to signal on the way out.
pub struct TerminationContext<'w> {
    /// This directory's Retrieve List, consumed by detach.
    pub retrieve_list: RetrieveList,
    /// What to do with the on-disk Retrieve List on detach.
    pub detach_policy: DetachPolicy,
    /// The event/output log.
    pub event_log: &'w mut EventLogWriter,
    /// `SF_FIN_FIFO`-equivalent path this worker signals on exit.
    pub proc_fin_fifo: &'w Path,
    /// This worker's FSA slot number (1-based assignment owner id).
    pub slot: u32,
}

/// Counts surfaced in the final "retrieved/sent N files" line.
#[derive(Clone, Copy, Debug, Default)]
pub struct TerminationSummary {
    /// Files moved this worker's lifetime.
    pub files: u32,
    /// Bytes moved this worker's lifetime.
    pub bytes: u64,
    /// Number of bursts (hand-offs accepted on this connection, including
    /// the initial job).
    pub burst_count: u32,
}

/// Runs the five-step exit discipline (spec.md §4.8). Callers invoke this
/// on every exit path, success or error, before the process actually
/// exits; the Shared Status Area segment itself is detached by ordinary
/// Rust scope exit (its `Drop` unmaps the segment), so step 3 has no
/// explicit action here beyond not holding a lock guard across this call.
///
/// # Errors
/// Returns [`WorkerError::Alloc`] if the Retrieve List cannot be detached
/// or the proc-fin fifo write fails; a pending rename's local I/O failure
/// surfaces as [`WorkerError::WriteLocal`].
pub fn terminate(
    ctx: TerminationContext<'_>,
    pending_rename: Option<PendingRename>,
    summary: TerminationSummary,
    alias: &str,
) -> Result<(), WorkerError> {
    let TerminationContext { mut retrieve_list, detach_policy, event_log, proc_fin_fifo, slot } = ctx;

    // Step 1.
    if let Some(rename) = pending_rename {
        if rename.complete {
            std::fs::rename(&rename.tmp, &rename.dest).map_err(WorkerError::WriteLocal)?;
            retrieve_list.mark_retrieved(rename.rl_index).map_err(rl_err)?;
        } else {
            let _ = std::fs::remove_file(&rename.tmp);
        }
    }

    // Step 2.
    retrieve_list.release(slot - 1);

    // Step 3 (RL's half; the FSA segment detaches via scope exit).
    retrieve_list.detach(detach_policy).map_err(rl_err)?;

    // Step 4.
    let burst_suffix = if summary.burst_count > 1 {
        format!(" [BURST * {}]", summary.burst_count)
    } else {
        String::new()
    };
    let message = format!(
        "retrieved/sent {} files ({} bytes){burst_suffix}",
        summary.files, summary.bytes
    );
    let record = EventRecord {
        timestamp: 0,
        class: EventClass::Host,
        event_type: EventType::Auto,
        action: EventAction::StopTransfer,
        alias: Some(alias.to_string()),
        fields: vec![message],
    };
    if let Err(e) = event_log.record(&record) {
        tracing::warn!("failed to append termination summary record: {e}");
    }

    // Step 5.
    send_proc_fin(proc_fin_fifo, false)
}
