//! `tracing`-based logging setup shared by every AFD worker and supervisor
//! binary (SPEC_FULL.md §4.11).
//!
//! Every process calls [`init`] once at startup. Verbosity is controlled by
//! `RUST_LOG` (falling back to a configured default), consistent with how
//! the rest of this workspace's tooling expects to be run in a shell rather
//! than through bespoke `-v`/`-d` counting flags.

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Initializes the global `tracing` subscriber for a worker or supervisor
/// process.
///
/// `default_level` is used when `RUST_LOG` is unset; it is overridden
/// entirely by `RUST_LOG` when present, including per-module directives.
/// Returns `Err` if a subscriber was already installed (e.g. called twice,
/// or from within a test harness that installs its own).
pub fn init(default_level: Level) -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.to_string()));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
}

/// Identifies the FSA/FRA context a worker is attributing its log lines to,
/// for use as a [`tracing::Span`] carried through the lifetime of the
/// process (spec.md §3 slot exclusivity: every line a worker emits belongs
/// to exactly one host/slot/job).
#[derive(Debug, Clone)]
pub struct WorkerContext {
    /// Configured host or directory alias.
    pub host_alias: String,
    /// FSA/FRA slot this worker owns.
    pub slot: u32,
    /// Job id currently occupying the slot, if any.
    pub job_id: Option<u32>,
}

impl WorkerContext {
    /// Opens a `tracing` span carrying `host_alias`/`slot`/`job_id` as
    /// structured fields. Entering the returned span attributes every log
    /// line emitted within it without the caller threading these fields
    /// through every call.
    #[must_use]
    pub fn span(&self) -> tracing::Span {
        tracing::info_span!(
            "worker",
            host_alias = %self.host_alias,
            slot = self.slot,
            job_id = self.job_id,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_carries_expected_fields() {
        let ctx = WorkerContext {
            host_alias: "host-a".into(),
            slot: 2,
            job_id: Some(99),
        };
        let span = ctx.span();
        assert_eq!(span.metadata().unwrap().name(), "worker");
    }
}
