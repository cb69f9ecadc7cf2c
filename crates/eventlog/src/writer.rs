use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use afd_model::EventRecord;
use chrono::{DateTime, Utc};

/// Failure appending to the event log.
#[derive(Debug, thiserror::Error)]
pub enum EventLogError {
    /// The log directory or file could not be opened for appending.
    #[error("failed to open event log {path}: {source}")]
    Open {
        /// Path that failed to open.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// A record could not be written or flushed.
    #[error("failed to write event log record: {0}")]
    Write(#[source] std::io::Error),
}

/// An append-only, date-prefixed event log (spec.md §6, SPEC_FULL.md §4.10).
///
/// Each calendar day gets its own file named `<prefix>.<YYYYMMDD>` under
/// `directory`, matching the date-rotation convention the out-of-scope log
/// rotation helper expects as its input format. `EventLogWriter` only
/// appends; rotation/pruning of old files stays out of scope.
pub struct EventLogWriter {
    directory: PathBuf,
    prefix: String,
    current_date: Option<chrono::NaiveDate>,
    file: Option<BufWriter<File>>,
}

impl EventLogWriter {
    /// Opens a writer rooted at `directory`, creating today's file lazily on
    /// the first `record` call.
    #[must_use]
    pub fn new(directory: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            prefix: prefix.into(),
            current_date: None,
            file: None,
        }
    }

    fn path_for(&self, date: chrono::NaiveDate) -> PathBuf {
        self.directory
            .join(format!("{}.{}", self.prefix, date.format("%Y%m%d")))
    }

    fn ensure_open(&mut self, now: DateTime<Utc>) -> Result<(), EventLogError> {
        let date = now.date_naive();
        if self.current_date == Some(date) && self.file.is_some() {
            return Ok(());
        }

        let path = self.path_for(date);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| EventLogError::Open { path, source })?;

        self.file = Some(BufWriter::new(file));
        self.current_date = Some(date);
        Ok(())
    }

    /// Appends `record` to today's file and also emits it as a structured
    /// `tracing::info!` event, so operators have both the durable wire
    /// format and live `RUST_LOG`-filterable output from one call.
    ///
    /// # Errors
    /// Returns [`EventLogError`] if the file cannot be opened or written.
    pub fn record(&mut self, record: &EventRecord) -> Result<(), EventLogError> {
        self.ensure_open(Utc::now())?;
        let line = record.to_string();

        tracing::info!(
            target: "afd_eventlog",
            class = record.class.tag().to_string(),
            event_type = record.event_type.tag().to_string(),
            action = record.action.display_name(),
            alias = record.alias.as_deref().unwrap_or(""),
            "event recorded"
        );

        let file = self.file.as_mut().expect("ensure_open just populated this");
        writeln!(file, "{line}").map_err(EventLogError::Write)?;
        file.flush().map_err(EventLogError::Write)
    }

    /// The path the next `record` call would append to, given `now`.
    #[must_use]
    pub fn path_for_date(&self, now: DateTime<Utc>) -> PathBuf {
        self.path_for(now.date_naive())
    }

    /// The configured log directory.
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use afd_model::{EventAction, EventClass, EventType};
    use std::fs;

    fn sample_record() -> EventRecord {
        EventRecord {
            timestamp: 0x1234,
            class: EventClass::Host,
            event_type: EventType::Auto,
            action: EventAction::EnableHost,
            alias: Some("host-a".into()),
            fields: Vec::new(),
        }
    }

    #[test]
    fn record_appends_a_line_to_todays_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = EventLogWriter::new(dir.path(), "event.log");
        writer.record(&sample_record()).unwrap();

        let expected_path = writer.path_for_date(Utc::now());
        let contents = fs::read_to_string(expected_path).unwrap();
        assert!(contents.contains("00001234HA29"));
    }

    #[test]
    fn multiple_records_append_rather_than_truncate() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = EventLogWriter::new(dir.path(), "event.log");
        writer.record(&sample_record()).unwrap();
        writer.record(&sample_record()).unwrap();

        let expected_path = writer.path_for_date(Utc::now());
        let contents = fs::read_to_string(expected_path).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }
}
