//! Per-host/per-directory counters that live in the record array body of an
//! SSA segment (spec.md §3 FSA totals, §5 "Shared resource taxonomy").

/// Fixed on-disk size of one [`CounterRecord`].
pub const RECORD_LEN: usize = 32;

/// The cross-process-mutable counter subset of a Host Status entry:
/// `total_file_counter`/`total_file_size` (guarded by `LOCK_TFC`),
/// `active_transfers` (guarded by `LOCK_CON`), and `error_counter` (guarded
/// by the error-lock). The rest of `HostStatus`/`DirectoryStatus` (aliases,
/// credentials, schedule tables, ...) is config-derived and lives in the
/// owning process's memory, not in shared memory, since it is written by a
/// single writer (the supervisor) and read-only for workers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CounterRecord {
    /// Running total of files queued (spec.md §3 `total_file_counter`).
    pub total_file_counter: i64,
    /// Running total of bytes queued (spec.md §3 `total_file_size`).
    pub total_file_size: i64,
    /// Number of slots currently occupied by a live worker.
    pub active_transfers: u16,
    /// Consecutive-error counter.
    pub error_counter: u32,
    /// Host-status flags byte (`QUEUE_SET`/`ACTION_SUCCESS`/`STORE_IP`).
    pub flags: u8,
}

impl CounterRecord {
    /// Decodes a record from its fixed-size on-disk representation.
    #[must_use]
    pub fn read_from(bytes: &[u8; RECORD_LEN]) -> Self {
        Self {
            total_file_counter: i64::from_le_bytes(bytes[0..8].try_into().unwrap()),
            total_file_size: i64::from_le_bytes(bytes[8..16].try_into().unwrap()),
            active_transfers: u16::from_le_bytes(bytes[16..18].try_into().unwrap()),
            error_counter: u32::from_le_bytes(bytes[18..22].try_into().unwrap()),
            flags: bytes[22],
        }
    }

    /// Encodes this record into its fixed-size on-disk representation.
    pub fn write_to(&self, bytes: &mut [u8; RECORD_LEN]) {
        bytes[0..8].copy_from_slice(&self.total_file_counter.to_le_bytes());
        bytes[8..16].copy_from_slice(&self.total_file_size.to_le_bytes());
        bytes[16..18].copy_from_slice(&self.active_transfers.to_le_bytes());
        bytes[18..22].copy_from_slice(&self.error_counter.to_le_bytes());
        bytes[22] = self.flags;
        bytes[23..RECORD_LEN].fill(0);
    }

    /// Clamps `total_file_counter`/`total_file_size` back to a consistent
    /// state (spec.md §7 category 4), mirroring
    /// `afd_model::HostStatus::clamp_totals`.
    pub fn clamp_totals(&mut self) {
        if self.total_file_counter < 0 {
            self.total_file_counter = 0;
        }
        if self.total_file_counter == 0 {
            self.total_file_size = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_bytes() {
        let record = CounterRecord {
            total_file_counter: 12,
            total_file_size: 4096,
            active_transfers: 2,
            error_counter: 1,
            flags: 0b101,
        };
        let mut bytes = [0u8; RECORD_LEN];
        record.write_to(&mut bytes);
        assert_eq!(CounterRecord::read_from(&bytes), record);
    }

    #[test]
    fn clamp_totals_zeroes_size_when_counter_negative() {
        let mut record = CounterRecord {
            total_file_counter: -3,
            total_file_size: 900,
            ..CounterRecord::default()
        };
        record.clamp_totals();
        assert_eq!(record.total_file_counter, 0);
        assert_eq!(record.total_file_size, 0);
    }
}
