//! Writes a worker's negated PID to the generic `SF_FIN_FIFO` (spec.md
//! §4.5 step 2), signalling "ready for more work" to the scheduler.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use afd_model::WorkerError;

/// Writes `-pid` as a fixed-size little-endian integer to `fifo_path`.
/// The fifo is expected to already exist (created by the supervisor); the
/// open call blocks until the scheduler has a reader attached.
///
/// # Errors
/// Returns [`WorkerError::Alloc`] if the fifo cannot be opened or written.
pub fn write_ready(fifo_path: &Path, pid: i32) -> Result<(), WorkerError> {
    let mut fifo = OpenOptions::new().write(true).open(fifo_path).map_err(|e| {
        WorkerError::Alloc(format!("opening fin-fifo {}: {e}", fifo_path.display()))
    })?;
    fifo.write_all(&(-pid).to_le_bytes())
        .map_err(|e| WorkerError::Alloc(format!("writing to fin-fifo: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;
    use std::io::Read;
    use std::thread;

    fn make_fifo(path: &Path) {
        let c_path = CString::new(path.to_str().unwrap()).unwrap();
        let rc = unsafe { libc::mkfifo(c_path.as_ptr(), 0o600) };
        assert_eq!(rc, 0, "mkfifo failed");
    }

    #[test]
    fn writes_negated_pid_as_fixed_size_le_integer() {
        let dir = tempfile::tempdir().unwrap();
        let fifo_path = dir.path().join("fin.fifo");
        make_fifo(&fifo_path);

        let reader_path = fifo_path.clone();
        let reader = thread::spawn(move || {
            let mut fifo = std::fs::File::open(&reader_path).unwrap();
            let mut buf = [0u8; 4];
            fifo.read_exact(&mut buf).unwrap();
            buf
        });

        write_ready(&fifo_path, 4242).unwrap();
        let bytes = reader.join().unwrap();
        assert_eq!(i32::from_le_bytes(bytes), -4242);
    }
}
