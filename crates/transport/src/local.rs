//! `LOC` protocol: filesystem copy/rename between two local paths.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use afd_model::{Credentials, ProtocolOptions, WorkerError};

use crate::trait_def::{GetOutcome, ListOutcome, ListingEntry, PutResponse, Transport};

/// Implements [`Transport`] over the local filesystem. `connect` is a
/// no-op; `host` is ignored and paths are interpreted relative to the
/// process's working directory.
#[derive(Default)]
pub struct LocalTransport {
    read_file: Option<File>,
    write_state: Option<(PathBuf, File)>,
}

impl LocalTransport {
    /// Creates a transport with no open file handles.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Transport for LocalTransport {
    fn connect(
        &mut self,
        _host: &str,
        _port: Option<u16>,
        _credentials: &Credentials,
        _options: ProtocolOptions,
    ) -> Result<(), WorkerError> {
        Ok(())
    }

    fn list(&mut self, path: &str) -> Result<ListOutcome, WorkerError> {
        let dir = fs::read_dir(path).map_err(|e| WorkerError::ReadRemote(e.to_string()))?;
        let mut entries = Vec::new();
        for entry in dir {
            let entry = entry.map_err(|e| WorkerError::ReadRemote(e.to_string()))?;
            let metadata = entry.metadata().map_err(|e| WorkerError::ReadRemote(e.to_string()))?;
            if !metadata.is_file() {
                continue;
            }
            let mtime = metadata
                .modified()
                .ok()
                .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                .map(|d| d.as_secs() as i64);
            entries.push(ListingEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                size: Some(metadata.len()),
                mtime,
                extra: None,
            });
        }
        Ok(ListOutcome::Entries(entries))
    }

    fn get(&mut self, path: &str, name: &str, offset: u64) -> Result<GetOutcome, WorkerError> {
        let full = Path::new(path).join(name);
        let metadata = match fs::metadata(&full) {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(GetOutcome::Terminal { code: 404 })
            }
            Err(e) => return Err(WorkerError::ReadRemote(e.to_string())),
        };
        let mut file = File::open(&full).map_err(|e| WorkerError::ReadRemote(e.to_string()))?;
        if offset > 0 {
            use std::io::{Seek, SeekFrom};
            file.seek(SeekFrom::Start(offset))
                .map_err(|e| WorkerError::ReadRemote(e.to_string()))?;
        }
        self.read_file = Some(file);
        Ok(GetOutcome::Success {
            expected_size: metadata.len().saturating_sub(offset),
        })
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, WorkerError> {
        let file = self
            .read_file
            .as_mut()
            .ok_or_else(|| WorkerError::ReadRemote("no active get()".into()))?;
        file.read(buf).map_err(|e| WorkerError::ReadRemote(e.to_string()))
    }

    fn put(
        &mut self,
        path: &str,
        name: &str,
        _size: u64,
        _first_in_session: bool,
    ) -> Result<(), WorkerError> {
        let dir = Path::new(path);
        fs::create_dir_all(dir).map_err(WorkerError::WriteLocal)?;
        let tmp_name = format!(".{name}.afd-tmp");
        let tmp_path = dir.join(&tmp_name);
        let file = File::create(&tmp_path).map_err(WorkerError::WriteLocal)?;
        self.write_state = Some((dir.join(name), file));
        Ok(())
    }

    fn write(&mut self, buf: &[u8]) -> Result<(), WorkerError> {
        let (_, file) = self
            .write_state
            .as_mut()
            .ok_or_else(|| WorkerError::WriteRemote(std::io::Error::other("no active put()")))?;
        file.write_all(buf).map_err(WorkerError::WriteRemote)
    }

    fn put_response(&mut self) -> Result<PutResponse, WorkerError> {
        let (final_path, file) = self
            .write_state
            .take()
            .ok_or_else(|| WorkerError::WriteRemote(std::io::Error::other("no active put()")))?;
        drop(file);
        let dir = final_path.parent().unwrap_or_else(|| Path::new("."));
        let tmp_path = dir.join(format!(
            ".{}.afd-tmp",
            final_path.file_name().and_then(|n| n.to_str()).unwrap_or_default()
        ));
        fs::rename(&tmp_path, &final_path).map_err(WorkerError::WriteLocal)?;
        Ok(PutResponse::Accepted)
    }

    fn delete(&mut self, path: &str, name: &str) -> Result<(), WorkerError> {
        fs::remove_file(Path::new(path).join(name))
            .map_err(|e| WorkerError::DeleteRemote(e.to_string()))
    }

    fn noop(&mut self) -> Result<(), WorkerError> {
        Ok(())
    }

    fn quit(&mut self) {
        self.read_file = None;
        self.write_state = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_file_through_put_and_get() {
        let src_dir = tempfile::tempdir().unwrap();
        let dst_dir = tempfile::tempdir().unwrap();
        std::fs::write(src_dir.path().join("a.dat"), b"payload").unwrap();

        let mut transport = LocalTransport::new();
        let outcome = transport
            .get(src_dir.path().to_str().unwrap(), "a.dat", 0)
            .unwrap();
        assert_eq!(outcome, GetOutcome::Success { expected_size: 7 });
        let mut buf = [0u8; 16];
        let n = transport.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"payload");

        transport
            .put(dst_dir.path().to_str().unwrap(), "a.dat", 7, true)
            .unwrap();
        transport.write(&buf[..n]).unwrap();
        let response = transport.put_response().unwrap();
        assert_eq!(response, PutResponse::Accepted);
        assert_eq!(
            std::fs::read(dst_dir.path().join("a.dat")).unwrap(),
            b"payload"
        );
    }

    #[test]
    fn get_of_missing_file_is_terminal_404() {
        let dir = tempfile::tempdir().unwrap();
        let mut transport = LocalTransport::new();
        let outcome = transport
            .get(dir.path().to_str().unwrap(), "missing.dat", 0)
            .unwrap();
        assert_eq!(outcome, GetOutcome::Terminal { code: 404 });
    }

    #[test]
    fn list_reports_only_files_with_sizes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.dat"), b"x").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        let mut transport = LocalTransport::new();
        let ListOutcome::Entries(entries) = transport.list(dir.path().to_str().unwrap()).unwrap()
        else {
            panic!("expected Entries");
        };
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "a.dat");
        assert_eq!(entries[0].size, Some(1));
    }

    #[test]
    fn delete_removes_the_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.dat"), b"x").unwrap();
        let mut transport = LocalTransport::new();
        transport.delete(dir.path().to_str().unwrap(), "a.dat").unwrap();
        assert!(!dir.path().join("a.dat").exists());
    }
}
