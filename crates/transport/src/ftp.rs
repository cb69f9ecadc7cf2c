//! Thin adapter over [`suppaftp`]'s blocking `FtpStream` (spec.md §4.1).

use std::io::{Cursor, Read};

use afd_model::{Credentials, ProtocolOptions, WorkerError};
use suppaftp::{FtpStream, Mode};

use crate::trait_def::{GetOutcome, ListOutcome, ListingEntry, PutResponse, Transport};

/// Implements [`Transport`] over plain or passive-mode FTP. Bodies are
/// buffered in memory per file (`retr_as_buffer`/`put_file`), matching
/// `suppaftp`'s whole-file transfer API.
#[derive(Default)]
pub struct FtpTransport {
    stream: Option<FtpStream>,
    read_cursor: Option<Cursor<Vec<u8>>>,
    pending_put: Option<(String, Vec<u8>)>,
}

impl FtpTransport {
    /// Creates a transport with no active connection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn stream_mut(&mut self) -> Result<&mut FtpStream, WorkerError> {
        self.stream
            .as_mut()
            .ok_or_else(|| WorkerError::Connect("not connected".into()))
    }
}

impl Transport for FtpTransport {
    fn connect(
        &mut self,
        host: &str,
        port: Option<u16>,
        credentials: &Credentials,
        options: ProtocolOptions,
    ) -> Result<(), WorkerError> {
        let port = port.unwrap_or(21);
        let mut stream = FtpStream::connect(format!("{host}:{port}"))
            .map_err(|e| WorkerError::Connect(e.to_string()))?;
        stream
            .login(&credentials.user, &credentials.password)
            .map_err(|e| WorkerError::Connect(e.to_string()))?;
        if options.has(ProtocolOptions::EXTENDED) {
            stream.set_mode(Mode::ExtendedPassive);
        } else if options.has(ProtocolOptions::PASSIVE) {
            stream.set_mode(Mode::Passive);
        } else {
            stream.set_mode(Mode::Active);
        }
        self.stream = Some(stream);
        Ok(())
    }

    fn list(&mut self, path: &str) -> Result<ListOutcome, WorkerError> {
        let stream = self.stream_mut()?;
        let names = stream
            .nlst(Some(path))
            .map_err(|e| WorkerError::ReadRemote(e.to_string()))?;
        Ok(ListOutcome::Entries(
            names
                .into_iter()
                .map(|name| ListingEntry { name, size: None, mtime: None, extra: None })
                .collect(),
        ))
    }

    fn get(&mut self, path: &str, name: &str, offset: u64) -> Result<GetOutcome, WorkerError> {
        let remote = format!("{}/{}", path.trim_end_matches('/'), name);
        let stream = self.stream_mut()?;
        let mut buffer = match stream.retr_as_buffer(&remote) {
            Ok(cursor) => cursor,
            Err(e) if e.to_string().contains("550") => return Ok(GetOutcome::Terminal { code: 404 }),
            Err(e) => return Err(WorkerError::ReadRemote(e.to_string())),
        };
        if offset > 0 {
            let bytes = buffer.get_ref().clone();
            let remaining = bytes.get(offset as usize..).unwrap_or_default().to_vec();
            buffer = Cursor::new(remaining);
        }
        let expected_size = buffer.get_ref().len() as u64;
        self.read_cursor = Some(buffer);
        Ok(GetOutcome::Success { expected_size })
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, WorkerError> {
        let cursor = self
            .read_cursor
            .as_mut()
            .ok_or_else(|| WorkerError::ReadRemote("no active get()".into()))?;
        cursor.read(buf).map_err(|e| WorkerError::ReadRemote(e.to_string()))
    }

    fn put(
        &mut self,
        path: &str,
        name: &str,
        size: u64,
        _first_in_session: bool,
    ) -> Result<(), WorkerError> {
        let remote = format!("{}/{}", path.trim_end_matches('/'), name);
        self.pending_put = Some((remote, Vec::with_capacity(size as usize)));
        Ok(())
    }

    fn write(&mut self, buf: &[u8]) -> Result<(), WorkerError> {
        let (_, buffer) = self
            .pending_put
            .as_mut()
            .ok_or_else(|| WorkerError::WriteRemote(std::io::Error::other("no active put()")))?;
        buffer.extend_from_slice(buf);
        Ok(())
    }

    fn put_response(&mut self) -> Result<PutResponse, WorkerError> {
        let (remote, buffer) = self
            .pending_put
            .take()
            .ok_or_else(|| WorkerError::WriteRemote(std::io::Error::other("no active put()")))?;
        let stream = self.stream_mut()?;
        stream
            .put_file(&remote, &mut Cursor::new(buffer))
            .map_err(|e| WorkerError::WriteRemote(std::io::Error::other(e.to_string())))?;
        Ok(PutResponse::Accepted)
    }

    fn delete(&mut self, path: &str, name: &str) -> Result<(), WorkerError> {
        let remote = format!("{}/{}", path.trim_end_matches('/'), name);
        let stream = self.stream_mut()?;
        stream
            .rm(&remote)
            .map_err(|e| WorkerError::DeleteRemote(e.to_string()))
    }

    fn noop(&mut self) -> Result<(), WorkerError> {
        let stream = self.stream_mut()?;
        stream.noop().map_err(|e| WorkerError::Noop(e.to_string()))
    }

    fn quit(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.quit();
        }
        self.read_cursor = None;
        self.pending_put = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_without_put_is_rejected() {
        let mut transport = FtpTransport::new();
        assert!(transport.write(b"x").is_err());
    }

    #[test]
    fn put_buffers_bytes_under_the_resolved_remote_path() {
        let mut transport = FtpTransport::new();
        transport.put("/incoming", "a.dat", 3, true).unwrap();
        transport.write(b"abc").unwrap();
        let (remote, buffer) = transport.pending_put.as_ref().unwrap();
        assert_eq!(remote, "/incoming/a.dat");
        assert_eq!(buffer.as_slice(), b"abc");
    }
}
