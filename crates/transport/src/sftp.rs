//! Thin adapter over an [`ssh2`] SFTP session (spec.md §4.1).

use std::io::{Read, Seek, SeekFrom, Write};
use std::net::TcpStream;
use std::path::{Path, PathBuf};

use afd_model::{Credentials, ProtocolOptions, WorkerError};
use ssh2::{Session, Sftp};

use crate::trait_def::{GetOutcome, ListOutcome, ListingEntry, PutResponse, Transport};

/// Implements [`Transport`] over SFTP (password auth). The underlying TCP
/// stream and libssh2 session handle are kept alive for the lifetime of
/// the connection; `File` handles opened via [`Sftp::open`]/[`Sftp::create`]
/// hold their own reference to the session internally.
#[derive(Default)]
pub struct SftpTransport {
    _tcp: Option<TcpStream>,
    session: Option<Session>,
    sftp: Option<Sftp>,
    read_file: Option<ssh2::File>,
    write_file: Option<ssh2::File>,
}

impl SftpTransport {
    /// Creates a transport with no active connection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn sftp_mut(&mut self) -> Result<&mut Sftp, WorkerError> {
        self.sftp
            .as_mut()
            .ok_or_else(|| WorkerError::Connect("not connected".into()))
    }
}

impl Transport for SftpTransport {
    fn connect(
        &mut self,
        host: &str,
        port: Option<u16>,
        credentials: &Credentials,
        _options: ProtocolOptions,
    ) -> Result<(), WorkerError> {
        let port = port.unwrap_or(22);
        let tcp = TcpStream::connect((host, port)).map_err(|e| WorkerError::Connect(e.to_string()))?;
        let mut session = Session::new().map_err(|e| WorkerError::Connect(e.to_string()))?;
        session.set_tcp_stream(tcp.try_clone().map_err(|e| WorkerError::Connect(e.to_string()))?);
        session.handshake().map_err(|e| WorkerError::Connect(e.to_string()))?;
        session
            .userauth_password(&credentials.user, &credentials.password)
            .map_err(|e| WorkerError::Connect(e.to_string()))?;
        if !session.authenticated() {
            return Err(WorkerError::Connect("sftp authentication rejected".into()));
        }
        let sftp = session.sftp().map_err(|e| WorkerError::Connect(e.to_string()))?;
        self._tcp = Some(tcp);
        self.session = Some(session);
        self.sftp = Some(sftp);
        Ok(())
    }

    fn list(&mut self, path: &str) -> Result<ListOutcome, WorkerError> {
        let sftp = self.sftp_mut()?;
        let listing = sftp
            .readdir(Path::new(path))
            .map_err(|e| WorkerError::ReadRemote(e.to_string()))?;
        let entries = listing
            .into_iter()
            .filter(|(_, stat)| stat.is_file())
            .map(|(entry_path, stat)| ListingEntry {
                name: entry_path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                size: stat.size,
                mtime: stat.mtime.map(|t| t as i64),
                extra: None,
            })
            .collect();
        Ok(ListOutcome::Entries(entries))
    }

    fn get(&mut self, path: &str, name: &str, offset: u64) -> Result<GetOutcome, WorkerError> {
        let remote: PathBuf = Path::new(path).join(name);
        let sftp = self.sftp_mut()?;
        let stat = match sftp.stat(&remote) {
            Ok(stat) => stat,
            Err(_) => return Ok(GetOutcome::Terminal { code: 404 }),
        };
        let mut file = sftp.open(&remote).map_err(|e| WorkerError::ReadRemote(e.to_string()))?;
        if offset > 0 {
            file.seek(SeekFrom::Start(offset))
                .map_err(|e| WorkerError::ReadRemote(e.to_string()))?;
        }
        let expected_size = stat.size.unwrap_or(0).saturating_sub(offset);
        self.read_file = Some(file);
        Ok(GetOutcome::Success { expected_size })
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
        let remote: PathBuf = Path::new(path).join(name);
        let sftp = self.sftp_mut()?;
        let file = sftp
            .create(&remote)
            .map_err(|e| WorkerError::WriteRemote(std::io::Error::other(e.to_string())))?;
        self.write_file = Some(file);
        Ok(())
    }

    fn write(&mut self, buf: &[u8]) -> Result<(), WorkerError> {
        let file = self
            .write_file
            .as_mut()
            .ok_or_else(|| WorkerError::WriteRemote(std::io::Error::other("no active put()")))?;
        file.write_all(buf).map_err(WorkerError::WriteRemote)
    }

    fn put_response(&mut self) -> Result<PutResponse, WorkerError> {
        self.write_file
            .take()
            .ok_or_else(|| WorkerError::WriteRemote(std::io::Error::other("no active put()")))?;
        Ok(PutResponse::Accepted)
    }

    fn delete(&mut self, path: &str, name: &str) -> Result<(), WorkerError> {
        let remote: PathBuf = Path::new(path).join(name);
        let sftp = self.sftp_mut()?;
        sftp.unlink(&remote)
            .map_err(|e| WorkerError::DeleteRemote(e.to_string()))
    }

    fn noop(&mut self) -> Result<(), WorkerError> {
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| WorkerError::Noop("not connected".into()))?;
        session
            .keepalive_send()
            .map_err(|e| WorkerError::Noop(e.to_string()))?;
        Ok(())
    }

    fn quit(&mut self) {
        self.read_file = None;
        self.write_file = None;
        self.sftp = None;
        self.session = None;
        self._tcp = None;
    }
}
