//! `EXEC` protocol: runs a configured local command once per file instead
//! of speaking a wire protocol. `host` (from [`Transport::connect`]) names
//! the executable; it is invoked as `<host> <verb> <path> <name>` with the
//! file body on stdin (`put`) or stdout (`get`).

use std::io::{Read, Write};
use std::process::{Child, Command, Stdio};

use afd_model::{Credentials, ProtocolOptions, WorkerError};

use crate::trait_def::{GetOutcome, ListOutcome, PutResponse, Transport};

/// Implements [`Transport`] by shelling out to a configured command per
/// file rather than holding a persistent connection.
#[derive(Default)]
pub struct ExecTransport {
    command: String,
    read_child: Option<Child>,
    write_child: Option<Child>,
}

impl ExecTransport {
    /// Creates a transport with no configured command.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn spawn(&self, verb: &str, path: &str, name: &str, stdin: Stdio, stdout: Stdio) -> std::io::Result<Child> {
        Command::new(&self.command)
            .arg(verb)
            .arg(path)
            .arg(name)
            .stdin(stdin)
            .stdout(stdout)
            .stderr(Stdio::null())
            .spawn()
    }
}

impl Transport for ExecTransport {
    fn connect(
        &mut self,
        host: &str,
        _port: Option<u16>,
        _credentials: &Credentials,
        _options: ProtocolOptions,
    ) -> Result<(), WorkerError> {
        self.command = host.to_string();
        Ok(())
    }

    fn list(&mut self, path: &str) -> Result<ListOutcome, WorkerError> {
        let output = Command::new(&self.command)
            .arg("list")
            .arg(path)
            .output()
            .map_err(|e| WorkerError::ReadRemote(e.to_string()))?;
        if !output.status.success() {
            return Err(WorkerError::ReadRemote(format!(
                "exec list exited with {}",
                output.status
            )));
        }
        let text = String::from_utf8_lossy(&output.stdout);
        Ok(ListOutcome::Entries(
            text.lines()
                .filter(|line| !line.is_empty())
                .map(|name| crate::trait_def::ListingEntry {
                    name: name.to_string(),
                    size: None,
                    mtime: None,
                    extra: None,
                })
                .collect(),
        ))
    }

    fn get(&mut self, path: &str, name: &str, _offset: u64) -> Result<GetOutcome, WorkerError> {
        let mut child = self
            .spawn("get", path, name, Stdio::null(), Stdio::piped())
            .map_err(|e| WorkerError::ReadRemote(e.to_string()))?;
        if child.stdout.is_none() {
            return Err(WorkerError::ReadRemote("exec child produced no stdout pipe".into()));
        }
        self.read_child = Some(child);
        Ok(GetOutcome::Chunked)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, WorkerError> {
        let child = self
            .read_child
            .as_mut()
            .ok_or_else(|| WorkerError::ReadRemote("no active get()".into()))?;
        let stdout = child
            .stdout
            .as_mut()
            .ok_or_else(|| WorkerError::ReadRemote("exec child stdout already closed".into()))?;
        let n = stdout.read(buf).map_err(|e| WorkerError::ReadRemote(e.to_string()))?;
        if n == 0 {
            let status = self
                .read_child
                .take()
                .unwrap()
                .wait()
                .map_err(|e| WorkerError::ReadRemote(e.to_string()))?;
            if !status.success() {
                return Err(WorkerError::ReadRemote(format!("exec get exited with {status}")));
            }
        }
        Ok(n)
    }

    fn put(
        &mut self,
        path: &str,
        name: &str,
        _size: u64,
        _first_in_session: bool,
    ) -> Result<(), WorkerError> {
        let child = self
            .spawn("put", path, name, Stdio::piped(), Stdio::null())
            .map_err(WorkerError::WriteRemote)?;
        self.write_child = Some(child);
        Ok(())
    }

    fn write(&mut self, buf: &[u8]) -> Result<(), WorkerError> {
        let child = self
            .write_child
            .as_mut()
            .ok_or_else(|| WorkerError::WriteRemote(std::io::Error::other("no active put()")))?;
        let stdin = child
            .stdin
            .as_mut()
            .ok_or_else(|| WorkerError::WriteRemote(std::io::Error::other("exec child stdin already closed")))?;
        stdin.write_all(buf).map_err(WorkerError::WriteRemote)
    }

    fn put_response(&mut self) -> Result<PutResponse, WorkerError> {
        let mut child = self
            .write_child
            .take()
            .ok_or_else(|| WorkerError::WriteRemote(std::io::Error::other("no active put()")))?;
        drop(child.stdin.take());
        let status = child.wait().map_err(WorkerError::WriteRemote)?;
        if !status.success() {
            return Err(WorkerError::WriteRemote(std::io::Error::other(format!(
                "exec put exited with {status}"
            ))));
        }
        Ok(PutResponse::Accepted)
    }

    fn delete(&mut self, path: &str, name: &str) -> Result<(), WorkerError> {
        let status = Command::new(&self.command)
            .arg("rm")
            .arg(path)
            .arg(name)
            .status()
            .map_err(|e| WorkerError::DeleteRemote(e.to_string()))?;
        if status.success() {
            Ok(())
        } else {
            Err(WorkerError::DeleteRemote(format!("exec rm exited with {status}")))
        }
    }

    fn noop(&mut self) -> Result<(), WorkerError> {
        Ok(())
    }

    fn quit(&mut self) {
        if let Some(mut child) = self.read_child.take() {
            let _ = child.kill();
        }
        if let Some(mut child) = self.write_child.take() {
            let _ = child.kill();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_cat_style_script() {
        let dir = tempfile::tempdir().unwrap();
        let script_path = dir.path().join("handler.sh");
        std::fs::write(
            &script_path,
            "#!/bin/sh\ncase \"$1\" in\n  put) cat > \"$2/$3\" ;;\n  get) cat \"$2/$3\" ;;\nesac\n",
        )
        .unwrap();
        let mut perms = std::fs::metadata(&script_path).unwrap().permissions();
        std::os::unix::fs::PermissionsExt::set_mode(&mut perms, 0o755);
        std::fs::set_permissions(&script_path, perms).unwrap();

        let mut transport = ExecTransport::new();
        transport
            .connect(script_path.to_str().unwrap(), None, &Credentials::default(), ProtocolOptions::empty())
            .unwrap();

        transport.put(dir.path().to_str().unwrap(), "a.dat", 5, true).unwrap();
        transport.write(b"hello").unwrap();
        assert_eq!(transport.put_response().unwrap(), PutResponse::Accepted);

        transport.get(dir.path().to_str().unwrap(), "a.dat", 0).unwrap();
        let mut collected = Vec::new();
        let mut buf = [0u8; 4];
        loop {
            let n = transport.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            collected.extend_from_slice(&buf[..n]);
        }
        assert_eq!(collected, b"hello");
    }
}
