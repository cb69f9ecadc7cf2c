//! Hand-rolled SMTP submission client (spec.md §4.1: "`SmtpTransport`
//! implements `put`/`put_response`... only"). The workspace's dependency
//! stack has no mail library, and the SMTP command/response protocol is
//! small enough to implement directly over `std::net::TcpStream` as a thin
//! adapter, the same role a crate would otherwise fill (see DESIGN.md).

use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;

use afd_model::{Credentials, ProtocolOptions, WorkerError};

use crate::trait_def::{GetOutcome, ListOutcome, PutResponse, Transport};

/// Implements the send-only half of [`Transport`] by speaking raw SMTP.
/// `path` (from [`Transport::put`]) is the envelope recipient; `name` is
/// used as the `Subject:` header.
pub struct SmtpTransport {
    writer: Option<TcpStream>,
    reader: Option<BufReader<TcpStream>>,
    sender: String,
    pending: Option<(String, String)>,
    body: Vec<u8>,
}

impl Default for SmtpTransport {
    fn default() -> Self {
        Self {
            writer: None,
            reader: None,
            sender: String::new(),
            pending: None,
            body: Vec::new(),
        }
    }
}

impl SmtpTransport {
    /// Creates a transport with no active connection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn send_command(&mut self, command: &str) -> Result<(u16, String), WorkerError> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| WorkerError::Connect("not connected".into()))?;
        writer
            .write_all(format!("{command}\r\n").as_bytes())
            .map_err(WorkerError::WriteRemote)?;
        self.read_response()
    }

    /// Reads one SMTP response, following `###-` continuation lines until a
    /// final `### ` line.
    fn read_response(&mut self) -> Result<(u16, String), WorkerError> {
        let reader = self
            .reader
            .as_mut()
            .ok_or_else(|| WorkerError::Connect("not connected".into()))?;
        let mut code = 0u16;
        let mut text = String::new();
        loop {
            let mut line = String::new();
            let n = reader
                .read_line(&mut line)
                .map_err(|e| WorkerError::ReadRemote(e.to_string()))?;
            if n == 0 {
                return Err(WorkerError::ReadRemote("connection closed mid-response".into()));
            }
            let line = line.trim_end();
            if line.len() < 4 {
                return Err(WorkerError::ReadRemote(format!("malformed SMTP line: {line}")));
            }
            code = line[..3]
                .parse()
                .map_err(|_| WorkerError::ReadRemote(format!("malformed SMTP code: {line}")))?;
            text.push_str(&line[4..]);
            if line.as_bytes()[3] == b' ' {
                break;
            }
            text.push('\n');
        }
        Ok((code, text))
    }

    fn expect(code: u16, expected: u16, text: &str) -> Result<(), WorkerError> {
        if code == expected {
            Ok(())
        } else {
            Err(WorkerError::WriteRemote(std::io::Error::other(format!(
                "smtp error {code}: {text}"
            ))))
        }
    }
}

impl Transport for SmtpTransport {
    fn connect(
        &mut self,
        host: &str,
        port: Option<u16>,
        credentials: &Credentials,
        _options: ProtocolOptions,
    ) -> Result<(), WorkerError> {
        let port = port.unwrap_or(25);
        let stream = TcpStream::connect((host, port)).map_err(|e| WorkerError::Connect(e.to_string()))?;
        let reader_half = stream.try_clone().map_err(|e| WorkerError::Connect(e.to_string()))?;
        self.writer = Some(stream);
        self.reader = Some(BufReader::new(reader_half));
        self.sender = credentials.user.clone();

        let (code, text) = self.read_response()?;
        Self::expect(code, 220, &text)?;
        let (code, text) = self.send_command("EHLO afd-transfer-core")?;
        Self::expect(code, 250, &text)
    }

    fn list(&mut self, _path: &str) -> Result<ListOutcome, WorkerError> {
        Ok(ListOutcome::Unsupported)
    }

    fn get(&mut self, _path: &str, _name: &str, _offset: u64) -> Result<GetOutcome, WorkerError> {
        Err(WorkerError::ReadRemote("SmtpTransport is send-only".into()))
    }

    fn read(&mut self, _buf: &mut [u8]) -> Result<usize, WorkerError> {
        Err(WorkerError::ReadRemote("SmtpTransport is send-only".into()))
    }

    fn put(
        &mut self,
        path: &str,
        name: &str,
        _size: u64,
        _first_in_session: bool,
    ) -> Result<(), WorkerError> {
        let (code, text) = self.send_command(&format!("MAIL FROM:<{}>", self.sender))?;
        Self::expect(code, 250, &text)?;
        let (code, text) = self.send_command(&format!("RCPT TO:<{path}>"))?;
        Self::expect(code, 250, &text)?;
        let (code, text) = self.send_command("DATA")?;
        Self::expect(code, 354, &text)?;
        self.pending = Some((path.to_string(), name.to_string()));
        self.body.clear();
        Ok(())
    }

    fn write(&mut self, buf: &[u8]) -> Result<(), WorkerError> {
        if self.pending.is_none() {
            return Err(WorkerError::WriteRemote(std::io::Error::other("no active put()")));
        }
        self.body.extend_from_slice(buf);
        Ok(())
    }

    fn put_response(&mut self) -> Result<PutResponse, WorkerError> {
        let (recipient, subject) = self
            .pending
            .take()
            .ok_or_else(|| WorkerError::WriteRemote(std::io::Error::other("no active put()")))?;
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| WorkerError::Connect("not connected".into()))?;
        let header = format!("From: {}\r\nTo: {recipient}\r\nSubject: {subject}\r\n\r\n", self.sender);
        writer.write_all(header.as_bytes()).map_err(WorkerError::WriteRemote)?;
        for line in self.body.split_inclusive(|&b| b == b'\n') {
            if line.starts_with(b".") {
                writer.write_all(b".").map_err(WorkerError::WriteRemote)?;
            }
            writer.write_all(line).map_err(WorkerError::WriteRemote)?;
        }
        writer.write_all(b"\r\n.\r\n").map_err(WorkerError::WriteRemote)?;
        let (code, text) = self.read_response()?;
        Self::expect(code, 250, &text)?;
        Ok(PutResponse::Accepted)
    }

    fn delete(&mut self, _path: &str, _name: &str) -> Result<(), WorkerError> {
        Err(WorkerError::DeleteRemote("SmtpTransport has no remote delete".into()))
    }

    fn noop(&mut self) -> Result<(), WorkerError> {
        let (code, text) = self.send_command("NOOP")?;
        Self::expect(code, 250, &text)
    }

    fn quit(&mut self) {
        let _ = self.send_command("QUIT");
        self.writer = None;
        self.reader = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn happy_path_submission_round_trip() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut writer = stream;
            writer.write_all(b"220 ready\r\n").unwrap();

            let mut line = String::new();
            reader.read_line(&mut line).unwrap(); // EHLO
            writer.write_all(b"250 ok\r\n").unwrap();

            line.clear();
            reader.read_line(&mut line).unwrap(); // MAIL FROM
            writer.write_all(b"250 ok\r\n").unwrap();

            line.clear();
            reader.read_line(&mut line).unwrap(); // RCPT TO
            writer.write_all(b"250 ok\r\n").unwrap();

            line.clear();
            reader.read_line(&mut line).unwrap(); // DATA
            writer.write_all(b"354 go ahead\r\n").unwrap();

            let mut body = Vec::new();
            let mut buf = [0u8; 1];
            loop {
                reader.read_exact(&mut buf).unwrap();
                body.push(buf[0]);
                if body.ends_with(b"\r\n.\r\n") {
                    break;
                }
            }
            writer.write_all(b"250 accepted\r\n").unwrap();
            String::from_utf8(body).unwrap()
        });

        let mut transport = SmtpTransport::new();
        transport
            .connect(
                "127.0.0.1",
                Some(addr.port()),
                &Credentials { user: "sender@example.invalid".into(), password: String::new() },
                ProtocolOptions::empty(),
            )
            .unwrap();
        transport.put("recipient@example.invalid", "report.txt", 5, true).unwrap();
        transport.write(b"hello").unwrap();
        let response = transport.put_response().unwrap();
        assert_eq!(response, PutResponse::Accepted);
        transport.quit();

        let body = server.join().unwrap();
        assert!(body.contains("hello"));
    }
}
