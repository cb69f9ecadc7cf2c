//! An in-memory, scriptable [`Transport`] for worker/burst/supervisor
//! tests, generalised from the per-test fakes each transfer-path test
//! module used to hand-roll.

use std::collections::{HashMap, VecDeque};

use afd_model::{Credentials, ProtocolOptions, WorkerError};
use afd_transport::{GetOutcome, ListOutcome, ListingEntry, PutResponse, Transport};

/// A [`Transport`] backed entirely by in-memory state, configured up
/// front with [`ScriptedTransport::with_listing`]/[`ScriptedTransport::with_body`]
/// and inspected afterwards through its public fields.
#[derive(Default)]
pub struct ScriptedTransport {
    listing: Vec<ListingEntry>,
    bodies: HashMap<String, Vec<u8>>,
    get_terminal: HashMap<String, u32>,
    read_cursor: VecDeque<u8>,
    /// Response [`Transport::put_response`] should report for every call.
    pub put_response: Option<PutResponse>,
    /// If `true`, [`Transport::noop`] fails with [`WorkerError::Noop`].
    pub fail_noop: bool,
    /// If `true`, [`Transport::delete`] fails with [`WorkerError::DeleteRemote`].
    pub fail_delete: bool,
    /// Number of times [`Transport::connect`] was called.
    pub connect_count: u32,
    /// `(path, name, size, first_in_session)` for every [`Transport::put`] call.
    pub puts: Vec<(String, String, u64, bool)>,
    /// Every byte slice passed to [`Transport::write`], concatenated.
    pub written: Vec<u8>,
    /// `(path, name)` for every [`Transport::delete`] call.
    pub deleted: Vec<(String, String)>,
    /// Number of times [`Transport::noop`] was called.
    pub noop_count: u32,
    /// Number of times [`Transport::quit`] was called.
    pub quit_count: u32,
}

impl ScriptedTransport {
    /// A transport with nothing configured yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the listing [`Transport::list`] returns.
    #[must_use]
    pub fn with_listing(mut self, entries: Vec<ListingEntry>) -> Self {
        self.listing = entries;
        self
    }

    /// Registers `name`'s full body so [`Transport::get`]/[`Transport::read`]
    /// can serve it (honouring the `offset` a caller passes to `get`).
    #[must_use]
    pub fn with_body(mut self, name: &str, bytes: impl Into<Vec<u8>>) -> Self {
        self.bodies.insert(name.to_string(), bytes.into());
        self
    }

    /// Makes [`Transport::get`] return `Terminal { code }` for `name`
    /// instead of serving a body.
    #[must_use]
    pub fn with_terminal(mut self, name: &str, code: u32) -> Self {
        self.get_terminal.insert(name.to_string(), code);
        self
    }

    /// Overrides the response [`Transport::put_response`] reports.
    #[must_use]
    pub fn with_put_response(mut self, response: PutResponse) -> Self {
        self.put_response = Some(response);
        self
    }
}

impl Transport for ScriptedTransport {
    fn connect(
        &mut self,
        _host: &str,
        _port: Option<u16>,
        _credentials: &Credentials,
        _options: ProtocolOptions,
    ) -> Result<(), WorkerError> {
        self.connect_count += 1;
        Ok(())
    }

    fn list(&mut self, _path: &str) -> Result<ListOutcome, WorkerError> {
        Ok(ListOutcome::Entries(self.listing.clone()))
    }

    fn get(&mut self, _path: &str, name: &str, offset: u64) -> Result<GetOutcome, WorkerError> {
        if let Some(&code) = self.get_terminal.get(name) {
            return Ok(GetOutcome::Terminal { code });
        }
        let body = self.bodies.get(name).cloned().unwrap_or_default();
        if offset as usize > body.len() {
            return Ok(GetOutcome::NothingToFetch);
        }
        self.read_cursor = body[offset as usize..].iter().copied().collect();
        Ok(GetOutcome::Success { expected_size: self.read_cursor.len() as u64 })
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, WorkerError> {
        let mut n = 0;
        while n < buf.len() {
            match self.read_cursor.pop_front() {
                Some(byte) => {
                    buf[n] = byte;
                    n += 1;
                }
                None => break,
            }
        }
        Ok(n)
    }

    fn put(&mut self, path: &str, name: &str, size: u64, first_in_session: bool) -> Result<(), WorkerError> {
        self.puts.push((path.to_string(), name.to_string(), size, first_in_session));
        Ok(())
    }

    fn write(&mut self, buf: &[u8]) -> Result<(), WorkerError> {
        self.written.extend_from_slice(buf);
        Ok(())
    }

    fn put_response(&mut self) -> Result<PutResponse, WorkerError> {
        Ok(self.put_response.unwrap_or(PutResponse::Accepted))
    }

    fn delete(&mut self, path: &str, name: &str) -> Result<(), WorkerError> {
        if self.fail_delete {
            return Err(WorkerError::DeleteRemote(format!("{path}/{name}")));
        }
        self.deleted.push((path.to_string(), name.to_string()));
        Ok(())
    }

    fn noop(&mut self) -> Result<(), WorkerError> {
        self.noop_count += 1;
        if self.fail_noop {
            return Err(WorkerError::Noop("connection gone".into()));
        }
        Ok(())
    }

    fn quit(&mut self) {
        self.quit_count += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serves_a_registered_body_from_the_requested_offset() {
        let mut transport = ScriptedTransport::new().with_body("a.dat", b"hello world".to_vec());
        let outcome = transport.get("/in", "a.dat", 6).unwrap();
        assert_eq!(outcome, GetOutcome::Success { expected_size: 5 });
        let mut buf = [0u8; 5];
        assert_eq!(transport.read(&mut buf).unwrap(), 5);
        assert_eq!(&buf, b"world");
    }

    #[test]
    fn reports_a_terminal_code_when_configured() {
        let mut transport = ScriptedTransport::new().with_terminal("missing.dat", 404);
        let outcome = transport.get("/in", "missing.dat", 0).unwrap();
        assert_eq!(outcome, GetOutcome::Terminal { code: 404 });
    }

    #[test]
    fn records_every_put_and_the_bytes_written() {
        let mut transport = ScriptedTransport::new();
        transport.put("/out", "a.dat", 3, true).unwrap();
        transport.write(b"abc").unwrap();
        assert_eq!(transport.puts, vec![("/out".to_string(), "a.dat".to_string(), 3, true)]);
        assert_eq!(transport.written, b"abc");
    }

    #[test]
    fn fail_noop_surfaces_as_a_noop_error() {
        let mut transport = ScriptedTransport { fail_noop: true, ..ScriptedTransport::new() };
        assert!(matches!(transport.noop(), Err(WorkerError::Noop(_))));
    }
}
