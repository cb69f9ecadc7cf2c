//! The per-protocol transfer contract (spec.md §4.1).

use afd_model::{Credentials, ProtocolOptions, WorkerError};

/// One entry from [`Transport::list`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListingEntry {
    /// File name, relative to the listed directory.
    pub name: String,
    /// Size in bytes, if the protocol reports it inline.
    pub size: Option<u64>,
    /// Modification time (Unix seconds), if the protocol reports it inline.
    pub mtime: Option<i64>,
    /// Protocol-specific extra text the fetch worker does not interpret
    /// (e.g. a raw `LIST` permissions column), kept for logging only.
    pub extra: Option<String>,
}

/// Result of [`Transport::list`]: either a finite listing or an explicit
/// "this protocol has no directory listing" signal, which is not an error
/// (spec.md §4.1: "`list` may be unsupported on some protocols").
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ListOutcome {
    /// The directory listing, in protocol order.
    Entries(Vec<ListingEntry>),
    /// This transport has no concept of directory listing.
    Unsupported,
}

/// Result of [`Transport::get`] (spec.md §4.1).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GetOutcome {
    /// The remote reported a fixed body length up front.
    Success {
        /// The body length the remote advertised.
        expected_size: u64,
    },
    /// The body length is only known block by block (chunked encoding).
    Chunked,
    /// The remote has nothing to serve at this path (not an error).
    NothingToFetch,
    /// A terminal, non-connection-fatal per-file failure (an HTTP-like
    /// 301/400/404 or protocol analogue).
    Terminal {
        /// The protocol status code.
        code: u32,
    },
}

/// Result of [`Transport::put_response`] (spec.md §4.1).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PutResponse {
    /// The file was accepted and the connection is still usable.
    Accepted,
    /// The file was accepted but the remote cycled the connection; the
    /// worker should treat this job as "still files to send" rather than
    /// retry the same connection.
    ConnectionReopened,
}

/// Uniform per-protocol transfer contract (spec.md §4.1). A worker holds
/// exactly one `Box<dyn Transport>` for the lifetime of its connection;
/// all state the implementation keeps is the socket plus a protocol
/// cursor, never filesystem side effects.
pub trait Transport {
    /// Opens a connection. On success the connection is "open" until
    /// [`Transport::quit`].
    ///
    /// # Errors
    /// Returns [`WorkerError::Connect`] on DNS failure, refused connection,
    /// TLS handshake failure, or authentication rejection.
    fn connect(
        &mut self,
        host: &str,
        port: Option<u16>,
        credentials: &Credentials,
        options: ProtocolOptions,
    ) -> Result<(), WorkerError>;

    /// Lists `path`. Returns [`ListOutcome::Unsupported`], not an error,
    /// for protocols with no listing concept.
    ///
    /// # Errors
    /// Returns [`WorkerError::ReadRemote`] if the listing could not be
    /// retrieved.
    fn list(&mut self, path: &str) -> Result<ListOutcome, WorkerError>;

    /// Starts a body read for `path`/`name` at `offset`.
    ///
    /// # Errors
    /// Returns [`WorkerError::OpenRemote`] for a terminal per-file
    /// rejection represented outside [`GetOutcome::Terminal`], or
    /// [`WorkerError::ReadRemote`] for a connection-level failure.
    fn get(&mut self, path: &str, name: &str, offset: u64) -> Result<GetOutcome, WorkerError>;

    /// Reads body bytes for the transfer started by [`Transport::get`].
    /// Returns `0` at end of body.
    ///
    /// # Errors
    /// Returns [`WorkerError::ReadRemote`] on a connection failure.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, WorkerError>;

    /// Reads body bytes for a [`GetOutcome::Chunked`] transfer. Returns `0`
    /// at the final chunk. The default forwards to [`Transport::read`];
    /// adapters whose chunk framing differs from their fixed-length body
    /// framing should override this.
    ///
    /// # Errors
    /// Returns [`WorkerError::ReadRemote`] on a connection failure or
    /// malformed chunk framing.
    fn chunk_read(&mut self, buf: &mut [u8]) -> Result<usize, WorkerError> {
        self.read(buf)
    }

    /// Opens `path`/`name` for upload of `size` bytes.
    /// `first_in_session` lets an adapter send a session-opening preamble
    /// (e.g. HTTP `Expect`) only once per connection.
    ///
    /// # Errors
    /// Returns [`WorkerError::OpenRemote`] if the remote refuses the path,
    /// or [`WorkerError::WriteRemote`] on a connection failure.
    fn put(
        &mut self,
        path: &str,
        name: &str,
        size: u64,
        first_in_session: bool,
    ) -> Result<(), WorkerError>;

    /// Writes body bytes for the transfer started by [`Transport::put`].
    ///
    /// # Errors
    /// Returns [`WorkerError::WriteRemote`] on a connection failure.
    fn write(&mut self, buf: &[u8]) -> Result<(), WorkerError>;

    /// Finalises the transfer started by [`Transport::put`].
    ///
    /// # Errors
    /// Returns [`WorkerError::WriteRemote`] if the remote rejected the
    /// upload.
    fn put_response(&mut self) -> Result<PutResponse, WorkerError>;

    /// Deletes `path`/`name` from the remote.
    ///
    /// # Errors
    /// Returns [`WorkerError::DeleteRemote`] on failure.
    fn delete(&mut self, path: &str, name: &str) -> Result<(), WorkerError>;

    /// Sends a keep-alive probe. Failure means the connection is gone.
    ///
    /// # Errors
    /// Returns [`WorkerError::Noop`] if the probe failed.
    fn noop(&mut self) -> Result<(), WorkerError>;

    /// Best-effort teardown. Never fails the caller's exit code.
    fn quit(&mut self);
}
