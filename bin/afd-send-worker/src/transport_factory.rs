//! Picks the concrete [`Transport`] adapter for a job's protocol scheme
//! (spec.md §4.1 "one adapter per protocol").

use afd_transport::{ExecTransport, FtpTransport, HttpTransport, LocalTransport, SftpTransport, SmtpTransport, Transport};

/// Returns a fresh, unconnected transport for `protocol`, or `None` if the
/// scheme is not one of the six spec.md §3 names.
#[must_use]
pub fn for_protocol(protocol: &str) -> Option<Box<dyn Transport>> {
    match protocol.to_ascii_lowercase().as_str() {
        "ftp" => Some(Box::new(FtpTransport::new())),
        "sftp" => Some(Box::new(SftpTransport::new())),
        "http" | "https" => Some(Box::new(HttpTransport::new())),
        "smtp" => Some(Box::new(SmtpTransport::new())),
        "loc" | "local" => Some(Box::new(LocalTransport::new())),
        "exec" => Some(Box::new(ExecTransport::new())),
        _ => None,
    }
}
