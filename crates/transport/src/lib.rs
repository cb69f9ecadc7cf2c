//! Uniform per-protocol transfer contract and concrete adapters
//! (spec.md §4.1).

mod exec;
mod ftp;
mod http;
mod local;
mod sftp;
mod smtp;
mod trait_def;

pub use exec::ExecTransport;
pub use ftp::FtpTransport;
pub use http::HttpTransport;
pub use local::LocalTransport;
pub use sftp::SftpTransport;
pub use smtp::SmtpTransport;
pub use trait_def::{GetOutcome, ListOutcome, ListingEntry, PutResponse, Transport};
