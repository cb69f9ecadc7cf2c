//! Configuration loading and CLI argument parsing for the AFD
//! transfer-execution core.
//!
//! `ConfigDocument` is the on-disk TOML source the supervisor reads to seed
//! the Filetransfer/Fileretrieve Status Areas at startup, and re-reads when
//! an operator requests a config reload (spec.md §4.2 `REREADING`). `cli`
//! carries the exact positional/flag surface spec.md §6 specifies for the
//! two worker binaries.

mod cli;
mod directory;
mod document;
mod error;
mod host;

pub use cli::{FetchWorkerArgs, SendWorkerArgs};
pub use directory::DirectoryConfig;
pub use document::ConfigDocument;
pub use error::ConfigError;
pub use host::HostConfig;
