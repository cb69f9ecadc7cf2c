use std::path::PathBuf;

/// Failure loading or parsing a host/directory configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read from disk.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// Path that failed to read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The file's contents were not valid TOML, or did not match the
    /// expected shape.
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        /// Path that failed to parse.
        path: PathBuf,
        /// Underlying TOML error.
        #[source]
        source: toml::de::Error,
    },
    /// A `[[host]]` or `[[directory]]` table referenced an unknown protocol
    /// name, or otherwise failed semantic validation.
    #[error("invalid config entry '{alias}': {reason}")]
    InvalidEntry {
        /// Alias of the offending host or directory table.
        alias: String,
        /// Human-readable reason.
        reason: String,
    },
}
