//! Top-level TOML document: `[[host]]` and `[[directory]]` tables.

use std::fs;
use std::path::Path;

use afd_model::{DirectoryStatus, HostStatus};
use serde::Deserialize;

use crate::directory::DirectoryConfig;
use crate::error::ConfigError;
use crate::host::HostConfig;

/// The full on-disk configuration document the supervisor reads at startup
/// and on `REREADING` (spec.md §4.2, SPEC_FULL.md §4.11).
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ConfigDocument {
    /// One entry per configured host.
    #[serde(rename = "host", default)]
    pub hosts: Vec<HostConfig>,
    /// One entry per configured fetch directory.
    #[serde(rename = "directory", default)]
    pub directories: Vec<DirectoryConfig>,
}

impl ConfigDocument {
    /// Loads and parses the document at `path`.
    ///
    /// # Errors
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Parse`] if it is not valid TOML matching this shape.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Converts every `[[host]]` table into a live [`HostStatus`].
    ///
    /// # Errors
    /// Returns the first [`ConfigError::InvalidEntry`] encountered.
    pub fn host_statuses(&self) -> Result<Vec<HostStatus>, ConfigError> {
        self.hosts
            .iter()
            .cloned()
            .map(HostConfig::into_host_status)
            .collect()
    }

    /// Converts every `[[directory]]` table into a live [`DirectoryStatus`].
    ///
    /// # Errors
    /// Returns the first [`ConfigError::InvalidEntry`] encountered.
    pub fn directory_statuses(&self) -> Result<Vec<DirectoryStatus>, ConfigError> {
        self.directories
            .iter()
            .cloned()
            .map(DirectoryConfig::into_directory_status)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_hosts_and_directories() {
        let file = write_temp(
            r#"
            [[host]]
            alias = "host-a"
            hostname = "a.example"
            protocols = ["http"]

            [[directory]]
            alias = "dir-a"
            url = "http://a.example/incoming/"
            "#,
        );
        let doc = ConfigDocument::load(file.path()).unwrap();
        assert_eq!(doc.hosts.len(), 1);
        assert_eq!(doc.directories.len(), 1);
        let hosts = doc.host_statuses().unwrap();
        assert_eq!(hosts[0].alias, "host-a");
        let dirs = doc.directory_statuses().unwrap();
        assert_eq!(dirs[0].alias, "dir-a");
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = ConfigDocument::load(Path::new("/nonexistent/afd.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let file = write_temp("this is not valid toml [[[");
        let err = ConfigDocument::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
