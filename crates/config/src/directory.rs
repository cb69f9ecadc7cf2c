//! TOML `[[directory]]` table shape and its conversion into
//! `afd_model::DirectoryStatus`.

use afd_model::{DirectoryStatus, FraOptions};
use serde::Deserialize;

use crate::error::ConfigError;

/// One `[[directory]]` table: the on-disk seed for a Directory Status (FRA)
/// entry (spec.md §3, SPEC_FULL.md §4.11).
#[derive(Clone, Debug, Deserialize)]
pub struct DirectoryConfig {
    /// Short configured alias for this directory.
    pub alias: String,
    /// The fetch URL.
    pub url: String,
    /// Seconds between remote-file-check attempts.
    #[serde(default = "default_check_interval")]
    pub check_interval: u32,
    /// Directory option names, e.g. `["remove", "dupcheck"]`.
    #[serde(default)]
    pub options: Vec<String>,
}

const fn default_check_interval() -> u32 {
    60
}

impl DirectoryConfig {
    fn parse_option(&self, name: &str) -> Result<FraOptions, ConfigError> {
        match name.to_ascii_lowercase().as_str() {
            "one_process_just_scanning" => Ok(FraOptions::ONE_PROCESS_JUST_SCANNING),
            "do_not_parallelize" => Ok(FraOptions::DO_NOT_PARALLELIZE),
            "keep_path" => Ok(FraOptions::KEEP_PATH),
            "no_delimiter" => Ok(FraOptions::NO_DELIMITER),
            "stupid_mode" => Ok(FraOptions::STUPID_MODE),
            "remove" => Ok(FraOptions::REMOVE),
            "url_with_index_file_name" => Ok(FraOptions::URL_WITH_INDEX_FILE_NAME),
            "url_creates_file_name" => Ok(FraOptions::URL_CREATES_FILE_NAME),
            "dont_get_dir_list" => Ok(FraOptions::DONT_GET_DIR_LIST),
            "dupcheck" => Ok(FraOptions::DUPCHECK),
            other => Err(ConfigError::InvalidEntry {
                alias: self.alias.clone(),
                reason: format!("unknown directory option '{other}'"),
            }),
        }
    }

    /// Converts this on-disk table into a live [`DirectoryStatus`] with an
    /// empty cron table and `next_check_time` due immediately.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidEntry`] if an option name is not
    /// recognised.
    pub fn into_directory_status(self) -> Result<DirectoryStatus, ConfigError> {
        let mut options = FraOptions::empty();
        for name in &self.options {
            options = options.union(self.parse_option(name)?);
        }

        Ok(DirectoryStatus {
            alias: self.alias,
            url: self.url,
            check_interval: self.check_interval,
            next_check_time: 0,
            time_table: Vec::new(),
            options,
            error_counter: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_option_names() {
        let config = DirectoryConfig {
            alias: "dir-a".into(),
            url: "http://h/p/".into(),
            check_interval: default_check_interval(),
            options: vec!["remove".into(), "dupcheck".into()],
        };
        let status = config.into_directory_status().unwrap();
        assert!(status.options.has(FraOptions::REMOVE));
        assert!(status.options.has(FraOptions::DUPCHECK));
    }

    #[test]
    fn rejects_unknown_option() {
        let config = DirectoryConfig {
            alias: "dir-a".into(),
            url: "http://h/p/".into(),
            check_interval: default_check_interval(),
            options: vec!["not_a_real_option".into()],
        };
        assert!(matches!(
            config.into_directory_status(),
            Err(ConfigError::InvalidEntry { .. })
        ));
    }
}
