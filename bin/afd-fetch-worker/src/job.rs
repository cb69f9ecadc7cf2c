//! Builds a fetch job's [`JobDescriptor`] from its directory/host config
//! and decides how a burst hand-off's payload should be applied
//! (spec.md §3, §4.5 step 7).

use afd_config::{DirectoryConfig, HostConfig};
use afd_model::{JobDescriptor, JobKind, ModeFlag, Target, TransferMode, WorkerError};
use url::Url;

/// Splits a directory's fetch URL into scheme/host/port/path, the shape
/// [`JobDescriptor::target`] wants.
pub struct ParsedUrl {
    /// Protocol scheme (`"http"`, `"ftp"`, ...).
    pub protocol: String,
    /// Remote host, if the URL carries one.
    pub host: String,
    /// Remote port, if explicit in the URL.
    pub port: Option<u16>,
    /// Remote directory path.
    pub path: String,
}

/// Parses `url`, mapping malformed input to [`WorkerError::Alloc`] since a
/// directory with an unparsable URL can never produce a working job.
///
/// # Errors
/// Returns [`WorkerError::Alloc`] if `url` is not a valid URL.
pub fn parse_directory_url(url: &str) -> Result<ParsedUrl, WorkerError> {
    let parsed = Url::parse(url).map_err(|e| WorkerError::Alloc(format!("invalid directory url '{url}': {e}")))?;
    Ok(ParsedUrl {
        protocol: parsed.scheme().to_string(),
        host: parsed.host_str().unwrap_or_default().to_string(),
        port: parsed.port(),
        path: parsed.path().to_string(),
    })
}

/// Builds the initial [`JobDescriptor`] for a fetch job, combining the
/// directory's URL with the matching host's credentials/options, if one is
/// configured for this hostname.
#[must_use]
pub fn build_job_descriptor(
    directory: &DirectoryConfig,
    host: Option<&HostConfig>,
    parsed: &ParsedUrl,
    toggle: bool,
    retries: u32,
) -> JobDescriptor {
    let (user, password) = host.map_or_else(
        || (String::new(), String::new()),
        |h| (h.user.clone(), h.password.clone()),
    );

    JobDescriptor {
        kind: JobKind::Fetch,
        target: Target {
            protocol: parsed.protocol.clone(),
            port: parsed.port,
            user: user.clone(),
            password,
            path: parsed.path.clone(),
        },
        transfer_mode: TransferMode::Auto,
        mode_flag: if toggle { ModeFlag::Active } else { ModeFlag::Passive },
        block_size: host.map_or(65536, |h| h.block_size),
        rate_limit: host.map_or(0, |h| h.transfer_rate_limit),
        archive_time: 0,
        archive_dir: None,
        rename_rule: None,
        age_limit: None,
        dupcheck: None,
        tls_auth: None,
        retry_count: retries,
        job_id: None,
        dir_id: Some(0),
        active_target_dir: parsed.path.clone(),
        active_user: user,
        active_transfer_mode: TransferMode::Auto,
        active_auth: None,
    }
}

/// The supervisor has not nailed down a wire format for what the scheduler
/// writes into the handshake register on a burst hand-off (spec.md §9's
/// `RETRIEVE_JOB_HACK` open question covers the send side of this same
/// ambiguity). For a fetch worker the only thing a hand-off can change is
/// the target path, so this loader treats the payload as that path's new
/// UTF-8 bytes and rebinds `current` onto it unchanged otherwise.
pub struct PathRebindLoader<'a> {
    /// The descriptor currently bound to the connection.
    pub current: &'a JobDescriptor,
}

impl afd_burst::JobDescriptorLoader for PathRebindLoader<'_> {
    fn load(&self, payload: &[u8]) -> Result<JobDescriptor, WorkerError> {
        let new_path = std::str::from_utf8(payload)
            .map_err(|e| WorkerError::Alloc(format!("handshake payload is not UTF-8: {e}")))?;
        let mut fresh = self.current.clone();
        fresh.target.path = new_path.to_string();
        Ok(fresh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_scheme_host_port_and_path() {
        let parsed = parse_directory_url("sftp://h.example:2222/incoming/").unwrap();
        assert_eq!(parsed.protocol, "sftp");
        assert_eq!(parsed.host, "h.example");
        assert_eq!(parsed.port, Some(2222));
        assert_eq!(parsed.path, "/incoming/");
    }

    #[test]
    fn rejects_an_unparsable_url() {
        assert!(parse_directory_url("not a url").is_err());
    }

    #[test]
    fn build_job_descriptor_falls_back_without_a_matching_host() {
        let directory = DirectoryConfig {
            alias: "dir-a".into(),
            url: "http://h.example/incoming/".into(),
            check_interval: 60,
            options: Vec::new(),
        };
        let parsed = parse_directory_url(&directory.url).unwrap();
        let job = build_job_descriptor(&directory, None, &parsed, false, 0);
        assert_eq!(job.target.protocol, "http");
        assert_eq!(job.active_user, "");
        assert_eq!(job.block_size, 65536);
    }
}
