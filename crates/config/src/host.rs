//! TOML `[[host]]` table shape and its conversion into `afd_model::HostStatus`.

use std::time::Duration;

use afd_model::{
    Credentials, HostStatus, HostStatusFlags, HostnameToggle, JobStatus, ProtocolMask,
    ProtocolOptions,
};
use serde::Deserialize;

use crate::error::ConfigError;

/// One `[[host]]` table: the on-disk seed for a Host Status (FSA) entry
/// (spec.md §3, SPEC_FULL.md §4.11).
#[derive(Clone, Debug, Deserialize)]
pub struct HostConfig {
    /// Short configured alias for this host.
    pub alias: String,
    /// Primary real hostname.
    pub hostname: String,
    /// Optional failover hostname.
    #[serde(default)]
    pub hostname_backup: Option<String>,
    /// Protocols this host may be reached over, e.g. `["ftp", "sftp"]`.
    pub protocols: Vec<String>,
    /// Protocol option names, e.g. `["passive", "tls_strict"]`.
    #[serde(default)]
    pub options: Vec<String>,
    /// Remote username.
    #[serde(default)]
    pub user: String,
    /// Remote password.
    #[serde(default)]
    pub password: String,
    /// Socket send buffer size in bytes, 0 = OS default.
    #[serde(default)]
    pub send_buffer_size: u32,
    /// Socket receive buffer size in bytes, 0 = OS default.
    #[serde(default)]
    pub recv_buffer_size: u32,
    /// Per-process transfer-rate limit in bytes/sec, 0 = unlimited.
    #[serde(default)]
    pub transfer_rate_limit: u64,
    /// Block size used for reads/writes against this host.
    #[serde(default = "default_block_size")]
    pub block_size: u32,
    /// Seconds to hold the connection open awaiting more work.
    #[serde(default)]
    pub keep_connected: u32,
    /// Seconds of inactivity after which a non-keep-alive connection closes.
    #[serde(default)]
    pub disconnect_seconds: u32,
    /// Per-operation transport timeout, in seconds.
    #[serde(default = "default_transfer_timeout_secs")]
    pub transfer_timeout_secs: u64,
    /// Maximum number of concurrent transfer slots allowed for this host.
    #[serde(default = "default_allowed_transfers")]
    pub allowed_transfers: u16,
    /// Queue the host's work immediately on startup.
    #[serde(default)]
    pub queue_set: bool,
    /// Store the resolved IP instead of re-resolving per job.
    #[serde(default)]
    pub store_ip: bool,
}

const fn default_block_size() -> u32 {
    65536
}

const fn default_transfer_timeout_secs() -> u64 {
    60
}

const fn default_allowed_transfers() -> u16 {
    1
}

impl HostConfig {
    fn parse_protocol(&self, name: &str) -> Result<ProtocolMask, ConfigError> {
        match name.to_ascii_lowercase().as_str() {
            "ftp" => Ok(ProtocolMask::FTP),
            "sftp" => Ok(ProtocolMask::SFTP),
            "http" | "https" => Ok(ProtocolMask::HTTP),
            "smtp" => Ok(ProtocolMask::SMTP),
            "loc" | "local" => Ok(ProtocolMask::LOC),
            "exec" => Ok(ProtocolMask::EXEC),
            other => Err(ConfigError::InvalidEntry {
                alias: self.alias.clone(),
                reason: format!("unknown protocol '{other}'"),
            }),
        }
    }

    fn parse_option(&self, name: &str) -> Result<ProtocolOptions, ConfigError> {
        match name.to_ascii_lowercase().as_str() {
            "passive" => Ok(ProtocolOptions::PASSIVE),
            "extended" => Ok(ProtocolOptions::EXTENDED),
            "keepalive" => Ok(ProtocolOptions::KEEPALIVE),
            "tls_strict" => Ok(ProtocolOptions::TLS_STRICT),
            "legacy_renegotiation" => Ok(ProtocolOptions::LEGACY_RENEGOTIATION),
            "no_expect" => Ok(ProtocolOptions::NO_EXPECT),
            "bucket_in_path" => Ok(ProtocolOptions::BUCKET_IN_PATH),
            other => Err(ConfigError::InvalidEntry {
                alias: self.alias.clone(),
                reason: format!("unknown protocol option '{other}'"),
            }),
        }
    }

    /// Converts this on-disk table into a live [`HostStatus`] with
    /// `allowed_transfers` empty job slots.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidEntry`] if a protocol or option name is
    /// not recognised.
    pub fn into_host_status(self) -> Result<HostStatus, ConfigError> {
        let mut protocols = ProtocolMask::empty();
        for name in &self.protocols {
            protocols = protocols.union(self.parse_protocol(name)?);
        }

        let mut options = ProtocolOptions::empty();
        for name in &self.options {
            options = options.union(self.parse_option(name)?);
        }

        let mut flags = HostStatusFlags::empty();
        if self.queue_set {
            flags = flags.set(HostStatusFlags::QUEUE_SET);
        }
        if self.store_ip {
            flags = flags.set(HostStatusFlags::STORE_IP);
        }

        let backup = self.hostname_backup.clone().unwrap_or_default();
        let slots = (0..self.allowed_transfers.max(1))
            .map(|_| JobStatus::default())
            .collect();

        Ok(HostStatus {
            alias: self.alias,
            real_hostnames: [self.hostname, backup],
            toggle: HostnameToggle::Primary,
            protocols,
            options,
            credentials: Credentials {
                user: self.user,
                password: self.password,
            },
            send_buffer_size: self.send_buffer_size,
            recv_buffer_size: self.recv_buffer_size,
            transfer_rate_limit: self.transfer_rate_limit,
            block_size: self.block_size,
            keep_connected: self.keep_connected,
            disconnect_seconds: self.disconnect_seconds,
            transfer_timeout: Duration::from_secs(self.transfer_timeout_secs),
            allowed_transfers: self.allowed_transfers,
            active_transfers: 0,
            error_counter: 0,
            flags,
            slots,
            total_file_counter: 0,
            total_file_size: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> HostConfig {
        HostConfig {
            alias: "host-a".into(),
            hostname: "a.example".into(),
            hostname_backup: None,
            protocols: vec!["http".into(), "ftp".into()],
            options: vec!["passive".into()],
            user: "anon".into(),
            password: String::new(),
            send_buffer_size: 0,
            recv_buffer_size: 0,
            transfer_rate_limit: 0,
            block_size: default_block_size(),
            keep_connected: 0,
            disconnect_seconds: 0,
            transfer_timeout_secs: default_transfer_timeout_secs(),
            allowed_transfers: default_allowed_transfers(),
            queue_set: false,
            store_ip: false,
        }
    }

    #[test]
    fn converts_protocol_and_option_names() {
        let status = sample().into_host_status().unwrap();
        assert!(status.protocols.contains(ProtocolMask::HTTP));
        assert!(status.protocols.contains(ProtocolMask::FTP));
        assert!(status.options.has(ProtocolOptions::PASSIVE));
    }

    #[test]
    fn rejects_unknown_protocol() {
        let mut config = sample();
        config.protocols.push("gopher".into());
        assert!(matches!(
            config.into_host_status(),
            Err(ConfigError::InvalidEntry { .. })
        ));
    }

    #[test]
    fn allocates_one_slot_per_allowed_transfer() {
        let mut config = sample();
        config.allowed_transfers = 3;
        let status = config.into_host_status().unwrap();
        assert_eq!(status.slots.len(), 3);
    }
}
