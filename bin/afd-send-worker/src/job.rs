//! Parses a send job's per-job message file into a [`JobDescriptor`] and
//! the list of local files it names (spec.md's Shared Lifecycle paragraph:
//! "Job descriptors are created by the supervisor from a per-job message
//! file").
//!
//! spec.md does not define the message file's wire format. This workspace
//! uses a minimal line-oriented format: a `key=value` header block (one
//! assignment per line, blank line terminated) naming the target and
//! per-job options, followed by one `local_path<TAB>remote_name` line per
//! file to send.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use afd_model::{JobDescriptor, JobKind, ModeFlag, Target, TransferMode, WorkerError};
use afd_worker::SendFile;

/// A parsed message file: the job's target/options and its file list.
pub struct ParsedMessage {
    /// The job descriptor built from the header block.
    pub descriptor: JobDescriptor,
    /// Remote host to connect to. Not part of [`JobDescriptor::target`],
    /// which only carries the fields the burst handshake needs to diff.
    pub host: String,
    /// Frame each file with the 10-byte file-name-is-header indicator and
    /// the 4-byte end marker (`file_name_is_header=1`).
    pub file_name_is_header: bool,
    /// WMO bulletin sequence number to interleave ahead of the header, if
    /// this job uses WMO framing (`wmo_sequence=<n>`).
    pub wmo_sequence: Option<u32>,
    /// Files to send, in header-block order.
    pub files: Vec<SendFile>,
}

fn parse_header(lines: &mut std::str::Lines<'_>) -> HashMap<String, String> {
    let mut header = HashMap::new();
    for line in lines.by_ref() {
        if line.is_empty() {
            break;
        }
        if let Some((key, value)) = line.split_once('=') {
            header.insert(key.to_string(), value.to_string());
        }
    }
    header
}

/// Reads and parses `path`.
///
/// # Errors
/// Returns [`WorkerError::ReadLocal`] if the file cannot be read, or
/// [`WorkerError::Alloc`] if the header block is missing a `protocol`.
pub fn parse_message_file(path: &Path, toggle: bool, retries: u32) -> Result<ParsedMessage, WorkerError> {
    let contents = std::fs::read_to_string(path).map_err(WorkerError::ReadLocal)?;
    let mut lines = contents.lines();
    let header = parse_header(&mut lines);

    let get = |key: &str| header.get(key).cloned().unwrap_or_default();
    let protocol = get("protocol");
    if protocol.is_empty() {
        return Err(WorkerError::Alloc(format!("message file '{}' is missing a protocol header", path.display())));
    }
    if !header.contains_key("host") {
        return Err(WorkerError::Alloc(format!("message file '{}' is missing a host header", path.display())));
    }

    let remote_path = get("remote_path");
    let dupcheck = header
        .get("dupcheck_ttl_secs")
        .and_then(|v| v.parse::<u64>().ok())
        .map(|secs| (Duration::from_secs(secs), header.get("dupcheck_content_hash").is_some_and(|v| v == "1")));

    let descriptor = JobDescriptor {
        kind: JobKind::Send,
        target: Target {
            protocol: protocol.clone(),
            port: header.get("port").and_then(|v| v.parse::<u16>().ok()),
            user: get("user"),
            password: get("password"),
            path: remote_path.clone(),
        },
        transfer_mode: TransferMode::Auto,
        mode_flag: if toggle { ModeFlag::Active } else { ModeFlag::Passive },
        block_size: header.get("block_size").and_then(|v| v.parse::<u32>().ok()).unwrap_or(65536),
        rate_limit: header.get("rate_limit").and_then(|v| v.parse::<u64>().ok()).unwrap_or(0),
        archive_time: 0,
        archive_dir: header.get("archive_dir").cloned(),
        rename_rule: None,
        age_limit: None,
        dupcheck,
        tls_auth: None,
        retry_count: retries,
        job_id: header.get("job_id").and_then(|v| v.parse::<u32>().ok()),
        dir_id: header.get("dir_id").and_then(|v| v.parse::<u32>().ok()),
        active_target_dir: remote_path,
        active_user: get("user"),
        active_transfer_mode: TransferMode::Auto,
        active_auth: None,
    };

    let base_dir = path.parent();
    let files = lines
        .filter(|line| !line.is_empty())
        .map(|line| {
            let (local, remote) = line.split_once('\t').unwrap_or((line, line));
            let local_path = base_dir.map_or_else(|| PathBuf::from(local), |dir| dir.join(local));
            let size = std::fs::metadata(&local_path).map(|m| m.len()).unwrap_or(0);
            SendFile { local_path, remote_name: remote.to_string(), size }
        })
        .collect();

    let file_name_is_header = header.get("file_name_is_header").is_some_and(|v| v == "1");
    let wmo_sequence = header.get("wmo_sequence").and_then(|v| v.parse::<u32>().ok());

    Ok(ParsedMessage { descriptor, host: get("host"), file_name_is_header, wmo_sequence, files })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn write_message(dir: &tempfile::TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn parses_header_and_file_list() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.dat"), b"hello").unwrap();

        let msg = write_message(
            &dir,
            "msg.1",
            "protocol=ftp\nhost=h.example\nuser=svc\npassword=secret\nremote_path=/incoming\nrate_limit=4096\n\na.dat\ta.dat\n",
        );

        let parsed = parse_message_file(&msg, false, 0).unwrap();
        assert_eq!(parsed.host, "h.example");
        assert_eq!(parsed.descriptor.target.protocol, "ftp");
        assert_eq!(parsed.descriptor.target.path, "/incoming");
        assert_eq!(parsed.descriptor.rate_limit, 4096);
        assert_eq!(parsed.files.len(), 1);
        assert_eq!(parsed.files[0].remote_name, "a.dat");
        assert_eq!(parsed.files[0].size, 5);
    }

    #[test]
    fn rejects_a_message_file_without_a_protocol() {
        let dir = tempfile::tempdir().unwrap();
        let msg = write_message(&dir, "msg.2", "remote_path=/incoming\n\n");
        assert!(parse_message_file(&msg, false, 0).is_err());
    }

    #[test]
    fn parses_file_name_is_header_and_wmo_sequence() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("c.dat"), b"z").unwrap();
        let msg = write_message(
            &dir,
            "msg.4",
            "protocol=smtp\nhost=h.example\nremote_path=/in\nfile_name_is_header=1\nwmo_sequence=7\n\nc.dat\tc.dat\n",
        );
        let parsed = parse_message_file(&msg, false, 0).unwrap();
        assert!(parsed.file_name_is_header);
        assert_eq!(parsed.wmo_sequence, Some(7));
    }

    #[test]
    fn defaults_file_name_is_header_and_wmo_sequence_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("d.dat"), b"z").unwrap();
        let msg = write_message(&dir, "msg.5", "protocol=ftp\nhost=h.example\nremote_path=/in\n\nd.dat\td.dat\n");
        let parsed = parse_message_file(&msg, false, 0).unwrap();
        assert!(!parsed.file_name_is_header);
        assert_eq!(parsed.wmo_sequence, None);
    }

    #[test]
    fn resolves_file_paths_relative_to_the_message_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.dat"), b"xy").unwrap();
        let msg = write_message(&dir, "msg.3", "protocol=http\nhost=h.example\nremote_path=/in\n\nb.dat\tb.dat\n");
        let parsed = parse_message_file(&msg, true, 2).unwrap();
        assert_eq!(parsed.descriptor.retry_count, 2);
        assert_eq!(parsed.descriptor.mode_flag, ModeFlag::Active);
        assert_eq!(parsed.files[0].local_path, dir.path().join("b.dat"));
        assert_eq!(parsed.files[0].size, 2);
    }
}
