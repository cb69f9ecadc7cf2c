//! Binary length-prefixed encoding for `RetrieveEntry` (spec.md §4.3: "a
//! memory-mapped, length-prefixed record array per directory"). Entries
//! carry variable-length strings, so each record is framed with its own
//! length prefix rather than packed into fixed-size slots.

use std::io::{self, Read, Write};

use afd_model::RetrieveEntry;

fn write_option_u64(out: &mut impl Write, value: Option<u64>) -> io::Result<()> {
    match value {
        Some(v) => {
            out.write_all(&[1])?;
            out.write_all(&v.to_le_bytes())
        }
        None => out.write_all(&[0]),
    }
}

fn read_option_u64(input: &mut impl Read) -> io::Result<Option<u64>> {
    let mut present = [0u8; 1];
    input.read_exact(&mut present)?;
    if present[0] == 0 {
        return Ok(None);
    }
    let mut buf = [0u8; 8];
    input.read_exact(&mut buf)?;
    Ok(Some(u64::from_le_bytes(buf)))
}

fn write_option_i64(out: &mut impl Write, value: Option<i64>) -> io::Result<()> {
    match value {
        Some(v) => {
            out.write_all(&[1])?;
            out.write_all(&v.to_le_bytes())
        }
        None => out.write_all(&[0]),
    }
}

fn read_option_i64(input: &mut impl Read) -> io::Result<Option<i64>> {
    let mut present = [0u8; 1];
    input.read_exact(&mut present)?;
    if present[0] == 0 {
        return Ok(None);
    }
    let mut buf = [0u8; 8];
    input.read_exact(&mut buf)?;
    Ok(Some(i64::from_le_bytes(buf)))
}

fn write_option_u32(out: &mut impl Write, value: Option<u32>) -> io::Result<()> {
    match value {
        Some(v) => {
            out.write_all(&[1])?;
            out.write_all(&v.to_le_bytes())
        }
        None => out.write_all(&[0]),
    }
}

fn read_option_u32(input: &mut impl Read) -> io::Result<Option<u32>> {
    let mut present = [0u8; 1];
    input.read_exact(&mut present)?;
    if present[0] == 0 {
        return Ok(None);
    }
    let mut buf = [0u8; 4];
    input.read_exact(&mut buf)?;
    Ok(Some(u32::from_le_bytes(buf)))
}

fn write_option_string(out: &mut impl Write, value: Option<&str>) -> io::Result<()> {
    match value {
        Some(s) => {
            out.write_all(&[1])?;
            write_string(out, s)
        }
        None => out.write_all(&[0]),
    }
}

fn read_option_string(input: &mut impl Read) -> io::Result<Option<String>> {
    let mut present = [0u8; 1];
    input.read_exact(&mut present)?;
    if present[0] == 0 {
        return Ok(None);
    }
    Ok(Some(read_string(input)?))
}

fn write_string(out: &mut impl Write, value: &str) -> io::Result<()> {
    let bytes = value.as_bytes();
    out.write_all(&(bytes.len() as u32).to_le_bytes())?;
    out.write_all(bytes)
}

fn read_string(input: &mut impl Read) -> io::Result<String> {
    let mut len_buf = [0u8; 4];
    input.read_exact(&mut len_buf)?;
    let len = u32::from_le_bytes(len_buf) as usize;
    let mut buf = vec![0u8; len];
    input.read_exact(&mut buf)?;
    String::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Encodes one entry's body (not including the outer record-length prefix).
fn encode_body(entry: &RetrieveEntry) -> io::Result<Vec<u8>> {
    let mut body = Vec::new();
    write_string(&mut body, &entry.file_name)?;
    write_option_u64(&mut body, entry.size)?;
    write_option_u64(&mut body, entry.previous_size)?;
    write_option_i64(&mut body, entry.mtime)?;
    body.write_all(&[u8::from(entry.retrieved)])?;
    body.write_all(&[u8::from(entry.in_list)])?;
    write_option_u32(&mut body, entry.assigned)?;
    write_option_string(&mut body, entry.fingerprint.as_deref())?;
    Ok(body)
}

fn decode_body(mut body: &[u8]) -> io::Result<RetrieveEntry> {
    let file_name = read_string(&mut body)?;
    let size = read_option_u64(&mut body)?;
    let previous_size = read_option_u64(&mut body)?;
    let mtime = read_option_i64(&mut body)?;
    let mut flag = [0u8; 1];
    body.read_exact(&mut flag)?;
    let retrieved = flag[0] != 0;
    body.read_exact(&mut flag)?;
    let in_list = flag[0] != 0;
    let assigned = read_option_u32(&mut body)?;
    let fingerprint = read_option_string(&mut body)?;

    Ok(RetrieveEntry {
        file_name,
        size,
        previous_size,
        mtime,
        retrieved,
        in_list,
        assigned,
        fingerprint,
    })
}

/// Writes every entry as a `u32` length prefix followed by its encoded
/// body.
pub fn encode_entries(entries: &[RetrieveEntry], out: &mut impl Write) -> io::Result<()> {
    for entry in entries {
        let body = encode_body(entry)?;
        out.write_all(&(body.len() as u32).to_le_bytes())?;
        out.write_all(&body)?;
    }
    Ok(())
}

/// Reads a full stream of length-prefixed entries until EOF.
pub fn decode_entries(input: &mut impl Read) -> io::Result<Vec<RetrieveEntry>> {
    let mut entries = Vec::new();
    loop {
        let mut len_buf = [0u8; 4];
        match input.read_exact(&mut len_buf) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e),
        }
        let len = u32::from_le_bytes(len_buf) as usize;
        let mut body = vec![0u8; len];
        input.read_exact(&mut body)?;
        entries.push(decode_body(&body)?);
    }
    Ok(entries)
}
