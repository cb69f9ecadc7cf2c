use std::num::NonZeroU64;

/// Error parsing a textual rate-limit argument (e.g. a `-b` flag or a
/// `transfer_rate_limit` config value).
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RateParseError {
    /// The input was empty.
    #[error("rate argument is empty")]
    Empty,
    /// The numeric portion could not be parsed.
    #[error("invalid numeric rate: {0}")]
    InvalidNumber(String),
    /// The suffix (after the digits) was not recognised.
    #[error("unrecognised rate suffix: {0}")]
    UnknownSuffix(String),
}

/// Parses a textual byte-rate specification such as `"8M"`, `"512K"`, or a
/// bare `"4096"` (bytes/sec), returning `None` for `"0"`/unlimited.
///
/// # Errors
/// Returns [`RateParseError`] if the input is empty, non-numeric, or carries
/// an unrecognised suffix.
pub fn parse_rate_argument(input: &str) -> Result<Option<NonZeroU64>, RateParseError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(RateParseError::Empty);
    }

    let split_at = trimmed
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(trimmed.len());
    let (number_part, suffix) = trimmed.split_at(split_at);

    let value: f64 = number_part
        .parse()
        .map_err(|_| RateParseError::InvalidNumber(number_part.to_string()))?;

    let multiplier: u64 = match suffix.trim().to_ascii_uppercase().as_str() {
        "" | "B" => 1,
        "K" | "KB" | "KIB" => 1024,
        "M" | "MB" | "MIB" => 1024 * 1024,
        "G" | "GB" | "GIB" => 1024 * 1024 * 1024,
        other => return Err(RateParseError::UnknownSuffix(other.to_string())),
    };

    let bytes = (value * multiplier as f64).round();
    if bytes <= 0.0 {
        return Ok(None);
    }
    Ok(NonZeroU64::new(bytes as u64))
}
