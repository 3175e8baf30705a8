//! Human-friendly size strings.
//!
//! Targets are written the way people talk about file sizes: `500KB`,
//! `1.5MB`, `2m`, or a bare byte count. Units are case-insensitive, may be
//! separated from the number by whitespace, and use base 1024.
//!
//! | Unit | Multiplier |
//! |------|------------|
//! | (none), `B` | 1 |
//! | `K`, `KB` | 1024 |
//! | `M`, `MB` | 1024² |
//! | `G`, `GB` | 1024³ |
//! | `T`, `TB` | 1024⁴ |
//!
//! Fractional byte counts are truncated: `1.5K` is 1536, `0.3K` is 307.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SizeSpecError {
    #[error("Invalid size format: '{0}'. Use e.g. 500KB, 1.5MB, 2048")]
    InvalidSizeFormat(String),
}

const KB: u64 = 1024;
const MB: u64 = KB * 1024;
const GB: u64 = MB * 1024;
const TB: u64 = GB * 1024;

const UNITS: &[(&str, u64)] = &[
    ("", 1),
    ("b", 1),
    ("k", KB),
    ("kb", KB),
    ("m", MB),
    ("mb", MB),
    ("g", GB),
    ("gb", GB),
    ("t", TB),
    ("tb", TB),
];

/// Parse a size string into a byte count.
///
/// - `"500KB"` → 512000
/// - `"1.5MB"` → 1572864
/// - `" 2 m "` → 2097152
/// - `"5 00KB"` → 512000
/// - `".5k"` → 512
/// - `"100000"` → 100000
///
/// Fails on anything else, including zero and negative numbers.
pub fn parse_size(input: &str) -> Result<u64, SizeSpecError> {
    let invalid = || SizeSpecError::InvalidSizeFormat(input.to_string());
    // Whitespace anywhere is ignored: "5 00 KB" reads as "500kb".
    let normalized: String = input
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .map(|c| c.to_ascii_lowercase())
        .collect();

    let split = normalized
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(normalized.len());
    let (number, unit) = normalized.split_at(split);

    if !is_decimal(number) {
        return Err(invalid());
    }
    let multiplier = UNITS
        .iter()
        .find(|(name, _)| *name == unit)
        .map(|(_, mult)| *mult)
        .ok_or_else(invalid)?;

    let value: f64 = number.parse().map_err(|_| invalid())?;
    if value <= 0.0 {
        return Err(invalid());
    }
    Ok((value * multiplier as f64) as u64)
}

/// Digits with at most one dot, ending in a digit: `500`, `1.5`, `.5`.
fn is_decimal(s: &str) -> bool {
    let (int_part, frac_part) = match s.split_once('.') {
        Some((int_part, frac_part)) => (int_part, Some(frac_part)),
        None => (s, None),
    };
    let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
    match frac_part {
        Some(frac) => all_digits(int_part) && !frac.is_empty() && all_digits(frac),
        None => !int_part.is_empty() && all_digits(int_part),
    }
}

/// Render a byte count for humans, base 1024, one decimal.
///
/// `format_bytes(512_000)` → `"500.0 KB"`, `format_bytes(900)` → `"900 B"`.
pub fn format_bytes(bytes: u64) -> String {
    let (unit, scale) = match bytes {
        b if b >= TB => ("TB", TB),
        b if b >= GB => ("GB", GB),
        b if b >= MB => ("MB", MB),
        b if b >= KB => ("KB", KB),
        _ => return format!("{bytes} B"),
    };
    format!("{:.1} {unit}", bytes as f64 / scale as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // parse_size
    // =========================================================================

    #[test]
    fn kilobytes_use_base_1024() {
        assert_eq!(parse_size("500KB"), Ok(512_000));
        assert_eq!(parse_size("500k"), Ok(512_000));
    }

    #[test]
    fn fractional_megabytes() {
        assert_eq!(parse_size("1.5MB"), Ok(1_572_864));
    }

    #[test]
    fn bare_integer_is_bytes() {
        assert_eq!(parse_size("100000"), Ok(100_000));
        assert_eq!(parse_size("2048b"), Ok(2048));
    }

    #[test]
    fn case_and_whitespace_are_ignored() {
        assert_eq!(parse_size("2m"), Ok(2_097_152));
        assert_eq!(parse_size("  2 Mb "), Ok(2_097_152));
        assert_eq!(parse_size("1 GB"), Ok(1_073_741_824));
    }

    #[test]
    fn inner_whitespace_is_dropped() {
        assert_eq!(parse_size("5 00KB"), Ok(512_000));
        assert_eq!(parse_size("1 k b"), Ok(1024));
        assert_eq!(parse_size("1 . 5\tMB"), Ok(1_572_864));
    }

    #[test]
    fn terabytes() {
        assert_eq!(parse_size("1TB"), Ok(1_099_511_627_776));
        assert_eq!(parse_size("2t"), Ok(2 * 1_099_511_627_776));
    }

    #[test]
    fn leading_dot_decimal() {
        assert_eq!(parse_size(".5k"), Ok(512));
    }

    #[test]
    fn fractional_bytes_truncate() {
        assert_eq!(parse_size("0.3k"), Ok(307));
        assert_eq!(parse_size("1.9"), Ok(1));
    }

    #[test]
    fn rejects_garbage() {
        for bad in ["abc", "", "   ", "KB", "1.2.3MB", "1.", "10XB", "-5MB", "1e3"] {
            assert_eq!(
                parse_size(bad),
                Err(SizeSpecError::InvalidSizeFormat(bad.to_string())),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn rejects_zero() {
        assert!(parse_size("0").is_err());
        assert!(parse_size("0.0MB").is_err());
    }

    #[test]
    fn error_message_echoes_input() {
        let err = parse_size("lots").unwrap_err();
        assert!(err.to_string().contains("'lots'"));
    }

    // =========================================================================
    // format_bytes
    // =========================================================================

    #[test]
    fn format_small_values_in_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(900), "900 B");
    }

    #[test]
    fn format_scaled_values() {
        assert_eq!(format_bytes(512_000), "500.0 KB");
        assert_eq!(format_bytes(1_572_864), "1.5 MB");
        assert_eq!(format_bytes(3 * GB), "3.0 GB");
        assert_eq!(format_bytes(TB), "1.0 TB");
    }
}
