//! Human-readable size strings.
//!
//! Accepts a decimal number, an optional single space, then an optional unit
//! letter (`k`, `m`, `g`, `t`, `p`, any case), an optional `i` and an
//! optional `b`.  Every unit is binary, so `"1G"`, `"1Gi"` and `"1GiB"` all
//! mean 2^30 bytes.

use crate::error::FlexError;

const KIB: f64 = 1024.0;

/// Parse a size string (e.g. `"10Gi"`, `"512m"`, `"0"`) into bytes.
///
/// Fractional values are truncated to whole bytes.
pub fn parse_size(input: &str) -> Result<u64, FlexError> {
    let invalid = || FlexError::Parse(format!("invalid size: '{input}'"));

    let split_pos = input
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(input.len());
    let (num_str, rest) = input.split_at(split_pos);

    if num_str.is_empty()
        || num_str.starts_with('.')
        || num_str.ends_with('.')
        || num_str.matches('.').count() > 1
    {
        return Err(invalid());
    }
    let num: f64 = num_str.parse().map_err(|_| invalid())?;

    let suffix = rest.strip_prefix(' ').unwrap_or(rest);
    let mut chars = suffix.chars().peekable();

    let exponent = match chars.peek().map(char::to_ascii_lowercase) {
        Some('k') => 1,
        Some('m') => 2,
        Some('g') => 3,
        Some('t') => 4,
        Some('p') => 5,
        _ => 0,
    };
    if exponent > 0 {
        chars.next();
    }
    if matches!(chars.peek(), Some('i' | 'I')) {
        chars.next();
    }
    if matches!(chars.peek(), Some('b' | 'B')) {
        chars.next();
    }
    if chars.next().is_some() {
        return Err(invalid());
    }

    let bytes = num * KIB.powi(exponent);
    if !bytes.is_finite() || bytes >= u64::MAX as f64 {
        return Err(FlexError::Parse(format!("size out of range: '{input}'")));
    }
    Ok(bytes as u64)
}
