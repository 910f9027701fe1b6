//! Memory-size parsing for booking requests.
//!
//! Booking requests carry memory as a string matching `^\d+[gm]$` (for
//! example `"4g"` or `"512m"`). Capacity accounting against agents is done
//! in whole gigabytes, so the string is parsed once at acceptance and the
//! resulting GB count is stored on the booking row. Megabyte values round
//! up to the next whole gigabyte.

use thiserror::Error;

/// Errors from parsing a memory-size string.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MemParseError {
    /// The string is empty or consists only of a unit suffix.
    #[error("memory value is empty")]
    Empty,

    /// The string does not end in a recognized unit (`g` or `m`).
    #[error("memory unit must be 'g' or 'm'")]
    InvalidUnit,

    /// The numeric portion is not a valid positive integer.
    #[error("memory amount is not a valid number")]
    InvalidNumber,

    /// The parsed amount is zero.
    #[error("memory amount must be positive")]
    Zero,
}

/// Parse a memory string into whole gigabytes.
///
/// `"4g"` parses to 4; `"512m"` rounds up to 1; `"2048m"` parses to 2.
/// Units are lowercase only, matching the accepted request grammar.
///
/// # Errors
///
/// Returns a [`MemParseError`] if the string is not of the form `\d+[gm]`
/// or the amount is zero.
pub fn parse_mem_gb(s: &str) -> Result<u32, MemParseError> {
    let (digits, unit) = match s.char_indices().last() {
        Some((idx, c @ ('g' | 'm'))) => (&s[..idx], c),
        Some(_) => return Err(MemParseError::InvalidUnit),
        None => return Err(MemParseError::Empty),
    };

    if digits.is_empty() {
        return Err(MemParseError::Empty);
    }
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(MemParseError::InvalidNumber);
    }

    let amount: u64 = digits.parse().map_err(|_| MemParseError::InvalidNumber)?;
    if amount == 0 {
        return Err(MemParseError::Zero);
    }

    let gb = if unit == 'g' {
        amount
    } else {
        amount.div_ceil(1024)
    };

    u32::try_from(gb).map_err(|_| MemParseError::InvalidNumber)
}
