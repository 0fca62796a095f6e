//! Memory size codec
//!
//! The wire model expresses topology sizes as a count of megabytes. The flat
//! model uses short strings such as `"1g"`, `"0.5g"` or `"100m"`. A size is
//! rendered in the largest unit in which it is an exact decimal with at most
//! three fractional digits, falling back to megabytes.

use crate::error::{ModelError, Result};

/// Unit suffixes and their size in megabytes, largest first
const UNITS: &[(&str, u64)] = &[("g", 1024), ("m", 1)];

const MAX_FRACTION_DIGITS: u32 = 3;

/// Largest size the wire model can carry
pub const MAX_MEGABYTES: u32 = i32::MAX as u32;

/// Wire size resource kind that carries a memory value
pub const MEMORY_RESOURCE: &str = "memory";

/// Render a megabyte count as a display string
pub fn memory_to_state(megabytes: u32) -> String {
    let megabytes = u64::from(megabytes);
    let scale = 10u64.pow(MAX_FRACTION_DIGITS);

    for (suffix, factor) in UNITS {
        if *factor == 1 {
            break;
        }
        if (megabytes * scale) % factor != 0 {
            continue;
        }
        let thousandths = megabytes * scale / factor;
        let whole = thousandths / scale;
        let fraction = thousandths % scale;
        if fraction == 0 {
            return format!("{}{}", whole, suffix);
        }
        let digits = format!("{:03}", fraction);
        return format!("{}.{}{}", whole, digits.trim_end_matches('0'), suffix);
    }

    format!("{}m", megabytes)
}

/// Parse a display string into a megabyte count
pub fn parse_memory(value: &str) -> Result<u32> {
    let invalid = |message: &str| ModelError::InvalidMemorySize {
        value: value.to_string(),
        message: message.to_string(),
    };

    let normalized = value.trim().to_ascii_lowercase();
    let normalized = normalized.strip_suffix('b').unwrap_or(&normalized);

    let (number, factor) = UNITS
        .iter()
        .find_map(|(suffix, factor)| normalized.strip_suffix(suffix).map(|n| (n, *factor)))
        .ok_or_else(|| invalid("expected a 'g' or 'm' suffix"))?;

    if number.is_empty() {
        return Err(invalid("missing number"));
    }

    let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
    if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid("not a number"));
    }
    if !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid("not a number"));
    }
    if number.contains('.') && fraction.is_empty() {
        return Err(invalid("not a number"));
    }

    let whole: u64 = whole.parse().map_err(|_| invalid("value too large"))?;
    let mut megabytes = whole
        .checked_mul(factor)
        .ok_or_else(|| invalid("value too large"))?;

    if !fraction.is_empty() {
        let digits = u32::try_from(fraction.len()).map_err(|_| invalid("too many decimals"))?;
        let denominator = 10u64
            .checked_pow(digits)
            .ok_or_else(|| invalid("too many decimals"))?;
        let numerator: u64 = fraction.parse().map_err(|_| invalid("too many decimals"))?;
        let scaled = numerator
            .checked_mul(factor)
            .ok_or_else(|| invalid("value too large"))?;
        if scaled % denominator != 0 {
            return Err(invalid("not a whole number of megabytes"));
        }
        megabytes += scaled / denominator;
    }

    if megabytes == 0 {
        return Err(invalid("must be greater than zero"));
    }

    u32::try_from(megabytes)
        .ok()
        .filter(|mb| *mb <= MAX_MEGABYTES)
        .ok_or_else(|| invalid("value too large"))
}
