//! Human-readable unit codecs
//!
//! Byte sizes use a decimal magnitude with an optional SI (`k`, `M`, `G`,
//! `T`) or binary (`Ki`, `Mi`, `Gi`, `Ti`) suffix, case-insensitive, with an
//! optional trailing `B` and at most one space before the unit. Durations are
//! an integer followed by `s`, `m` or `h`.
//!
//! Rendering always picks a form that re-parses to the same numeric value;
//! the declarative layer compares re-rendered text against stored text to
//! suppress spurious change detection.

use std::time::Duration;

use crate::error::{Error, Result};

/// Smallest non-zero bandwidth limit the cluster accepts, in bytes.
pub const MIN_BANDWIDTH_BYTES: u64 = 100_000_000;

// =============================================================================
// Byte Sizes
// =============================================================================

/// Parse a human byte-size string such as `"100M"`, `"2.5 GB"` or `"512KiB"`.
pub fn parse_byte_size(text: &str) -> Result<u64> {
    let s = text.trim();
    if s.is_empty() {
        return Err(invalid("byte size", text));
    }

    let split = s
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(s.len());
    let (magnitude, unit) = s.split_at(split);

    let magnitude: f64 = magnitude.parse().map_err(|_| invalid("byte size", text))?;
    let multiplier = unit_multiplier(unit.trim_start()).ok_or_else(|| invalid("byte size", text))?;

    let value = magnitude * multiplier as f64;
    if !value.is_finite() || value < 0.0 || value > u64::MAX as f64 {
        return Err(invalid("byte size", text));
    }
    Ok(value.round() as u64)
}

/// Render a byte count using the largest decimal unit that divides it
/// exactly; values no unit divides render as plain bytes. The rendered text
/// re-parses to the identical numeric value.
pub fn format_byte_size(value: u64) -> String {
    const UNITS: [(u64, &str); 4] = [
        (1_000_000_000_000, "T"),
        (1_000_000_000, "G"),
        (1_000_000, "M"),
        (1_000, "k"),
    ];

    if value == 0 {
        return "0".to_string();
    }
    for (factor, unit) in UNITS {
        if value % factor == 0 {
            return format!("{}{}", value / factor, unit);
        }
    }
    value.to_string()
}

fn unit_multiplier(unit: &str) -> Option<u64> {
    // A lone trailing "b"/"B" is tolerated on every unit ("M" == "MB").
    let unit = unit.to_ascii_lowercase();
    let unit = unit.strip_suffix('b').unwrap_or(&unit);
    match unit {
        "" => Some(1),
        "k" => Some(1_000),
        "m" => Some(1_000_000),
        "g" => Some(1_000_000_000),
        "t" => Some(1_000_000_000_000),
        "ki" => Some(1 << 10),
        "mi" => Some(1 << 20),
        "gi" => Some(1 << 30),
        "ti" => Some(1 << 40),
        _ => None,
    }
}

// =============================================================================
// Durations
// =============================================================================

/// Parse a duration of the form `<integer><s|m|h>`, e.g. `"30s"` or `"2h"`.
pub fn parse_duration(text: &str) -> Result<Duration> {
    let s = text.trim();
    let Some(unit) = s.chars().last() else {
        return Err(invalid("duration", text));
    };

    let body = s[..s.len() - unit.len_utf8()].trim_end();
    if body.is_empty() || !body.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid("duration", text));
    }
    let count: u64 = body.parse().map_err(|_| invalid("duration", text))?;

    let per_unit = match unit {
        's' => 1,
        'm' => 60,
        'h' => 3600,
        _ => return Err(invalid("duration", text)),
    };
    let secs = count
        .checked_mul(per_unit)
        .ok_or_else(|| invalid("duration", text))?;
    Ok(Duration::from_secs(secs))
}

/// Render a duration in its shortest exact unit: hours when the value is a
/// whole number of hours, else minutes, else seconds.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs == 0 {
        "0s".to_string()
    } else if secs % 3600 == 0 {
        format!("{}h", secs / 3600)
    } else if secs % 60 == 0 {
        format!("{}m", secs / 60)
    } else {
        format!("{}s", secs)
    }
}

fn invalid(what: &'static str, input: &str) -> Error {
    Error::InvalidFormat {
        what,
        input: input.to_string(),
    }
}

// =============================================================================
// Tests
// =============================================================================
