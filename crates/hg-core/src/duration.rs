//! Segment duration text parsing and `HH:MM:SS` formatting.

use std::time::Duration;

use crate::{Error, Result};

/// Parse a segment duration given on the command line.
///
/// Accepts a bare second count (`"60"`), `M:SS` (`"5:00"`) or `H:MM:SS`
/// (`"1:30:00"`). In the colon forms every component after the first must be
/// below 60. The result must be positive.
///
/// ```
/// use hg_core::parse_segment_duration;
/// use std::time::Duration;
///
/// assert_eq!(parse_segment_duration("5:00").unwrap(), Duration::from_secs(300));
/// assert_eq!(parse_segment_duration("90").unwrap(), Duration::from_secs(90));
/// ```
pub fn parse_segment_duration(text: &str) -> Result<Duration> {
    let text = text.trim();
    if text.is_empty() {
        return Err(Error::config("segment duration is empty"));
    }

    let parts: Vec<&str> = text.split(':').collect();
    if parts.len() > 3 {
        return Err(invalid(text, "expected SECONDS, M:SS or H:MM:SS"));
    }

    let mut total: u64 = 0;
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid(text, "components must be whole numbers"));
        }
        let value: u64 = part
            .parse()
            .map_err(|_| invalid(text, "component out of range"))?;
        if i > 0 && value >= 60 {
            return Err(invalid(text, "minutes and seconds must be below 60"));
        }
        total = total
            .checked_mul(60)
            .and_then(|t| t.checked_add(value))
            .ok_or_else(|| invalid(text, "duration out of range"))?;
    }

    if total == 0 {
        return Err(invalid(text, "segment duration must be positive"));
    }

    Ok(Duration::from_secs(total))
}

fn invalid(text: &str, reason: &str) -> Error {
    Error::config(format!("invalid segment duration '{text}': {reason}"))
}

/// Format a duration as `HH:MM:SS`, truncating sub-second precision.
pub fn format_hms(d: Duration) -> String {
    let secs = d.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}
