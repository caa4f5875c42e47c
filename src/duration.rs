// Duration string parsing/formatting: "30s", "5m", "1h", "1d" <-> milliseconds.
//
// Grounded on the durable crate's custom `duration_millis` serde module (a human
// string <-> std::time::Duration boundary), generalized to the parser/formatter
// pair this core needs for hook timeouts, step timeouts, and `withSchedule` delays.

use crate::error::{AgentLoopError, Result};
use std::time::Duration;

const MS_PER_SECOND: u64 = 1000;
const MS_PER_MINUTE: u64 = MS_PER_SECOND * 60;
const MS_PER_HOUR: u64 = MS_PER_MINUTE * 60;
const MS_PER_DAY: u64 = MS_PER_HOUR * 24;

/// Parses a duration string of the form `{positive integer}{s|m|h|d}` into
/// milliseconds. Rejects anything else with `AgentLoopError::InvalidDuration`.
pub fn parse_duration_ms(input: &str) -> Result<u64> {
    let invalid = || AgentLoopError::InvalidDuration(input.to_string());

    if input.is_empty() {
        return Err(invalid());
    }

    let unit = input.chars().last().ok_or_else(invalid)?;
    let (digits, multiplier) = match unit {
        's' => (&input[..input.len() - 1], MS_PER_SECOND),
        'm' => (&input[..input.len() - 1], MS_PER_MINUTE),
        'h' => (&input[..input.len() - 1], MS_PER_HOUR),
        'd' => (&input[..input.len() - 1], MS_PER_DAY),
        _ => return Err(invalid()),
    };

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    let value: u64 = digits.parse().map_err(|_| invalid())?;
    if value == 0 {
        return Err(invalid());
    }

    value.checked_mul(multiplier).ok_or_else(invalid)
}

/// Parses a duration string into a `std::time::Duration`.
pub fn parse_duration(input: &str) -> Result<Duration> {
    parse_duration_ms(input).map(Duration::from_millis)
}

/// Formats a millisecond count back into the coarsest unit whose quotient is
/// exact: sub-second -> `Nms`; under a minute -> `Ns`; under an hour -> `Nm`;
/// under a day -> `Nh`; otherwise `Nd`.
pub fn format_duration_ms(ms: u64) -> String {
    if ms < MS_PER_SECOND {
        return format!("{ms}ms");
    }
    if ms % MS_PER_DAY == 0 {
        return format!("{}d", ms / MS_PER_DAY);
    }
    if ms % MS_PER_HOUR == 0 {
        return format!("{}h", ms / MS_PER_HOUR);
    }
    if ms % MS_PER_MINUTE == 0 {
        return format!("{}m", ms / MS_PER_MINUTE);
    }
    if ms % MS_PER_SECOND == 0 {
        return format!("{}s", ms / MS_PER_SECOND);
    }
    format!("{ms}ms")
}

/// Formats a `std::time::Duration` using `format_duration_ms`.
pub fn format_duration(d: Duration) -> String {
    format_duration_ms(d.as_millis() as u64)
}
