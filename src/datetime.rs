//! Timestamp and duration helpers.
//!
//! Timestamps are stored as RFC3339 UTC text with a fixed precision, so the
//! lexical order of stored values matches chronological order on every
//! backend.

use std::time::Duration;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};

use crate::{GatorError, Result};

/// The current time at storage precision (microseconds).
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Truncate an instant to storage precision.
pub fn at_storage_precision(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt.trunc_subsecs(6)
}

/// Format an instant for storage.
pub fn to_storage(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored RFC3339 timestamp.
pub fn from_storage(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Format an instant for terminal output.
pub fn format_display(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Parse a duration such as `30s`, `5m`, `1h30m` or `250ms`.
///
/// A bare number is read as seconds.
pub fn parse_duration(input: &str) -> Result<Duration> {
    let input = input.trim();
    let invalid = || GatorError::Validation(format!("invalid duration '{input}'"));

    if input.is_empty() {
        return Err(invalid());
    }
    if let Ok(secs) = input.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    let mut total = Duration::ZERO;
    let mut rest = input;
    while !rest.is_empty() {
        let digits = rest.bytes().take_while(|b| b.is_ascii_digit()).count();
        if digits == 0 {
            return Err(invalid());
        }
        let value: u64 = rest[..digits].parse().map_err(|_| invalid())?;
        rest = &rest[digits..];

        let unit_len = rest
            .bytes()
            .take_while(|b| b.is_ascii_alphabetic())
            .count();
        let part = match &rest[..unit_len] {
            "ms" => Duration::from_millis(value),
            "s" => Duration::from_secs(value),
            "m" => Duration::from_secs(value.saturating_mul(60)),
            "h" => Duration::from_secs(value.saturating_mul(3600)),
            _ => return Err(invalid()),
        };
        rest = &rest[unit_len..];
        total = total.checked_add(part).ok_or_else(invalid)?;
    }
    Ok(total)
}

/// Format a duration compactly, e.g. `1h30m`, `45s` or `250ms`.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let millis = duration.subsec_millis();
    if secs == 0 {
        return format!("{millis}ms");
    }

    let (hours, minutes, seconds) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    let mut out = String::new();
    if hours > 0 {
        out.push_str(&format!("{hours}h"));
    }
    if minutes > 0 {
        out.push_str(&format!("{minutes}m"));
    }
    if seconds > 0 || millis > 0 {
        out.push_str(&format!("{seconds}s"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_to_storage_fixed_precision() {
        let dt = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
        assert_eq!(to_storage(&dt), "2024-01-15T10:30:00.000000Z");
    }

    #[test]
    fn test_storage_order_is_chronological() {
        let earlier = Utc.with_ymd_and_hms(2024, 1, 15, 9, 59, 59).unwrap();
        let later = Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap();
        assert!(to_storage(&earlier) < to_storage(&later));
    }

    #[test]
    fn test_from_storage_rfc3339() {
        let dt = from_storage("2024-01-15T10:30:00.000000Z").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap());
    }

    #[test]
    fn test_from_storage_rejects_non_rfc3339() {
        assert!(from_storage("2024-01-15 10:30:00").is_none());
    }

    #[test]
    fn test_from_storage_invalid() {
        assert!(from_storage("not a date").is_none());
    }

    #[test]
    fn test_now_round_trips() {
        let now = now();
        assert_eq!(from_storage(&to_storage(&now)), Some(now));
    }

    #[test]
    fn test_at_storage_precision() {
        let dt = Utc.timestamp_opt(1_700_000_000, 123_456_789).unwrap();
        assert_eq!(at_storage_precision(dt).timestamp_subsec_nanos(), 123_456_000);
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("1h30m").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("1m30s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("90").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration(" 2h ").unwrap(), Duration::from_secs(7200));
    }

    #[test]
    fn test_parse_duration_invalid() {
        for input in ["", "m", "10x", "1.5h", "-5s", "5 m", "h1"] {
            assert!(parse_duration(input).is_err(), "{input}");
        }
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(60)), "1m");
        assert_eq!(format_duration(Duration::from_secs(5400)), "1h30m");
        assert_eq!(format_duration(Duration::from_secs(3661)), "1h1m1s");
        assert_eq!(format_duration(Duration::from_secs(45)), "45s");
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
    }

    #[test]
    fn test_format_display() {
        let dt = Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 59).unwrap();
        assert_eq!(format_display(&dt), "2024-12-31 23:59:59");
    }
}
