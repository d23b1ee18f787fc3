//! Publication date normalization.
//!
//! Feeds publish `pubDate` in a handful of formats. They are tried in a fixed
//! order and the first one that parses wins:
//!
//! 1. RFC 1123 with a numeric zone: `Mon, 02 Jan 2006 15:04:05 -0700`
//! 2. RFC 1123 with a named zone: `Mon, 02 Jan 2006 15:04:05 MST`
//! 3. RFC 3339: `2006-01-02T15:04:05Z`

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};

use crate::error::DateParseError;

/// Supported publication date formats, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateFormat {
    Rfc1123NumericZone,
    Rfc1123NamedZone,
    Rfc3339,
}

impl DateFormat {
    /// All formats in the order they are attempted.
    pub const PRIORITY: [DateFormat; 3] = [
        DateFormat::Rfc1123NumericZone,
        DateFormat::Rfc1123NamedZone,
        DateFormat::Rfc3339,
    ];

    /// Parse `raw` in this format only.
    pub fn parse(self, raw: &str) -> Option<DateTime<Utc>> {
        match self {
            DateFormat::Rfc1123NumericZone => {
                let (datetime, zone) = split_rfc1123(raw)?;
                let offset = numeric_offset(zone)?;
                local_to_utc(datetime, offset)
            }
            DateFormat::Rfc1123NamedZone => {
                let (datetime, zone) = split_rfc1123(raw)?;
                let offset = named_offset(zone)?;
                local_to_utc(datetime, offset)
            }
            DateFormat::Rfc3339 => DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
        }
    }
}

const WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// Zone names defined by RFC 822 with their offsets in hours.
const NAMED_ZONES: [(&str, i32); 12] = [
    ("UT", 0),
    ("UTC", 0),
    ("GMT", 0),
    ("Z", 0),
    ("EST", -5),
    ("EDT", -4),
    ("CST", -6),
    ("CDT", -5),
    ("MST", -7),
    ("MDT", -6),
    ("PST", -8),
    ("PDT", -7),
];

/// Normalize a raw `pubDate` value to a UTC instant.
///
/// Surrounding whitespace is ignored.
pub fn normalize_pub_date(raw: &str) -> Result<DateTime<Utc>, DateParseError> {
    let trimmed = raw.trim();
    DateFormat::PRIORITY
        .iter()
        .find_map(|format| format.parse(trimmed))
        .ok_or_else(|| DateParseError {
            raw: raw.to_string(),
        })
}

/// Split `Mon, 02 Jan 2006 15:04:05 ZONE` into the date-time part and the zone.
///
/// The weekday name must be valid but is not checked against the date.
fn split_rfc1123(raw: &str) -> Option<(&str, &str)> {
    let (weekday, rest) = raw.split_once(", ")?;
    if !WEEKDAYS.iter().any(|day| day.eq_ignore_ascii_case(weekday)) {
        return None;
    }
    rest.rsplit_once(' ')
}

/// Parse a `+hhmm` / `-hhmm` zone.
fn numeric_offset(zone: &str) -> Option<FixedOffset> {
    let (sign, digits) = match zone.as_bytes().first()? {
        b'+' => (1, &zone[1..]),
        b'-' => (-1, &zone[1..]),
        _ => return None,
    };
    if digits.len() != 4 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let hours: i32 = digits[..2].parse().ok()?;
    let minutes: i32 = digits[2..].parse().ok()?;
    if minutes >= 60 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

/// Resolve an alphabetic zone name.
///
/// Unknown 3-4 letter abbreviations are read as UTC. Longer or shorter
/// unknown names are rejected.
fn named_offset(zone: &str) -> Option<FixedOffset> {
    if zone.is_empty() || !zone.bytes().all(|b| b.is_ascii_alphabetic()) {
        return None;
    }
    let known = NAMED_ZONES
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(zone))
        .map(|(_, hours)| *hours);
    let hours = match known {
        Some(hours) => hours,
        None if (3..=4).contains(&zone.len()) => 0,
        None => return None,
    };
    FixedOffset::east_opt(hours * 3600)
}

fn local_to_utc(datetime: &str, offset: FixedOffset) -> Option<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(datetime, "%d %b %Y %H:%M:%S").ok()?;
    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}
