// src/ingest/timefmt.rs
//! Publish-date normalization.
//!
//! Feeds disagree on how to write a timestamp. We try a fixed list of
//! layouts in order and keep the first one that parses; the order is part of
//! the contract, so an ambiguous string always resolves the same way.

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};

use crate::error::{GatorError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// `Mon, 02 Jan 2006 15:04:05 MST`
    Rfc1123,
    /// `02 Jan 06 15:04 MST`
    Rfc822,
    /// `2006-01-02T15:04:05Z07:00`
    Rfc3339,
    /// `2006-01-02T15:04:05`, read as UTC
    IsoNoZone,
}

pub const LAYOUTS: [Layout; 4] = [
    Layout::Rfc1123,
    Layout::Rfc822,
    Layout::Rfc3339,
    Layout::IsoNoZone,
];

impl Layout {
    pub fn parse(self, s: &str) -> Option<DateTime<Utc>> {
        match self {
            Layout::Rfc1123 => {
                let rest = strip_weekday(s)?;
                parse_with_zone(rest, "%d %b %Y %H:%M:%S")
            }
            Layout::Rfc822 => parse_with_zone(s, "%d %b %y %H:%M"),
            Layout::Rfc3339 => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
            Layout::IsoNoZone => NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
                .ok()
                .map(|naive| naive.and_utc()),
        }
    }
}

/// Parse a feed timestamp into UTC, trying [`LAYOUTS`] in order.
pub fn parse_published(input: &str) -> Result<DateTime<Utc>> {
    let s = input.trim();
    LAYOUTS
        .iter()
        .find_map(|layout| layout.parse(s))
        .ok_or_else(|| GatorError::TimeParse {
            input: input.to_string(),
        })
}

/// Which layout would accept `input`, if any. Diagnostics only.
pub fn matching_layout(input: &str) -> Option<Layout> {
    let s = input.trim();
    LAYOUTS.iter().copied().find(|layout| layout.parse(s).is_some())
}

const WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// Drop a leading `Ddd, `. The name must be a real weekday but need not
/// agree with the date; publishers get it wrong often enough.
fn strip_weekday(s: &str) -> Option<&str> {
    let (day, rest) = s.split_once(", ")?;
    WEEKDAYS
        .iter()
        .any(|w| w.eq_ignore_ascii_case(day))
        .then_some(rest)
}

fn parse_with_zone(s: &str, fmt: &str) -> Option<DateTime<Utc>> {
    let (head, zone) = s.rsplit_once(' ')?;
    let naive = NaiveDateTime::parse_from_str(head, fmt).ok()?;
    let offset = FixedOffset::east_opt(zone_offset_secs(zone)?)?;
    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

/// RFC 822 zone names resolve to their fixed offsets. Any other
/// abbreviation is accepted at a zero offset since it carries no offset we
/// could trust. Numeric `+hhmm` / `-hhmm` offsets are read as written.
/// Named US zones deliberately keep their real offsets (`MST` is -07:00)
/// instead of collapsing to UTC the way Go's `time.Parse` does for zones
/// it doesn't know locally.
fn zone_offset_secs(zone: &str) -> Option<i32> {
    const HOUR: i32 = 3600;
    let secs = match zone {
        "UT" | "UTC" | "GMT" | "Z" => 0,
        "EST" => -5 * HOUR,
        "EDT" => -4 * HOUR,
        "CST" => -6 * HOUR,
        "CDT" => -5 * HOUR,
        "MST" => -7 * HOUR,
        "MDT" => -6 * HOUR,
        "PST" => -8 * HOUR,
        "PDT" => -7 * HOUR,
        z if is_numeric_offset(z) => {
            let sign = if z.starts_with('-') { -1 } else { 1 };
            let hours: i32 = z[1..3].parse().ok()?;
            let minutes: i32 = z[3..5].parse().ok()?;
            if minutes >= 60 {
                return None;
            }
            sign * (hours * HOUR + minutes * 60)
        }
        z if (3..=5).contains(&z.len()) && z.bytes().all(|b| b.is_ascii_uppercase()) => 0,
        _ => return None,
    };
    Some(secs)
}

fn is_numeric_offset(z: &str) -> bool {
    let b = z.as_bytes();
    b.len() == 5 && (b[0] == b'+' || b[0] == b'-') && b[1..].iter().all(u8::is_ascii_digit)
}
