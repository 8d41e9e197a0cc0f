//! Date formatting for the screens. Plain functions, no shared formatter.

use chrono::{DateTime, FixedOffset};

/// Placeholder for timestamps chrono cannot represent.
pub const NOT_AVAILABLE: &str = "N/A";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateStyle {
    /// "Thursday, 7 December 2023, 2:05 PM"
    DateTime,
    /// "2 PM Thu"
    HourWithDay,
    /// "Thursday 07"
    WeekdayAndDay,
    /// "14:05"
    Time,
}

impl DateStyle {
    pub fn pattern(self) -> &'static str {
        match self {
            DateStyle::DateTime => "%A, %-d %B %Y, %-I:%M %p",
            DateStyle::HourWithDay => "%-I %p %a",
            DateStyle::WeekdayAndDay => "%A %d",
            DateStyle::Time => "%H:%M",
        }
    }
}

/// `timestamp` (unix seconds) shifted by `utc_offset` seconds.
pub fn local_time(timestamp: i64, utc_offset: i32) -> Option<DateTime<FixedOffset>> {
    let offset = FixedOffset::east_opt(utc_offset)?;
    DateTime::from_timestamp(timestamp, 0).map(|utc| utc.with_timezone(&offset))
}

pub fn format_timestamp(timestamp: i64, style: DateStyle, utc_offset: i32) -> String {
    format_with(timestamp, style.pattern(), utc_offset)
}

/// Format with an arbitrary strftime pattern.
pub fn format_with(timestamp: i64, pattern: &str, utc_offset: i32) -> String {
    match local_time(timestamp, utc_offset) {
        Some(time) => time.format(pattern).to_string(),
        None => NOT_AVAILABLE.to_string(),
    }
}
