//! Timestamp formatting for log lines.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::FormatItem;
use time::macros::format_description;

/// Length of [`TimestampFormat::Iso8601`] output.
pub const LEN_ISO8601: usize = 23;
/// Length of [`TimestampFormat::Iso8601T`] output.
pub const LEN_ISO8601_T: usize = 23;
/// Length of [`TimestampFormat::Iso8601Compact`] output.
pub const LEN_ISO8601_COMPACT: usize = 19;
/// Length of [`TimestampFormat::Ncsa`] output.
pub const LEN_NCSA: usize = 28;

const ISO8601: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:3]");
const ISO8601_T: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]");
const ISO8601_COMPACT: &[FormatItem<'static>] =
    format_description!("[year][month][day]T[hour][minute][second].[subsecond digits:3]");
// Brackets are added around the NCSA body in `format`.
const NCSA: &[FormatItem<'static>] = format_description!(
    "[day]/[month repr:short]/[year]:[hour]:[minute]:[second] [offset_hour sign:mandatory][offset_minute]"
);

/// Timestamp layout used at the start of every log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampFormat {
    /// `2024-01-01 13:45:30.123`
    #[default]
    Iso8601,
    /// `2024-01-01T13:45:30.123`
    Iso8601T,
    /// `20240101T134530.123`
    Iso8601Compact,
    /// NCSA common log format, `[01/Jan/2024:13:45:30 +0000]`
    Ncsa,
}

impl TimestampFormat {
    /// Width of the formatted output in bytes.
    pub const fn len(self) -> usize {
        match self {
            Self::Iso8601 => LEN_ISO8601,
            Self::Iso8601T => LEN_ISO8601_T,
            Self::Iso8601Compact => LEN_ISO8601_COMPACT,
            Self::Ncsa => LEN_NCSA,
        }
    }

    fn items(self) -> &'static [FormatItem<'static>] {
        match self {
            Self::Iso8601 => ISO8601,
            Self::Iso8601T => ISO8601_T,
            Self::Iso8601Compact => ISO8601_COMPACT,
            Self::Ncsa => NCSA,
        }
    }
}

/// Current local time, falling back to UTC when the local offset is unknown.
pub fn now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

/// Format `ts` with the fixed-width layout `format`.
///
/// Years outside 0..=9999 cannot be represented at a fixed width and come
/// out as `?` characters of the same width.
pub fn format(ts: OffsetDateTime, format: TimestampFormat) -> String {
    let formatted = match format {
        TimestampFormat::Ncsa => ts.format(format.items()).map(|s| format!("[{}]", s)),
        _ => ts.format(format.items()),
    };
    match formatted {
        Ok(s) if s.len() == format.len() => s,
        _ => "?".repeat(format.len()),
    }
}
