//! Wall-clock rendering for notification templates.

use std::fmt::Write;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, FixedOffset, Local, Utc};

use crate::error::{ConfigError, ConfigResult};

pub const DEFAULT_TIME_FORMAT: &str = "%H:%M:%S";

/// The zone `$now` is rendered in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TimeZoneSetting {
    #[default]
    Utc,
    Local,
    Fixed(FixedOffset),
}

impl TimeZoneSetting {
    /// Parse `UTC`, `local`, or a fixed offset such as `+03:00`, `-0530`
    /// or `+3`.
    pub fn parse(s: &str) -> ConfigResult<Self> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("utc") || trimmed == "Z" || trimmed.is_empty() {
            return Ok(Self::Utc);
        }
        if trimmed.eq_ignore_ascii_case("local") {
            return Ok(Self::Local);
        }
        parse_offset(trimmed)
            .map(Self::Fixed)
            .ok_or_else(|| ConfigError::TimeZone(s.to_string()))
    }

    /// Render `at` with a strftime pattern. Invalid patterns fall back to
    /// [`DEFAULT_TIME_FORMAT`].
    pub fn format(&self, at: DateTime<Utc>, pattern: &str) -> String {
        let pattern = if is_valid_format(pattern) {
            pattern
        } else {
            DEFAULT_TIME_FORMAT
        };
        let mut out = String::new();
        let written = match self {
            Self::Utc => write!(out, "{}", at.format(pattern)),
            Self::Local => write!(out, "{}", at.with_timezone(&Local).format(pattern)),
            Self::Fixed(offset) => write!(out, "{}", at.with_timezone(offset).format(pattern)),
        };
        if written.is_err() {
            out.clear();
        }
        out
    }
}

/// Whether `pattern` is a strftime pattern chrono can render.
pub fn is_valid_format(pattern: &str) -> bool {
    !StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error))
}

fn parse_offset(s: &str) -> Option<FixedOffset> {
    let (sign, rest) = match s.as_bytes().first()? {
        b'+' => (1, &s[1..]),
        b'-' => (-1, &s[1..]),
        _ => return None,
    };
    let (hours, minutes) = match rest.split_once(':') {
        Some(parts) => parts,
        None if rest.len() == 4 => rest.split_at(2),
        None => (rest, "0"),
    };
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if !(0..=23).contains(&hours) || !(0..=59).contains(&minutes) {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}
