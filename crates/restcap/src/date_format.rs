//! Date patterns used by `date<...>` type descriptors.
//!
//! Servers describe dates with single-letter codes (`Y-m-d`, `c`, `d/m/Y H:i`).
//! Each code is translated to a chrono strftime specifier; any other character
//! is kept literally, and a backslash escapes the character that follows it.

use std::fmt;

use chrono::format::{Parsed, StrftimeItems};
use chrono::{DateTime, FixedOffset, NaiveTime, Offset, TimeZone, Utc};

/// A date pattern with its strftime translation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateFormat {
    pattern: String,
    strftime: String,
}

impl DateFormat {
    pub fn new(pattern: impl Into<String>) -> Self {
        let pattern = pattern.into();
        let strftime = translate(&pattern);
        Self { pattern, strftime }
    }

    /// The pattern as written in the type descriptor.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// The equivalent chrono strftime string.
    pub fn strftime(&self) -> &str {
        &self.strftime
    }

    pub fn format(&self, date: &DateTime<FixedOffset>) -> String {
        date.format(&self.strftime).to_string()
    }

    /// Parse `input` strictly against the pattern.
    ///
    /// Missing time fields default to midnight and a missing offset to UTC.
    pub fn parse(&self, input: &str) -> Result<DateTime<FixedOffset>, String> {
        let mut parsed = Parsed::new();
        chrono::format::parse(&mut parsed, input, StrftimeItems::new(&self.strftime))
            .map_err(|e| format!("{input:?} does not match {}: {e}", self.pattern))?;

        let offset = parsed.to_fixed_offset().unwrap_or_else(|_| Utc.fix());
        let naive = parsed
            .to_naive_datetime_with_offset(offset.local_minus_utc())
            .or_else(|_| {
                parsed
                    .to_naive_date()
                    .map(|date| date.and_time(NaiveTime::MIN))
            })
            .map_err(|e| format!("{input:?} is incomplete for {}: {e}", self.pattern))?;

        offset
            .from_local_datetime(&naive)
            .single()
            .ok_or_else(|| format!("{input:?} is ambiguous for {}", self.pattern))
    }
}

impl fmt::Display for DateFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.pattern)
    }
}

fn translate(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() * 2);
    let mut chars = pattern.chars();

    while let Some(c) = chars.next() {
        let spec = match c {
            '\\' => {
                if let Some(literal) = chars.next() {
                    push_literal(&mut out, literal);
                }
                continue;
            }
            'Y' => "%Y",
            'y' => "%y",
            'm' => "%m",
            'n' => "%-m",
            'd' => "%d",
            'j' => "%-d",
            'H' => "%H",
            'G' => "%-H",
            'h' => "%I",
            'g' => "%-I",
            'i' => "%M",
            's' => "%S",
            'u' => "%6f",
            'v' => "%3f",
            'D' => "%a",
            'l' => "%A",
            'M' => "%b",
            'F' => "%B",
            'A' => "%p",
            'a' => "%P",
            'P' => "%:z",
            'O' => "%z",
            'U' => "%s",
            'c' => "%Y-%m-%dT%H:%M:%S%:z",
            'r' => "%a, %d %b %Y %H:%M:%S %z",
            other => {
                push_literal(&mut out, other);
                continue;
            }
        };
        out.push_str(spec);
    }

    out
}

fn push_literal(out: &mut String, c: char) {
    if c == '%' {
        out.push_str("%%");
    } else {
        out.push(c);
    }
}
