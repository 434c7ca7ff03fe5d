//! Utility functions for date canonicalization, string formatting and logging.
//!
//! Scraped dates arrive in whatever format the source site prints
//! (`"March 5, 2024"`, `"05/03/2024"`, `"Tue, 05 Mar 2024 10:00:00 +0000"`,
//! `"Unknown"`...). [`canonical_date`] turns anything recognizable into
//! `YYYY-MM-DD` and hands everything else back untouched.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%Y.%m.%d",
    "%m/%d/%Y",
    "%m-%d-%Y",
    "%d.%m.%Y",
    "%B %d, %Y",
    "%B %d %Y",
    "%d %B %Y",
    "%d %B, %Y",
    "%d-%b-%Y",
    "%Y %B %d",
];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

static WEEKDAY_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(mon|tue|wed|thu|fri|sat|sun)[a-z]*\.?,?\s+").expect("valid weekday pattern")
});
static ORDINAL_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(\d{1,2})(st|nd|rd|th)\b").expect("valid ordinal pattern"));
static ABBREVIATION_DOT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([A-Za-z]{3,})\.").expect("valid abbreviation pattern"));
static SEPT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bsept\b").expect("valid sept pattern"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace pattern"));

/// Parse a free-form date string leniently.
///
/// Full timestamps (RFC 3339, RFC 2822, ISO date-times) are tried first, then
/// the input is cleaned up (leading weekday names, ordinal suffixes, dotted
/// month abbreviations) and matched against common date layouts. Month-first
/// is assumed for ambiguous numeric dates. A bare `"Month YYYY"` resolves to
/// the first of that month.
pub fn parse_lenient_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(trimmed) {
        return Some(dt.date_naive());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Some(dt.date());
        }
    }

    let cleaned = WEEKDAY_PREFIX.replace(trimmed, "");
    let cleaned = ORDINAL_SUFFIX.replace_all(&cleaned, "$1");
    let cleaned = ABBREVIATION_DOT.replace_all(&cleaned, "$1");
    let cleaned = SEPT.replace_all(&cleaned, "Sep");
    let cleaned = WHITESPACE.replace_all(cleaned.trim(), " ");

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(&cleaned, fmt).ok())
        .or_else(|| NaiveDate::parse_from_str(&format!("1 {cleaned}"), "%d %B %Y").ok())
}

/// Canonicalize a date to `YYYY-MM-DD`, or return the input verbatim when it
/// cannot be parsed.
pub fn canonical_date(raw: &str) -> String {
    match parse_lenient_date(raw) {
        Some(date) => date.format("%Y-%m-%d").to_string(),
        None => raw.to_string(),
    }
}

/// Truncate a string for logging purposes.
///
/// Long strings are cut to at most `max` bytes (on a character boundary)
/// with an ellipsis and byte count indicator appended.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…(+{} bytes)", &s[..end], s.len() - end)
}

/// Upper-case the first character and lower-case the rest.
///
/// ```ignore
/// assert_eq!(capitalize("SMEC"), "Smec");
/// assert_eq!(capitalize(""), "");
/// ```
pub fn capitalize(s: &str) -> String {
    let mut c = s.chars();
    match c.next() {
        None => String::new(),
        Some(f) => f.to_uppercase().collect::<String>() + &c.as_str().to_lowercase(),
    }
}
