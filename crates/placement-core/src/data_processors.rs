use std::sync::OnceLock;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeZone, Utc};
use regex::Regex;
use serde_json::Value;
use tracing::trace;

// ── ValueCoercer ──────────────────────────────────────────────────────────────

/// Coerces loosely-typed JSON field values into the primitives the
/// normalizer needs. Every method is total.
pub struct ValueCoercer;

impl ValueCoercer {
    /// Integer coercion for identifiers.
    ///
    /// Accepts integer numbers, floats with no fractional part and trimmed
    /// integer strings. Anything else (including empty strings) is `None`.
    pub fn as_integer(value: Option<&Value>) -> Option<i64> {
        match value? {
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(i)
                } else {
                    let f = n.as_f64()?;
                    if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                        Some(f as i64)
                    } else {
                        None
                    }
                }
            }
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return None;
                }
                trimmed
                    .parse::<i64>()
                    .ok()
                    .or_else(|| Self::as_integer(Some(&Value::from(trimmed.parse::<f64>().ok()?))))
            }
            _ => None,
        }
    }

    /// Trimmed text from a string or number; `None` for anything else or a
    /// blank result.
    pub fn as_trimmed_string(value: Option<&Value>) -> Option<String> {
        let text = match value? {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }

    /// Return the first of `keys` present on `obj` with a non-null value.
    pub fn first_present<'a>(obj: &'a Value, keys: &[&str]) -> Option<&'a Value> {
        keys.iter()
            .filter_map(|key| obj.get(*key))
            .find(|v| !v.is_null())
    }
}

// ── PlacementDateParser ───────────────────────────────────────────────────────

/// Resolves the placement date strings found in exported records.
pub struct PlacementDateParser;

impl PlacementDateParser {
    /// Parse a placement date.
    ///
    /// A general calendar parse is tried first (RFC 3339, RFC 2822, ISO
    /// date-times, `YYYY-MM-DD`, month-name forms). Values without an offset
    /// are taken as UTC. Only if that fails is strict `M/D/YYYY` attempted,
    /// with explicit calendar validation so `2/30/2020` and `13/1/2023` are
    /// rejected rather than rolled over.
    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        let parsed = Self::parse_general(trimmed).or_else(|| Self::parse_month_day_year(trimmed));
        if parsed.is_none() {
            trace!("PlacementDateParser: unparseable date \"{}\"", trimmed);
        }
        parsed
    }

    fn parse_general(s: &str) -> Option<DateTime<Utc>> {
        let normalised = if let Some(stripped) = s.strip_suffix('Z') {
            format!("{}+00:00", stripped)
        } else {
            s.to_string()
        };
        if let Ok(dt) = DateTime::parse_from_rfc3339(&normalised) {
            return Some(dt.with_timezone(&Utc));
        }
        if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
            return Some(dt.with_timezone(&Utc));
        }

        const DATETIME_FORMATS: &[&str] = &[
            "%Y-%m-%dT%H:%M:%S%.f",
            "%Y-%m-%dT%H:%M:%S",
            "%Y-%m-%dT%H:%M",
            "%Y-%m-%d %H:%M:%S%.f",
            "%Y-%m-%d %H:%M:%S",
            "%Y-%m-%d %H:%M",
        ];
        for fmt in DATETIME_FORMATS {
            if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
                return Some(Utc.from_utc_datetime(&naive));
            }
        }

        const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%B %d, %Y", "%b %d, %Y", "%d %B %Y", "%d %b %Y"];
        for fmt in DATE_FORMATS {
            if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
                return Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?));
            }
        }
        None
    }

    fn parse_month_day_year(s: &str) -> Option<DateTime<Utc>> {
        static MDY: OnceLock<Regex> = OnceLock::new();
        let re = MDY.get_or_init(|| {
            Regex::new(r"^(\d{1,2})/(\d{1,2})/(\d{4})$").expect("regex is valid")
        });

        let caps = re.captures(s)?;
        let month: u32 = caps[1].parse().ok()?;
        let day: u32 = caps[2].parse().ok()?;
        let year: i32 = caps[3].parse().ok()?;
        if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
            return None;
        }

        let date = NaiveDate::from_ymd_opt(year, month, day)?;
        // Round-trip guard against any calendar rollover.
        if date.year() != year || date.month() != month || date.day() != day {
            return None;
        }
        Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?))
    }
}

/// Shorthand for [`PlacementDateParser::parse`].
pub fn parse_placement_date(raw: &str) -> Option<DateTime<Utc>> {
    PlacementDateParser::parse(raw)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
