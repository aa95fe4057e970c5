use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, Utc};
use chrono_tz::Tz;
use tracing::warn;

/// Milliseconds in one calendar day.
pub const DAY_MS: i64 = 86_400_000;

// ── System timezone detection ─────────────────────────────────────────────────

/// Detect the IANA timezone name of the running system.
///
/// Falls back to `"UTC"` if detection fails.
pub fn get_system_timezone() -> String {
    iana_time_zone::get_timezone().unwrap_or_else(|_| "UTC".to_string())
}

/// The calendar date of `now` as observed in `tz_name`.
///
/// Unrecognised timezone names fall back to UTC with a warning.
pub fn date_in_timezone(now: DateTime<Utc>, tz_name: &str) -> NaiveDate {
    let tz = tz_name.parse::<Tz>().unwrap_or_else(|_| {
        warn!(
            "date_in_timezone: unrecognised timezone \"{}\", falling back to UTC",
            tz_name
        );
        Tz::UTC
    });
    now.with_timezone(&tz).date_naive()
}

// ── Epoch conversions ─────────────────────────────────────────────────────────

/// UTC calendar date of an epoch-millisecond timestamp.
pub fn date_from_millis(ms: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp_millis(ms).map(|dt| dt.date_naive())
}

/// Whole days elapsed from `earlier_ms` to `later_ms` (floored).
pub fn whole_days_between(earlier_ms: i64, later_ms: i64) -> i64 {
    (later_ms - earlier_ms).div_euclid(DAY_MS)
}

// ── Weeks ─────────────────────────────────────────────────────────────────────

/// Monday that starts the ISO week containing `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

/// ISO week key such as `"2024-W05"` (ISO week-numbering year).
pub fn iso_week_key(date: NaiveDate) -> String {
    let iso = date.iso_week();
    format!("{}-W{:02}", iso.year(), iso.week())
}

// ── Months ────────────────────────────────────────────────────────────────────

/// First day of the month containing `date`.
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Shift a month-start date by `delta` months (negative moves back).
pub fn shift_months(date: NaiveDate, delta: i32) -> NaiveDate {
    let shifted = if delta >= 0 {
        date.checked_add_months(Months::new(delta.unsigned_abs()))
    } else {
        date.checked_sub_months(Months::new(delta.unsigned_abs()))
    };
    shifted.unwrap_or(date)
}

/// Month key such as `"2024-01"`.
pub fn month_key(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}

/// Zero-based month ordinal (`year * 12 + month0`), handy for bucketing.
pub fn month_ordinal(date: NaiveDate) -> i64 {
    i64::from(date.year()) * 12 + i64::from(date.month0())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
