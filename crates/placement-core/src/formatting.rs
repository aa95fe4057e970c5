use chrono::NaiveDate;

/// Label shown when a state or record has no parseable placement date.
pub const NO_DATE_LABEL: &str = "No valid date";

/// Format a fraction in `[0, 1]` as a percentage with one decimal place.
///
/// # Examples
///
/// ```
/// use placement_core::formatting::format_share;
///
/// assert_eq!(format_share(2.0 / 3.0), "66.7%");
/// assert_eq!(format_share(1.0), "100.0%");
/// assert_eq!(format_share(0.0), "0.0%");
/// ```
pub fn format_share(share: f64) -> String {
    if !share.is_finite() {
        return "0.0%".to_string();
    }
    format!("{:.1}%", share * 100.0)
}

/// Short week label for a week-start date, e.g. `"Jan 29"`.
///
/// ```
/// use chrono::NaiveDate;
/// use placement_core::formatting::week_label;
///
/// let monday = NaiveDate::from_ymd_opt(2024, 1, 29).unwrap();
/// assert_eq!(week_label(monday), "Jan 29");
/// ```
pub fn week_label(week_start: NaiveDate) -> String {
    week_start.format("%b %-d").to_string()
}

/// Month label, e.g. `"Jan 2024"`.
///
/// ```
/// use chrono::NaiveDate;
/// use placement_core::formatting::month_label;
///
/// let first = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
/// assert_eq!(month_label(first), "Jan 2024");
/// ```
pub fn month_label(month_start: NaiveDate) -> String {
    month_start.format("%b %Y").to_string()
}

/// Calendar date label, or [`NO_DATE_LABEL`] when absent.
///
/// ```
/// use chrono::NaiveDate;
/// use placement_core::formatting::date_label;
///
/// assert_eq!(date_label(NaiveDate::from_ymd_opt(2024, 2, 1)), "Feb 1, 2024");
/// assert_eq!(date_label(None), "No valid date");
/// ```
pub fn date_label(date: Option<NaiveDate>) -> String {
    match date {
        Some(d) => d.format("%b %-d, %Y").to_string(),
        None => NO_DATE_LABEL.to_string(),
    }
}

/// Combined `"City, State"` label used by hotspot rows.
pub fn city_label(city: &str, state: &str) -> String {
    format!("{}, {}", city, state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_share_non_finite() {
        assert_eq!(format_share(f64::NAN), "0.0%");
        assert_eq!(format_share(0.1234), "12.3%");
    }

    #[test]
    fn test_city_label() {
        assert_eq!(city_label("Austin", "Texas"), "Austin, Texas");
    }
}
