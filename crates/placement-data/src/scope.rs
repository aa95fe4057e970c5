//! Reporting scope: an inclusive date range plus a free-text search.

use chrono::{Duration, NaiveDate};
use placement_core::models::PlacementMetricItem;
use placement_core::regions::region_for_state;

/// The active date-range / search restriction applied before aggregation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportScope {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub search: Option<String>,
}

impl ReportScope {
    /// Unrestricted scope.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn new(from: Option<NaiveDate>, to: Option<NaiveDate>, search: Option<String>) -> Self {
        let search = search
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());
        Self { from, to, search }
    }

    /// Replace the search text, normalized the same way as [`Self::new`].
    pub fn with_search(self, search: Option<String>) -> Self {
        Self::new(self.from, self.to, search)
    }

    /// The trailing `days` days ending at `today` (inclusive).
    pub fn last_days(today: NaiveDate, days: u32) -> Self {
        let span = i64::from(days.max(1)) - 1;
        Self::new(Some(today - Duration::days(span)), Some(today), None)
    }

    pub fn is_unrestricted(&self) -> bool {
        self.from.is_none() && self.to.is_none() && self.search.is_none()
    }

    /// Whether `item` falls inside the scope.
    ///
    /// Undated items are outside any scope that sets a date bound.
    pub fn matches(&self, item: &PlacementMetricItem) -> bool {
        if self.from.is_some() || self.to.is_some() {
            let Some(date) = item.placement_date else {
                return false;
            };
            if self.from.is_some_and(|from| date < from) || self.to.is_some_and(|to| date > to) {
                return false;
            }
        }

        match &self.search {
            None => true,
            Some(needle) => {
                item.city.to_lowercase().contains(needle)
                    || item.state.to_lowercase().contains(needle)
                    || region_for_state(&item.state)
                        .as_str()
                        .to_lowercase()
                        .contains(needle)
                    || item.app_id.to_string().contains(needle)
            }
        }
    }

    /// Items inside the scope, order preserved.
    pub fn apply(&self, items: &[PlacementMetricItem]) -> Vec<PlacementMetricItem> {
        if self.is_unrestricted() {
            return items.to_vec();
        }
        items.iter().filter(|i| self.matches(i)).cloned().collect()
    }

    /// Stable textual key for result caching.
    pub fn cache_key(&self) -> String {
        fn bound(d: Option<NaiveDate>) -> String {
            d.map(|d| d.to_string()).unwrap_or_else(|| "*".to_string())
        }
        format!(
            "{}..{}|{}",
            bound(self.from),
            bound(self.to),
            self.search.as_deref().unwrap_or("")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn item(app_id: i64, city: &str, state: &str, date: Option<NaiveDate>) -> PlacementMetricItem {
        PlacementMetricItem {
            app_id,
            city: city.to_string(),
            state: state.to_string(),
            placement_date_raw: date.map(|d| d.to_string()).unwrap_or_default(),
            placement_date: date,
            placement_time: date
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|dt| dt.and_utc().timestamp_millis())
                .unwrap_or(0),
        }
    }

    fn fixture() -> Vec<PlacementMetricItem> {
        vec![
            item(3, "Dallas", "Texas", Some(d(2024, 2, 1))),
            item(2, "Austin", "Texas", Some(d(2024, 1, 10))),
            item(1, "Portland", "Maine", None),
        ]
    }

    #[test]
    fn test_unrestricted_scope_keeps_everything() {
        assert_eq!(ReportScope::all().apply(&fixture()).len(), 3);
    }

    #[test]
    fn test_date_range_is_inclusive_and_drops_undated() {
        let scope = ReportScope::new(Some(d(2024, 1, 10)), Some(d(2024, 1, 31)), None);
        let scoped = scope.apply(&fixture());
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].app_id, 2);
    }

    #[test]
    fn test_open_ended_range() {
        let scope = ReportScope::new(Some(d(2024, 1, 11)), None, None);
        let ids: Vec<i64> = scope.apply(&fixture()).iter().map(|i| i.app_id).collect();
        assert_eq!(ids, vec![3]);
    }

    #[test]
    fn test_search_matches_city_state_region_and_id() {
        let items = fixture();
        let count = |q: &str| ReportScope::new(None, None, Some(q.to_string())).apply(&items).len();
        assert_eq!(count("austin"), 1);
        assert_eq!(count("TEXAS"), 2);
        assert_eq!(count("northeast"), 1);
        assert_eq!(count("3"), 1);
        assert_eq!(count("   "), 3);
    }

    #[test]
    fn test_last_days() {
        let scope = ReportScope::last_days(d(2024, 2, 1), 30);
        assert_eq!(scope.from, Some(d(2024, 1, 3)));
        assert_eq!(scope.to, Some(d(2024, 2, 1)));
    }

    #[test]
    fn test_last_days_with_search_keeps_window() {
        let scope = ReportScope::last_days(d(2024, 2, 1), 7).with_search(Some(" Ohio ".into()));
        assert_eq!(scope.from, Some(d(2024, 1, 26)));
        assert_eq!(scope.to, Some(d(2024, 2, 1)));
        assert_eq!(scope.search.as_deref(), Some("ohio"));
        assert!(ReportScope::all().with_search(Some("  ".into())).is_unrestricted());
    }

    #[test]
    fn test_cache_key_distinguishes_scopes() {
        let a = ReportScope::new(Some(d(2024, 1, 1)), None, Some(" Texas ".to_string()));
        assert_eq!(a.cache_key(), "2024-01-01..*|texas");
        assert_eq!(ReportScope::all().cache_key(), "*..*|");
    }
}
