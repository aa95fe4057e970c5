//! Headline KPIs derived from the aggregator views.

use std::collections::HashSet;

use placement_core::models::{
    CityHotspotRow, DashboardKpis, DataHealth, ManagerKpis, PlacementMetricItem, PlacementPace,
    RegionTotalRow, StateRecencyRow, StateTotalRow,
};
use placement_core::regions::{region_for_state, Region, UNKNOWN_CITY, UNKNOWN_STATE};
use placement_core::stats::{median_of_counts, ratio};
use placement_core::thresholds::AnalyticsThresholds;

// ── DataQuality ───────────────────────────────────────────────────────────────

/// Record-level quality counters over a scoped item list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DataQuality {
    pub total_records: u64,
    pub unknown_state_records: u64,
    pub invalid_date_records: u64,
    /// Records with an invalid date or a state that maps to no region.
    pub flawed_records: u64,
}

impl DataQuality {
    pub fn measure(items: &[PlacementMetricItem]) -> Self {
        let mut quality = DataQuality {
            total_records: items.len() as u64,
            ..Self::default()
        };
        for item in items {
            let bad_date = !item.has_valid_date();
            let bad_state = !region_for_state(&item.state).is_known();
            if item.has_unknown_state() {
                quality.unknown_state_records += 1;
            }
            if bad_date {
                quality.invalid_date_records += 1;
            }
            if bad_date || bad_state {
                quality.flawed_records += 1;
            }
        }
        quality
    }

    /// `Issue` once flawed records exceed the configured share.
    pub fn health(&self, thresholds: &AnalyticsThresholds) -> DataHealth {
        if ratio(self.flawed_records, self.total_records) > thresholds.data_health_issue_ratio {
            DataHealth::Issue
        } else {
            DataHealth::Ok
        }
    }
}

// ── Synthesizers ──────────────────────────────────────────────────────────────

/// Organization dashboard KPIs.
///
/// `state_totals` must be in [`MetricsAggregator::state_totals`] order.
///
/// [`MetricsAggregator::state_totals`]: crate::aggregator::MetricsAggregator::state_totals
pub fn synthesize_dashboard(
    items: &[PlacementMetricItem],
    state_totals: &[StateTotalRow],
    recency: &[StateRecencyRow],
    thresholds: &AnalyticsThresholds,
) -> DashboardKpis {
    if items.is_empty() {
        return DashboardKpis::default();
    }

    let known: Vec<&StateTotalRow> = state_totals
        .iter()
        .filter(|row| row.state != UNKNOWN_STATE)
        .collect();
    let active_regions: HashSet<Region> = known
        .iter()
        .map(|row| region_for_state(&row.state))
        .filter(Region::is_known)
        .collect();
    let top = known.first();

    let latest = items
        .iter()
        .filter(|i| i.has_valid_date())
        .max_by_key(|i| (i.placement_time, i.app_id));

    DashboardKpis {
        total_placements: items.len() as u64,
        active_states: known.len(),
        active_regions: active_regions.len(),
        top_state: top.map(|row| row.state.clone()),
        top_state_share: top.map_or(0.0, |row| row.share),
        median_placements_per_state: median_of_counts(known.iter().map(|row| row.placements)),
        stale_states: recency
            .iter()
            .filter(|r| r.state != UNKNOWN_STATE)
            .filter(|r| thresholds.is_stale(r.days_since_last_placement))
            .count(),
        latest_placement_date: latest.and_then(|i| i.placement_date),
        latest_placement_raw: latest
            .map(|i| i.placement_date_raw.clone())
            .unwrap_or_default(),
        data_health: DataQuality::measure(items).health(thresholds),
    }
}

/// Regional manager KPIs: the dashboard summary plus region, city and data
/// quality figures.
///
/// `cities` is the full grouping from [`MetricsAggregator::city_counts`], not
/// the hotspot list capped at `hotspot_limit`.
///
/// [`MetricsAggregator::city_counts`]: crate::aggregator::MetricsAggregator::city_counts
pub fn synthesize_manager(
    items: &[PlacementMetricItem],
    state_totals: &[StateTotalRow],
    region_totals: &[RegionTotalRow],
    recency: &[StateRecencyRow],
    cities: &[CityHotspotRow],
    pace: &PlacementPace,
    thresholds: &AnalyticsThresholds,
) -> ManagerKpis {
    if items.is_empty() {
        return ManagerKpis::default();
    }

    let quality = DataQuality::measure(items);
    ManagerKpis {
        summary: synthesize_dashboard(items, state_totals, recency, thresholds),
        top_region: region_totals
            .iter()
            .find(|row| row.region.is_known())
            .map(|row| row.region),
        unknown_state_records: quality.unknown_state_records,
        invalid_date_records: quality.invalid_date_records,
        avg_placements_per_day: pace.placements_per_day,
        top_city_label: cities
            .iter()
            .find(|h| h.city != UNKNOWN_CITY)
            .map(|h| h.label.clone()),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::MetricsAggregator;
    use chrono::NaiveDate;

    fn item(app_id: i64, state: &str, city: &str, date: &str) -> PlacementMetricItem {
        let parsed = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok();
        PlacementMetricItem {
            app_id,
            city: city.to_string(),
            state: state.to_string(),
            placement_date_raw: date.to_string(),
            placement_date: parsed,
            placement_time: parsed
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|dt| dt.and_utc().timestamp_millis())
                .unwrap_or(0),
        }
    }

    fn fixture() -> Vec<PlacementMetricItem> {
        let mut items = vec![
            item(1, "Texas", "Austin", "2024-06-30"),
            item(2, "Texas", "Austin", "2024-06-20"),
            item(3, "Texas", "Dallas", "2024-05-25"),
            item(4, "Texas", "Houston", "2024-01-05"),
            item(5, "Maine", "Portland", "2024-06-10"),
            item(6, "Maine", "Portland", "2024-04-15"),
            item(7, "Ohio", "Columbus", "2023-12-01"),
            item(8, "Oregon", "Portland", ""),
            item(9, UNKNOWN_STATE, UNKNOWN_CITY, "n/a"),
        ];
        items.sort_by(PlacementMetricItem::canonical_cmp);
        items
    }

    fn dashboard(items: &[PlacementMetricItem], t: &AnalyticsThresholds) -> DashboardKpis {
        let agg = MetricsAggregator::new(items, t);
        synthesize_dashboard(items, &agg.state_totals(), &agg.state_recency(), t)
    }

    #[test]
    fn test_dashboard_kpis() {
        let items = fixture();
        let t = AnalyticsThresholds::default();
        let kpis = dashboard(&items, &t);

        assert_eq!(kpis.total_placements, 9);
        assert_eq!(kpis.active_states, 4);
        assert_eq!(kpis.active_regions, 4);
        assert_eq!(kpis.top_state.as_deref(), Some("Texas"));
        assert!((kpis.top_state_share - 4.0 / 9.0).abs() < 1e-9);
        assert_eq!(kpis.median_placements_per_state, 1.5);
        assert_eq!(kpis.stale_states, 2);
        assert_eq!(kpis.latest_placement_date, NaiveDate::from_ymd_opt(2024, 6, 30));
        assert_eq!(kpis.latest_placement_raw, "2024-06-30");
        assert_eq!(kpis.data_health, DataHealth::Issue);
    }

    #[test]
    fn test_empty_scope_is_zero_valued() {
        let t = AnalyticsThresholds::default();
        assert_eq!(dashboard(&[], &t), DashboardKpis::default());
        let kpis = synthesize_manager(&[], &[], &[], &[], &[], &PlacementPace::default(), &t);
        assert_eq!(kpis, ManagerKpis::default());
        assert_eq!(kpis.summary.data_health, DataHealth::Ok);
    }

    #[test]
    fn test_top_state_skips_sentinel() {
        let items = vec![
            item(1, UNKNOWN_STATE, "Nowhere", "2024-01-01"),
            item(2, UNKNOWN_STATE, "Nowhere", "2024-01-02"),
            item(3, "Iowa", "Ames", "2024-01-03"),
        ];
        let t = AnalyticsThresholds::default();
        let kpis = dashboard(&items, &t);
        assert_eq!(kpis.top_state.as_deref(), Some("Iowa"));
        assert!((kpis.top_state_share - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(kpis.active_states, 1);
    }

    #[test]
    fn test_latest_placement_breaks_ties_by_app_id() {
        let items = vec![
            item(4, "Iowa", "Ames", "2024-01-03"),
            item(9, "Iowa", "Ames", "2024-01-03"),
        ];
        let t = AnalyticsThresholds::default();
        let kpis = dashboard(&items, &t);
        assert_eq!(kpis.latest_placement_date, NaiveDate::from_ymd_opt(2024, 1, 3));
        assert_eq!(kpis.stale_states, 0);
    }

    #[test]
    fn test_data_health_threshold_is_strict() {
        let t = AnalyticsThresholds::default();
        let mut items: Vec<PlacementMetricItem> = (0..9)
            .map(|i| item(i, "Iowa", "Ames", "2024-01-03"))
            .collect();
        items.push(item(9, "Iowa", "Ames", ""));
        // Exactly 10% flawed is still OK.
        assert_eq!(DataQuality::measure(&items).health(&t), DataHealth::Ok);

        items.push(item(10, UNKNOWN_STATE, "Ames", "2024-01-03"));
        let quality = DataQuality::measure(&items);
        assert_eq!(quality.flawed_records, 2);
        assert_eq!(quality.health(&t), DataHealth::Issue);
    }

    #[test]
    fn test_manager_kpis() {
        let items = fixture();
        let t = AnalyticsThresholds::default();
        let agg = MetricsAggregator::new(&items, &t);
        let kpis = synthesize_manager(
            &items,
            &agg.state_totals(),
            &agg.region_totals(),
            &agg.state_recency(),
            &agg.city_counts(),
            &agg.pace(),
            &t,
        );

        assert_eq!(kpis.summary.total_placements, 9);
        assert_eq!(kpis.top_region, Some(Region::South));
        assert_eq!(kpis.unknown_state_records, 1);
        assert_eq!(kpis.invalid_date_records, 2);
        assert!((kpis.avg_placements_per_day - 7.0 / 213.0).abs() < 1e-12);
        assert_eq!(kpis.top_city_label.as_deref(), Some("Austin, Texas"));
    }

    #[test]
    fn test_top_city_looks_past_hotspot_limit() {
        let items = vec![
            item(1, "Iowa", UNKNOWN_CITY, "2024-01-01"),
            item(2, "Iowa", UNKNOWN_CITY, "2024-01-02"),
            item(3, "Iowa", "Ames", "2024-01-03"),
        ];
        let t = AnalyticsThresholds {
            hotspot_limit: 1,
            ..AnalyticsThresholds::default()
        };
        let agg = MetricsAggregator::new(&items, &t);
        assert_eq!(agg.city_hotspots().len(), 1);
        assert_eq!(agg.city_hotspots()[0].city, UNKNOWN_CITY);

        let kpis = synthesize_manager(
            &items,
            &agg.state_totals(),
            &agg.region_totals(),
            &agg.state_recency(),
            &agg.city_counts(),
            &agg.pace(),
            &t,
        );
        assert_eq!(kpis.top_city_label.as_deref(), Some("Ames, Iowa"));
    }

    #[test]
    fn test_manager_kpis_serialize_flat() {
        let items = fixture();
        let t = AnalyticsThresholds::default();
        let agg = MetricsAggregator::new(&items, &t);
        let kpis = synthesize_manager(
            &items,
            &agg.state_totals(),
            &agg.region_totals(),
            &agg.state_recency(),
            &agg.city_counts(),
            &agg.pace(),
            &t,
        );
        let json = serde_json::to_value(&kpis).unwrap();
        assert_eq!(json["totalPlacements"], 9);
        assert_eq!(json["topRegion"], "South");
        assert_eq!(json["dataHealth"], "Issue");
    }
}
