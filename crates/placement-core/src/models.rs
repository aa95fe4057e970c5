use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::regions::{Region, UNKNOWN_STATE};

/// A single validated placement record produced by the normalizer.
///
/// Immutable once built; the normalized list is rebuilt on every refetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacementMetricItem {
    /// Source `app_id`, or the element's position in the payload when the
    /// field is missing or non-numeric. Not unique across refetches.
    pub app_id: i64,
    /// Trimmed city, or [`UNKNOWN_CITY`](crate::regions::UNKNOWN_CITY).
    pub city: String,
    /// Canonical state name, or [`UNKNOWN_STATE`].
    pub state: String,
    /// Trimmed original date text; empty when absent.
    pub placement_date_raw: String,
    /// Parsed calendar date (UTC), when the raw text was understood.
    pub placement_date: Option<NaiveDate>,
    /// Epoch milliseconds of the parsed date; `0` when unparseable.
    pub placement_time: i64,
}

impl PlacementMetricItem {
    pub fn has_valid_date(&self) -> bool {
        self.placement_date.is_some()
    }

    pub fn has_unknown_state(&self) -> bool {
        self.state == UNKNOWN_STATE
    }

    /// Canonical ordering: dated before undated, then `placement_time`
    /// descending, then `app_id` descending.
    ///
    /// The dated prefix outranks undated records even when its times are
    /// negative (pre-1970), so `placement_time` is only non-increasing
    /// within each group.
    pub fn canonical_cmp(&self, other: &Self) -> Ordering {
        other
            .has_valid_date()
            .cmp(&self.has_valid_date())
            .then_with(|| other.placement_time.cmp(&self.placement_time))
            .then_with(|| other.app_id.cmp(&self.app_id))
    }
}

// ── Organization dashboard rows ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateTotalRow {
    pub state: String,
    pub placements: u64,
    /// `placements / total scoped placements`.
    pub share: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateGrowthPoint {
    pub state: String,
    /// Placements in the trailing window ending at the anchor.
    pub recent_placements: u64,
    /// Placements in the window immediately before `recent`.
    pub prior_placements: u64,
    /// Percent change; saturates at 100 (or 0) when the prior window is empty.
    pub growth_pct: f64,
    pub growth_delta: i64,
    pub total_placements: u64,
}

/// One ISO week of the weekly pivot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateWeeklyRow {
    /// ISO week key, e.g. `"2024-W05"`.
    pub week_key: String,
    /// Week-start label, e.g. `"Jan 29"`.
    pub week_label: String,
    /// Monday that starts the week.
    pub week_start: NaiveDate,
    pub total: u64,
    /// Count for every state in the scoped set, zero-filled.
    pub placements_by_state: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateParetoRow {
    pub state: String,
    pub placements: u64,
    pub share: f64,
    /// Running sum of `share`; reaches 1.0 at the last row.
    pub cumulative_share: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSeasonalityCell {
    pub state: String,
    pub state_index: usize,
    /// `"YYYY-MM"`.
    pub month_key: String,
    /// `"Mon YYYY"`.
    pub month_label: String,
    /// 0 is the oldest month in the grid.
    pub month_index: usize,
    pub placements: u64,
    /// `placements / grid maximum`, in `[0, 1]`.
    pub intensity: f64,
}

/// Staleness classification for a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskBand {
    Healthy,
    Watch,
    #[serde(rename = "At Risk")]
    AtRisk,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateRecencyRow {
    pub state: String,
    /// Days from the state's latest placement to the anchor; `None` when the
    /// state has no dated placement.
    pub days_since_last_placement: Option<i64>,
    pub risk_band: RiskBand,
    pub total_placements: u64,
    pub last_placement_label: String,
}

/// Placement rate over the dated span of the scoped set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacementPace {
    pub dated_placements: u64,
    /// Inclusive day span from earliest to latest dated placement.
    pub span_days: i64,
    pub placements_per_day: f64,
    pub placements_per_week: f64,
    /// Dated placements in the trailing growth window.
    pub recent_window_placements: u64,
}

// ── Manager dashboard rows ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionTotalRow {
    pub region: Region,
    pub placements: u64,
    pub share: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateCountRow {
    pub state: String,
    pub region: Region,
    pub placements: u64,
    pub share: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CityHotspotRow {
    pub city: String,
    pub state: String,
    /// `"City, State"`.
    pub label: String,
    pub placements: u64,
    pub share: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaleStateRow {
    pub state: String,
    pub region: Region,
    pub days_since_last_placement: Option<i64>,
    pub last_placement_label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageStateRow {
    pub state: String,
    pub placements: u64,
    /// `true` when the state has no scoped placements.
    pub untapped: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageRegionRow {
    pub region: Region,
    pub total_placements: u64,
    pub covered_states: usize,
    pub untapped_states: usize,
    pub states: Vec<CoverageStateRow>,
}

/// Bucket width of the manager trend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendGranularity {
    Week,
    Month,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    pub period_key: String,
    pub period_label: String,
    pub placements: u64,
}

// ── KPIs ──────────────────────────────────────────────────────────────────────

/// Coarse data-quality flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DataHealth {
    #[default]
    #[serde(rename = "OK")]
    Ok,
    Issue,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardKpis {
    pub total_placements: u64,
    /// Distinct canonical states (the unknown sentinel excluded).
    pub active_states: usize,
    /// Distinct census regions (`Unknown` excluded).
    pub active_regions: usize,
    pub top_state: Option<String>,
    pub top_state_share: f64,
    pub median_placements_per_state: f64,
    pub stale_states: usize,
    pub latest_placement_date: Option<NaiveDate>,
    pub latest_placement_raw: String,
    pub data_health: DataHealth,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagerKpis {
    #[serde(flatten)]
    pub summary: DashboardKpis,
    pub top_region: Option<Region>,
    pub unknown_state_records: u64,
    pub invalid_date_records: u64,
    pub avg_placements_per_day: f64,
    /// `"City, State"` of the busiest known city.
    pub top_city_label: Option<String>,
}

// ── Tests ─────────────────────────────────────────────────────────────────────
