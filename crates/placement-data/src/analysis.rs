//! Analysis pipeline for both dashboards.
//!
//! Applies the [`ReportScope`], runs the [`MetricsAggregator`] views and the
//! KPI synthesizers, and returns one serializable result per dashboard.

use std::time::Instant;

use placement_core::models::{
    CityHotspotRow, CoverageRegionRow, DashboardKpis, ManagerKpis, PlacementMetricItem,
    PlacementPace, RegionTotalRow, StaleStateRow, StateCountRow, StateGrowthPoint,
    StateParetoRow, StateRecencyRow, StateSeasonalityCell, StateTotalRow, StateWeeklyRow,
    TrendGranularity, TrendPoint,
};
use placement_core::thresholds::AnalyticsThresholds;
use serde::Serialize;
use tracing::debug;

use crate::aggregator::MetricsAggregator;
use crate::kpis::{synthesize_dashboard, synthesize_manager};
use crate::scope::ReportScope;

// ── Public types ──────────────────────────────────────────────────────────────

/// Everything the organization dashboard renders.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardAnalytics {
    /// Records left after scoping, dated or not.
    pub scoped_placements: usize,
    pub state_totals: Vec<StateTotalRow>,
    pub state_growth: Vec<StateGrowthPoint>,
    pub state_weekly: Vec<StateWeeklyRow>,
    pub state_pareto: Vec<StateParetoRow>,
    pub state_seasonality: Vec<StateSeasonalityCell>,
    pub state_recency: Vec<StateRecencyRow>,
    pub pace: PlacementPace,
    pub kpis: DashboardKpis,
}

/// Everything the regional manager dashboard renders.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagerAnalytics {
    pub scoped_placements: usize,
    pub region_totals: Vec<RegionTotalRow>,
    pub state_counts: Vec<StateCountRow>,
    pub city_hotspots: Vec<CityHotspotRow>,
    pub stale_states: Vec<StaleStateRow>,
    pub coverage: Vec<CoverageRegionRow>,
    pub untapped_states: Vec<String>,
    pub trend_granularity: TrendGranularity,
    pub trend: Vec<TrendPoint>,
    pub state_recency: Vec<StateRecencyRow>,
    pub kpis: ManagerKpis,
}

// ── Pipelines ─────────────────────────────────────────────────────────────────

/// Scope `items` and compute the organization dashboard.
pub fn analyze_dashboard(
    items: &[PlacementMetricItem],
    scope: &ReportScope,
    thresholds: &AnalyticsThresholds,
) -> DashboardAnalytics {
    let started = Instant::now();
    let scoped = scope.apply(items);
    let agg = MetricsAggregator::new(&scoped, thresholds);

    let state_totals = agg.state_totals();
    let state_recency = agg.state_recency();
    let kpis = synthesize_dashboard(&scoped, &state_totals, &state_recency, thresholds);

    let result = DashboardAnalytics {
        scoped_placements: scoped.len(),
        state_growth: agg.state_growth(),
        state_weekly: agg.state_weekly(),
        state_pareto: agg.state_pareto(),
        state_seasonality: agg.state_seasonality(),
        pace: agg.pace(),
        state_totals,
        state_recency,
        kpis,
    };

    debug!(
        "Dashboard analytics: {} of {} records in scope, {} states, {:.3}ms",
        result.scoped_placements,
        items.len(),
        result.state_totals.len(),
        started.elapsed().as_secs_f64() * 1000.0
    );
    result
}

/// Scope `items` and compute the regional manager dashboard.
pub fn analyze_manager(
    items: &[PlacementMetricItem],
    scope: &ReportScope,
    thresholds: &AnalyticsThresholds,
) -> ManagerAnalytics {
    let started = Instant::now();
    let scoped = scope.apply(items);
    let agg = MetricsAggregator::new(&scoped, thresholds);

    let state_totals = agg.state_totals();
    let region_totals = agg.region_totals();
    let state_recency = agg.state_recency();
    let cities = agg.city_counts();
    let pace = agg.pace();
    let (trend_granularity, trend) = agg.trend();

    let kpis = synthesize_manager(
        &scoped,
        &state_totals,
        &region_totals,
        &state_recency,
        &cities,
        &pace,
        thresholds,
    );

    let result = ManagerAnalytics {
        scoped_placements: scoped.len(),
        state_counts: agg.state_counts(),
        stale_states: agg.stale_states_from(&state_recency),
        coverage: agg.coverage(),
        untapped_states: agg.untapped_states(),
        region_totals,
        city_hotspots: cities
            .into_iter()
            .take(thresholds.hotspot_limit)
            .collect(),
        trend_granularity,
        trend,
        state_recency,
        kpis,
    };

    debug!(
        "Manager analytics: {} of {} records in scope, {} untapped states, {:.3}ms",
        result.scoped_placements,
        items.len(),
        result.untapped_states.len(),
        started.elapsed().as_secs_f64() * 1000.0
    );
    result
}

// ── Tests ─────────────────────────────────────────────────────────────────────
