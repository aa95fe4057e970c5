//! Derived placement views over a scoped item list.
//!
//! Every trailing window is anchored on the latest dated placement in the
//! scoped set rather than the wall clock, so all views are pure functions of
//! their input.

use std::collections::{BTreeMap, HashMap};

use chrono::{Days, Duration, Months, NaiveDate};
use placement_core::formatting::{city_label, date_label, month_label, week_label};
use placement_core::models::{
    CityHotspotRow, CoverageRegionRow, CoverageStateRow, PlacementMetricItem, PlacementPace,
    RegionTotalRow, StaleStateRow, StateCountRow, StateGrowthPoint, StateParetoRow,
    StateRecencyRow, StateSeasonalityCell, StateTotalRow, StateWeeklyRow, TrendGranularity,
    TrendPoint,
};
use placement_core::regions::{region_for_state, states_in_region, Region, UNKNOWN_STATE};
use placement_core::stats::ratio;
use placement_core::thresholds::AnalyticsThresholds;
use placement_core::time_utils::{
    date_from_millis, iso_week_key, month_key, month_ordinal, month_start, shift_months,
    week_start, whole_days_between, DAY_MS,
};

// ── StateBucket ───────────────────────────────────────────────────────────────

/// Per-state totals gathered in the constructor's single pass.
#[derive(Debug, Clone, Copy, Default)]
struct StateBucket {
    placements: u64,
    latest_time: Option<i64>,
}

// ── MetricsAggregator ─────────────────────────────────────────────────────────

/// Computes every dashboard view from one scoped item list.
///
/// Grouping is by exact canonical state string; the unknown-state sentinel
/// is an ordinary bucket of its own.
pub struct MetricsAggregator<'a> {
    items: &'a [PlacementMetricItem],
    thresholds: &'a AnalyticsThresholds,
    states: BTreeMap<&'a str, StateBucket>,
    anchor: Option<i64>,
    earliest: Option<i64>,
}

impl<'a> MetricsAggregator<'a> {
    pub fn new(items: &'a [PlacementMetricItem], thresholds: &'a AnalyticsThresholds) -> Self {
        let mut states: BTreeMap<&'a str, StateBucket> = BTreeMap::new();
        let mut anchor: Option<i64> = None;
        let mut earliest: Option<i64> = None;

        for item in items {
            let bucket = states.entry(item.state.as_str()).or_default();
            bucket.placements += 1;

            if item.has_valid_date() {
                let t = item.placement_time;
                bucket.latest_time = Some(bucket.latest_time.map_or(t, |l| l.max(t)));
                anchor = Some(anchor.map_or(t, |a| a.max(t)));
                earliest = Some(earliest.map_or(t, |e| e.min(t)));
            }
        }

        Self {
            items,
            thresholds,
            states,
            anchor,
            earliest,
        }
    }

    /// Latest dated placement time in the scoped set.
    pub fn anchor_time(&self) -> Option<i64> {
        self.anchor
    }

    pub fn anchor_date(&self) -> Option<NaiveDate> {
        self.anchor.and_then(date_from_millis)
    }

    /// All scoped records, dated or not.
    pub fn total_placements(&self) -> u64 {
        self.items.len() as u64
    }

    // ── Organization views ────────────────────────────────────────────────

    /// Placements and share per state, busiest first (ties alphabetical).
    pub fn state_totals(&self) -> Vec<StateTotalRow> {
        let total = self.total_placements();
        self.states_by_volume()
            .into_iter()
            .map(|(state, bucket)| StateTotalRow {
                state: state.to_string(),
                placements: bucket.placements,
                share: ratio(bucket.placements, total),
            })
            .collect()
    }

    /// Recent-vs-prior window growth for every scoped state.
    ///
    /// With an empty prior window the percentage saturates: 100 when the
    /// recent window has placements, otherwise 0.
    pub fn state_growth(&self) -> Vec<StateGrowthPoint> {
        let Some(anchor) = self.anchor else {
            return Vec::new();
        };
        let window = self.window_ms();
        let recent_start = anchor.saturating_sub(window);
        let prior_start = recent_start.saturating_sub(window);

        let mut windows: HashMap<&str, (u64, u64)> = HashMap::new();
        for item in self.dated_items() {
            let t = item.placement_time;
            let counts = windows.entry(item.state.as_str()).or_default();
            if t > recent_start && t <= anchor {
                counts.0 += 1;
            } else if t > prior_start && t <= recent_start {
                counts.1 += 1;
            }
        }

        let mut rows: Vec<StateGrowthPoint> = self
            .states
            .iter()
            .map(|(state, bucket)| {
                let (recent, prior) = windows.get(state).copied().unwrap_or_default();
                StateGrowthPoint {
                    state: state.to_string(),
                    recent_placements: recent,
                    prior_placements: prior,
                    growth_pct: growth_pct(recent, prior),
                    growth_delta: recent as i64 - prior as i64,
                    total_placements: bucket.placements,
                }
            })
            .collect();

        rows.sort_by(|a, b| {
            b.growth_delta
                .cmp(&a.growth_delta)
                .then_with(|| b.recent_placements.cmp(&a.recent_placements))
                .then_with(|| a.state.cmp(&b.state))
        });
        rows
    }

    /// Weekly pivot: contiguous ISO weeks ending at the anchor's week, oldest
    /// first, with a zero-filled count for every scoped state.
    pub fn state_weekly(&self) -> Vec<StateWeeklyRow> {
        let Some(anchor_date) = self.anchor_date() else {
            return Vec::new();
        };
        let weeks = self.thresholds.weekly_horizon_weeks;
        let last_week = week_start(anchor_date);
        // A horizon reaching past the calendar yields no rows.
        let Some(first_week) = weeks
            .checked_sub(1)
            .and_then(|back| u64::try_from(back).ok()?.checked_mul(7))
            .and_then(|days| last_week.checked_sub_days(Days::new(days)))
        else {
            return Vec::new();
        };

        let zero_filled: BTreeMap<String, u64> =
            self.states.keys().map(|s| (s.to_string(), 0)).collect();

        let mut rows: Vec<StateWeeklyRow> = (0..weeks)
            .map(|i| {
                let start = first_week + Duration::weeks(i as i64);
                StateWeeklyRow {
                    week_key: iso_week_key(start),
                    week_label: week_label(start),
                    week_start: start,
                    total: 0,
                    placements_by_state: zero_filled.clone(),
                }
            })
            .collect();

        for item in self.dated_items() {
            let Some(date) = item.placement_date else {
                continue;
            };
            let start = week_start(date);
            if start < first_week || start > last_week {
                continue;
            }
            let index = ((start - first_week).num_days() / 7) as usize;
            let row = &mut rows[index];
            row.total += 1;
            *row.placements_by_state
                .entry(item.state.clone())
                .or_insert(0) += 1;
        }

        rows
    }

    /// Concentration ranking with a running cumulative share.
    pub fn state_pareto(&self) -> Vec<StateParetoRow> {
        let total = self.total_placements();
        if total == 0 {
            return Vec::new();
        }

        let mut cumulative = 0.0_f64;
        let mut rows: Vec<StateParetoRow> = self
            .states_by_volume()
            .into_iter()
            .map(|(state, bucket)| {
                let share = ratio(bucket.placements, total);
                cumulative = (cumulative + share).min(1.0);
                StateParetoRow {
                    state: state.to_string(),
                    placements: bucket.placements,
                    share,
                    cumulative_share: cumulative,
                }
            })
            .collect();

        // Every state is listed, so the running sum is exactly 1 in theory.
        if let Some(last) = rows.last_mut() {
            last.cumulative_share = 1.0;
        }
        rows
    }

    /// State × trailing-month grid.
    ///
    /// `intensity` is normalized against the single busiest cell of the whole
    /// grid so colours are comparable across states.
    pub fn state_seasonality(&self) -> Vec<StateSeasonalityCell> {
        let Some(anchor_date) = self.anchor_date() else {
            return Vec::new();
        };
        let months = self.thresholds.seasonality_months;
        let last_month = month_start(anchor_date);
        let Some(first_month) = months
            .checked_sub(1)
            .and_then(|back| u32::try_from(back).ok())
            .and_then(|back| last_month.checked_sub_months(Months::new(back)))
        else {
            return Vec::new();
        };
        let first_ordinal = month_ordinal(first_month);
        let last_ordinal = month_ordinal(last_month);

        let ordered = self.states_by_volume();
        let state_index: HashMap<&str, usize> = ordered
            .iter()
            .enumerate()
            .map(|(i, (state, _))| (*state, i))
            .collect();

        let mut grid = vec![vec![0u64; months]; ordered.len()];
        for item in self.dated_items() {
            let Some(date) = item.placement_date else {
                continue;
            };
            let ordinal = month_ordinal(date);
            if ordinal < first_ordinal || ordinal > last_ordinal {
                continue;
            }
            if let Some(&row) = state_index.get(item.state.as_str()) {
                grid[row][(ordinal - first_ordinal) as usize] += 1;
            }
        }

        let grid_max = grid.iter().flatten().copied().max().unwrap_or(0);

        let mut cells = Vec::with_capacity(ordered.len() * months);
        for (si, (state, _)) in ordered.iter().enumerate() {
            for mi in 0..months {
                let month = shift_months(first_month, mi as i32);
                let placements = grid[si][mi];
                cells.push(StateSeasonalityCell {
                    state: state.to_string(),
                    state_index: si,
                    month_key: month_key(month),
                    month_label: month_label(month),
                    month_index: mi,
                    placements,
                    intensity: ratio(placements, grid_max),
                });
            }
        }
        cells
    }

    /// Days since each state's last placement, banded, stalest first.
    pub fn state_recency(&self) -> Vec<StateRecencyRow> {
        let mut rows: Vec<StateRecencyRow> = self
            .states
            .iter()
            .map(|(state, bucket)| {
                let days = self.days_since(bucket);
                StateRecencyRow {
                    state: state.to_string(),
                    days_since_last_placement: days,
                    risk_band: self.thresholds.risk_band(days),
                    total_placements: bucket.placements,
                    last_placement_label: date_label(bucket.latest_time.and_then(date_from_millis)),
                }
            })
            .collect();

        rows.sort_by(|a, b| {
            staleness(b.days_since_last_placement)
                .cmp(&staleness(a.days_since_last_placement))
                .then_with(|| a.state.cmp(&b.state))
        });
        rows
    }

    /// Placement rate across the dated span of the scoped set.
    pub fn pace(&self) -> PlacementPace {
        let (Some(anchor), Some(earliest)) = (self.anchor, self.earliest) else {
            return PlacementPace::default();
        };
        let recent_start = anchor.saturating_sub(self.window_ms());

        let dated = self.dated_items().count() as u64;
        let recent = self
            .dated_items()
            .filter(|i| i.placement_time > recent_start)
            .count() as u64;
        let span_days = whole_days_between(earliest, anchor) + 1;
        let per_day = dated as f64 / span_days as f64;

        PlacementPace {
            dated_placements: dated,
            span_days,
            placements_per_day: per_day,
            placements_per_week: per_day * 7.0,
            recent_window_placements: recent,
        }
    }

    // ── Manager views ─────────────────────────────────────────────────────

    /// Placements per census region, with an explicit `Unknown` bucket.
    pub fn region_totals(&self) -> Vec<RegionTotalRow> {
        let total = self.total_placements();
        let mut by_region: BTreeMap<Region, u64> = BTreeMap::new();
        for (state, bucket) in &self.states {
            *by_region.entry(region_for_state(state)).or_insert(0) += bucket.placements;
        }

        let mut rows: Vec<RegionTotalRow> = by_region
            .into_iter()
            .map(|(region, placements)| RegionTotalRow {
                region,
                placements,
                share: ratio(placements, total),
            })
            .collect();
        rows.sort_by(|a, b| {
            b.placements
                .cmp(&a.placements)
                .then_with(|| a.region.as_str().cmp(b.region.as_str()))
        });
        rows
    }

    /// State totals annotated with their region.
    pub fn state_counts(&self) -> Vec<StateCountRow> {
        let total = self.total_placements();
        self.states_by_volume()
            .into_iter()
            .map(|(state, bucket)| StateCountRow {
                state: state.to_string(),
                region: region_for_state(state),
                placements: bucket.placements,
                share: ratio(bucket.placements, total),
            })
            .collect()
    }

    /// Busiest (city, state) pairs, capped at `hotspot_limit`.
    pub fn city_hotspots(&self) -> Vec<CityHotspotRow> {
        let mut rows = self.city_counts();
        rows.truncate(self.thresholds.hotspot_limit);
        rows
    }

    /// Every (city, state) pair, busiest first, ties by label.
    pub fn city_counts(&self) -> Vec<CityHotspotRow> {
        let total = self.total_placements();
        let mut by_city: HashMap<(&str, &str), u64> = HashMap::new();
        for item in self.items {
            *by_city
                .entry((item.city.as_str(), item.state.as_str()))
                .or_insert(0) += 1;
        }

        let mut rows: Vec<CityHotspotRow> = by_city
            .into_iter()
            .map(|((city, state), placements)| CityHotspotRow {
                city: city.to_string(),
                state: state.to_string(),
                label: city_label(city, state),
                placements,
                share: ratio(placements, total),
            })
            .collect();
        rows.sort_by(|a, b| {
            b.placements
                .cmp(&a.placements)
                .then_with(|| a.label.cmp(&b.label))
        });
        rows
    }

    /// Known states quiet for longer than `stale_state_days`, or never dated.
    pub fn stale_states(&self) -> Vec<StaleStateRow> {
        self.stale_states_from(&self.state_recency())
    }

    /// Same as [`Self::stale_states`] over an already computed recency view.
    pub fn stale_states_from(&self, recency: &[StateRecencyRow]) -> Vec<StaleStateRow> {
        recency
            .iter()
            .filter(|r| r.state != UNKNOWN_STATE)
            .filter(|r| self.thresholds.is_stale(r.days_since_last_placement))
            .map(|r| StaleStateRow {
                state: r.state.clone(),
                region: region_for_state(&r.state),
                days_since_last_placement: r.days_since_last_placement,
                last_placement_label: r.last_placement_label.clone(),
            })
            .collect()
    }

    /// Coverage of the full state table, one row per census region.
    pub fn coverage(&self) -> Vec<CoverageRegionRow> {
        Region::ALL
            .iter()
            .map(|&region| {
                let mut states: Vec<CoverageStateRow> = states_in_region(region)
                    .map(|name| {
                        let placements = self.states.get(name).map_or(0, |b| b.placements);
                        CoverageStateRow {
                            state: name.to_string(),
                            placements,
                            untapped: placements == 0,
                        }
                    })
                    .collect();
                states.sort_by(|a, b| {
                    b.placements
                        .cmp(&a.placements)
                        .then_with(|| a.state.cmp(&b.state))
                });

                let untapped = states.iter().filter(|s| s.untapped).count();
                CoverageRegionRow {
                    region,
                    total_placements: states.iter().map(|s| s.placements).sum(),
                    covered_states: states.len() - untapped,
                    untapped_states: untapped,
                    states,
                }
            })
            .collect()
    }

    /// Table states with no scoped placements, alphabetical.
    pub fn untapped_states(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .coverage()
            .into_iter()
            .flat_map(|row| row.states)
            .filter(|s| s.untapped)
            .map(|s| s.state)
            .collect();
        names.sort();
        names
    }

    /// Contiguous placement trend from the earliest dated placement to the
    /// anchor, zero-filled and capped to the trailing `trend_max_periods`.
    ///
    /// Short spans trend weekly, longer ones monthly.
    pub fn trend(&self) -> (TrendGranularity, Vec<TrendPoint>) {
        let (Some(anchor), Some(earliest)) = (self.anchor, self.earliest) else {
            return (TrendGranularity::Month, Vec::new());
        };
        let (Some(anchor_date), Some(earliest_date)) =
            (date_from_millis(anchor), date_from_millis(earliest))
        else {
            return (TrendGranularity::Month, Vec::new());
        };

        let span_days = whole_days_between(earliest, anchor) + 1;
        let granularity = if span_days <= self.thresholds.trend_weekly_max_span_days {
            TrendGranularity::Week
        } else {
            TrendGranularity::Month
        };
        let max_periods = i64::try_from(self.thresholds.trend_max_periods).unwrap_or(i64::MAX);
        if max_periods == 0 {
            return (granularity, Vec::new());
        }

        let periods: Vec<NaiveDate> = match granularity {
            TrendGranularity::Week => {
                let last = week_start(anchor_date);
                let first = week_start(earliest_date);
                let count = ((last - first).num_days() / 7 + 1).min(max_periods);
                let first = last - Duration::weeks(count - 1);
                (0..count).map(|i| first + Duration::weeks(i)).collect()
            }
            TrendGranularity::Month => {
                let last = month_start(anchor_date);
                let first = month_start(earliest_date);
                let count = (month_ordinal(last) - month_ordinal(first) + 1).min(max_periods);
                let first = shift_months(last, -(count as i32 - 1));
                (0..count).map(|i| shift_months(first, i as i32)).collect()
            }
        };

        let mut counts: BTreeMap<NaiveDate, u64> = BTreeMap::new();
        for item in self.dated_items() {
            let Some(date) = item.placement_date else {
                continue;
            };
            let bucket = match granularity {
                TrendGranularity::Week => week_start(date),
                TrendGranularity::Month => month_start(date),
            };
            *counts.entry(bucket).or_insert(0) += 1;
        }

        let points = periods
            .into_iter()
            .map(|start| {
                let (period_key, period_label) = match granularity {
                    TrendGranularity::Week => (iso_week_key(start), week_label(start)),
                    TrendGranularity::Month => (month_key(start), month_label(start)),
                };
                TrendPoint {
                    period_key,
                    period_label,
                    placements: counts.get(&start).copied().unwrap_or(0),
                }
            })
            .collect();

        (granularity, points)
    }

    // ── Private helpers ───────────────────────────────────────────────────

    fn dated_items(&self) -> impl Iterator<Item = &'a PlacementMetricItem> + '_ {
        self.items.iter().filter(|i| i.has_valid_date())
    }

    /// States ordered by placements descending, then name ascending.
    fn states_by_volume(&self) -> Vec<(&'a str, StateBucket)> {
        let mut ordered: Vec<(&'a str, StateBucket)> =
            self.states.iter().map(|(s, b)| (*s, *b)).collect();
        // BTreeMap order is alphabetical, and the sort is stable.
        ordered.sort_by(|a, b| b.1.placements.cmp(&a.1.placements));
        ordered
    }

    /// Growth window length, saturating for windows wider than the calendar.
    fn window_ms(&self) -> i64 {
        self.thresholds.growth_window_days.saturating_mul(DAY_MS)
    }

    fn days_since(&self, bucket: &StateBucket) -> Option<i64> {
        match (self.anchor, bucket.latest_time) {
            (Some(anchor), Some(latest)) => Some(whole_days_between(latest, anchor)),
            _ => None,
        }
    }
}

/// Percent change from `prior` to `recent`, saturating when `prior` is 0.
pub fn growth_pct(recent: u64, prior: u64) -> f64 {
    if prior == 0 {
        if recent > 0 {
            100.0
        } else {
            0.0
        }
    } else {
        (recent as f64 - prior as f64) / prior as f64 * 100.0
    }
}

/// Sort key where "never placed" ranks as the stalest.
fn staleness(days: Option<i64>) -> i64 {
    days.unwrap_or(i64::MAX)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
