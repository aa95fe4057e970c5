use crate::error::{PlacementError, Result};
use crate::models::RiskBand;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ── Shared constants ──────────────────────────────────────────────────────────

/// Length of the "recent" and "prior" growth windows.
pub const GROWTH_WINDOW_DAYS: i64 = 30;

/// Number of contiguous ISO weeks in the weekly pivot.
pub const WEEKLY_HORIZON_WEEKS: usize = 16;

/// Number of trailing calendar months in the seasonality grid.
pub const SEASONALITY_MONTHS: usize = 12;

/// A state is `Healthy` while its last placement is fewer days old than this.
pub const HEALTHY_MAX_DAYS: i64 = 30;

/// A state is `Watch` up to and including this many days; `At Risk` beyond.
pub const WATCH_MAX_DAYS: i64 = 90;

/// States quieter than this many days count as stale in the KPIs.
pub const STALE_STATE_DAYS: i64 = 60;

/// `dataHealth` flips to `Issue` when the flawed-record share exceeds this.
pub const DATA_HEALTH_ISSUE_RATIO: f64 = 0.10;

/// Maximum number of city hotspot rows.
pub const HOTSPOT_LIMIT: usize = 10;

/// Maximum number of trend periods returned.
pub const TREND_MAX_PERIODS: usize = 36;

/// Spans up to this many days trend weekly; longer spans trend monthly.
pub const TREND_WEEKLY_MAX_SPAN_DAYS: i64 = 180;

/// Largest accepted day-valued window (about a century).
pub const MAX_WINDOW_DAYS: i64 = 36_500;

/// Largest accepted weekly horizon, ten years of weeks.
pub const MAX_HORIZON_WEEKS: usize = 520;

/// Largest accepted seasonality grid, ten years of months.
pub const MAX_SEASONALITY_MONTHS: usize = 120;

/// Largest accepted number of trend periods.
pub const MAX_TREND_PERIODS: usize = 520;

// ── AnalyticsThresholds ───────────────────────────────────────────────────────

/// Tunable windows and cut-offs for the aggregator and KPI synthesizer.
///
/// Every field defaults to the constant of the same name, so a config file
/// only needs the values it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsThresholds {
    pub growth_window_days: i64,
    pub weekly_horizon_weeks: usize,
    pub seasonality_months: usize,
    pub healthy_max_days: i64,
    pub watch_max_days: i64,
    pub stale_state_days: i64,
    pub data_health_issue_ratio: f64,
    pub hotspot_limit: usize,
    pub trend_max_periods: usize,
    pub trend_weekly_max_span_days: i64,
}

impl Default for AnalyticsThresholds {
    fn default() -> Self {
        Self {
            growth_window_days: GROWTH_WINDOW_DAYS,
            weekly_horizon_weeks: WEEKLY_HORIZON_WEEKS,
            seasonality_months: SEASONALITY_MONTHS,
            healthy_max_days: HEALTHY_MAX_DAYS,
            watch_max_days: WATCH_MAX_DAYS,
            stale_state_days: STALE_STATE_DAYS,
            data_health_issue_ratio: DATA_HEALTH_ISSUE_RATIO,
            hotspot_limit: HOTSPOT_LIMIT,
            trend_max_periods: TREND_MAX_PERIODS,
            trend_weekly_max_span_days: TREND_WEEKLY_MAX_SPAN_DAYS,
        }
    }
}

impl AnalyticsThresholds {
    /// Classify a state's staleness into exactly one risk band.
    ///
    /// `None` (no dated placement at all) is always `At Risk`.
    pub fn risk_band(&self, days_since_last: Option<i64>) -> RiskBand {
        match days_since_last {
            Some(days) if days < self.healthy_max_days => RiskBand::Healthy,
            Some(days) if days <= self.watch_max_days => RiskBand::Watch,
            _ => RiskBand::AtRisk,
        }
    }

    /// `true` when a state counts as stale for KPI purposes.
    pub fn is_stale(&self, days_since_last: Option<i64>) -> bool {
        days_since_last.map_or(true, |days| days > self.stale_state_days)
    }

    /// Reject combinations that would break band partitioning or windowing.
    pub fn validate(&self) -> Result<()> {
        if self.growth_window_days <= 0 {
            return Err(PlacementError::Config(
                "growth_window_days must be positive".to_string(),
            ));
        }
        if self.weekly_horizon_weeks == 0
            || self.seasonality_months == 0
            || self.trend_max_periods == 0
        {
            return Err(PlacementError::Config(
                "weekly_horizon_weeks, seasonality_months and trend_max_periods must be positive"
                    .to_string(),
            ));
        }
        at_most("growth_window_days", self.growth_window_days, MAX_WINDOW_DAYS)?;
        at_most("weekly_horizon_weeks", self.weekly_horizon_weeks, MAX_HORIZON_WEEKS)?;
        at_most("seasonality_months", self.seasonality_months, MAX_SEASONALITY_MONTHS)?;
        at_most("trend_max_periods", self.trend_max_periods, MAX_TREND_PERIODS)?;
        at_most(
            "trend_weekly_max_span_days",
            self.trend_weekly_max_span_days,
            MAX_WINDOW_DAYS,
        )?;
        if self.healthy_max_days <= 0 || self.healthy_max_days > self.watch_max_days {
            return Err(PlacementError::Config(format!(
                "risk bands require 0 < healthy_max_days ({}) <= watch_max_days ({})",
                self.healthy_max_days, self.watch_max_days
            )));
        }
        if !(0.0..=1.0).contains(&self.data_health_issue_ratio) {
            return Err(PlacementError::Config(format!(
                "data_health_issue_ratio must be within [0, 1], got {}",
                self.data_health_issue_ratio
            )));
        }
        Ok(())
    }

    /// Default config location: `~/.placement-analytics/config.json`.
    pub fn config_path() -> PathBuf {
        Self::config_path_in(&dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
    }

    /// Config path rooted at `base_dir` (used for testing).
    pub fn config_path_in(base_dir: &Path) -> PathBuf {
        base_dir.join(".placement-analytics").join("config.json")
    }

    /// Load and validate thresholds from `path`.
    ///
    /// A missing file yields the defaults; a malformed or invalid one is an
    /// error.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("no thresholds file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content =
            std::fs::read_to_string(path).map_err(|source| PlacementError::FileRead {
                path: path.to_path_buf(),
                source,
            })?;
        let thresholds: Self = serde_json::from_str(&content)?;
        thresholds.validate()?;
        Ok(thresholds)
    }
}

fn at_most<T: PartialOrd + std::fmt::Display>(field: &str, value: T, max: T) -> Result<()> {
    if value > max {
        return Err(PlacementError::Config(format!(
            "{field} must be at most {max}, got {value}"
        )));
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_risk_band_boundaries() {
        let t = AnalyticsThresholds::default();
        assert_eq!(t.risk_band(Some(0)), RiskBand::Healthy);
        assert_eq!(t.risk_band(Some(29)), RiskBand::Healthy);
        assert_eq!(t.risk_band(Some(30)), RiskBand::Watch);
        assert_eq!(t.risk_band(Some(90)), RiskBand::Watch);
        assert_eq!(t.risk_band(Some(91)), RiskBand::AtRisk);
        assert_eq!(t.risk_band(None), RiskBand::AtRisk);
    }

    #[test]
    fn test_is_stale() {
        let t = AnalyticsThresholds::default();
        assert!(!t.is_stale(Some(60)));
        assert!(t.is_stale(Some(61)));
        assert!(t.is_stale(None));
    }

    #[test]
    fn test_validate_rejects_inverted_bands() {
        let t = AnalyticsThresholds {
            healthy_max_days: 120,
            ..AnalyticsThresholds::default()
        };
        assert!(matches!(t.validate(), Err(PlacementError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_bad_ratio() {
        let t = AnalyticsThresholds {
            data_health_issue_ratio: 1.5,
            ..AnalyticsThresholds::default()
        };
        assert!(t.validate().is_err());
        assert!(AnalyticsThresholds::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_oversized_windows() {
        let oversized = [
            AnalyticsThresholds {
                growth_window_days: MAX_WINDOW_DAYS + 1,
                ..AnalyticsThresholds::default()
            },
            AnalyticsThresholds {
                weekly_horizon_weeks: MAX_HORIZON_WEEKS + 1,
                ..AnalyticsThresholds::default()
            },
            AnalyticsThresholds {
                seasonality_months: MAX_SEASONALITY_MONTHS + 1,
                ..AnalyticsThresholds::default()
            },
            AnalyticsThresholds {
                trend_max_periods: MAX_TREND_PERIODS + 1,
                ..AnalyticsThresholds::default()
            },
            AnalyticsThresholds {
                trend_weekly_max_span_days: MAX_WINDOW_DAYS + 1,
                ..AnalyticsThresholds::default()
            },
        ];
        for t in oversized {
            assert!(
                matches!(t.validate(), Err(PlacementError::Config(_))),
                "accepted {t:?}"
            );
        }
    }

    #[test]
    fn test_validate_accepts_upper_bounds() {
        let t = AnalyticsThresholds {
            growth_window_days: MAX_WINDOW_DAYS,
            weekly_horizon_weeks: MAX_HORIZON_WEEKS,
            seasonality_months: MAX_SEASONALITY_MONTHS,
            trend_max_periods: MAX_TREND_PERIODS,
            trend_weekly_max_span_days: MAX_WINDOW_DAYS,
            ..AnalyticsThresholds::default()
        };
        assert!(t.validate().is_ok());
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let tmp = TempDir::new().expect("tempdir");
        let path = AnalyticsThresholds::config_path_in(tmp.path());
        let loaded = AnalyticsThresholds::load_from(&path).expect("defaults");
        assert_eq!(loaded, AnalyticsThresholds::default());
    }

    #[test]
    fn test_load_partial_file_keeps_other_defaults() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("config.json");
        std::fs::write(&path, r#"{"stale_state_days": 45, "hotspot_limit": 5}"#).unwrap();

        let loaded = AnalyticsThresholds::load_from(&path).expect("load");
        assert_eq!(loaded.stale_state_days, 45);
        assert_eq!(loaded.hotspot_limit, 5);
        assert_eq!(loaded.growth_window_days, GROWTH_WINDOW_DAYS);
    }

    #[test]
    fn test_load_malformed_file_is_error() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            AnalyticsThresholds::load_from(&path),
            Err(PlacementError::JsonParse(_))
        ));
    }

    #[test]
    fn test_load_invalid_values_is_config_error() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("config.json");
        std::fs::write(&path, r#"{"growth_window_days": 0}"#).unwrap();
        assert!(matches!(
            AnalyticsThresholds::load_from(&path),
            Err(PlacementError::Config(_))
        ));
    }

    #[test]
    fn test_load_huge_windows_is_config_error() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("config.json");
        for body in [
            r#"{"growth_window_days": 200000000000}"#,
            r#"{"weekly_horizon_weeks": 20000000}"#,
        ] {
            std::fs::write(&path, body).unwrap();
            let err = AnalyticsThresholds::load_from(&path).unwrap_err();
            assert!(err.to_string().contains("must be at most"), "{body}: {err}");
        }
    }
}
