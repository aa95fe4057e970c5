use chrono::{DateTime, NaiveDate, Utc};
use clap::Parser;
use std::path::PathBuf;

use crate::error::{PlacementError, Result};
use crate::thresholds::AnalyticsThresholds;

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Placement analytics for the organization and regional manager dashboards
#[derive(Parser, Debug, Clone)]
#[command(
    name = "placement-report",
    about = "Placement analytics for the organization and regional manager dashboards",
    version
)]
pub struct Settings {
    /// Placement payload: a JSON file or a directory of JSON files
    #[arg(long, env = "PLACEMENT_INPUT")]
    pub input: Option<PathBuf>,

    /// Dashboard to compute
    #[arg(long, default_value = "dashboard", value_parser = ["dashboard", "manager"])]
    pub view: String,

    /// First placement date to include (YYYY-MM-DD)
    #[arg(long)]
    pub from: Option<NaiveDate>,

    /// Last placement date to include (YYYY-MM-DD)
    #[arg(long)]
    pub to: Option<NaiveDate>,

    /// Restrict to the trailing N days ending today (overrides --from/--to)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=3660))]
    pub last_days: Option<u32>,

    /// Case-insensitive search over city, state, region and app id
    #[arg(long)]
    pub search: Option<String>,

    /// Timezone used to resolve "today" (auto-detected if not specified)
    #[arg(long, default_value = "auto")]
    pub timezone: String,

    /// Thresholds config file (defaults to ~/.placement-analytics/config.json)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"])]
    pub log_level: String,

    /// Log file path
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Pretty-print the JSON result
    #[arg(long)]
    pub pretty: bool,
}

impl Settings {
    /// Parse process arguments and resolve `"auto"` values.
    pub fn load() -> Self {
        Self::resolve_auto_values(Settings::parse())
    }

    /// Same as [`Settings::load`] but over an explicit argument list.
    pub fn load_from_args(args: Vec<std::ffi::OsString>) -> Result<Self> {
        let settings =
            Settings::try_parse_from(args).map_err(|e| PlacementError::Config(e.to_string()))?;
        Ok(Self::resolve_auto_values(settings))
    }

    /// Resolve the `"auto"` timezone and apply the `--debug` flag.
    fn resolve_auto_values(mut settings: Settings) -> Settings {
        if settings.timezone == "auto" {
            settings.timezone = crate::time_utils::get_system_timezone();
        }
        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }
        settings
    }

    /// Payload location: `--input`, else `~/.placement-analytics/placements.json`.
    pub fn input_path(&self) -> PathBuf {
        self.input.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".placement-analytics")
                .join("placements.json")
        })
    }

    /// Load thresholds from `--config` or the default location.
    pub fn thresholds(&self) -> Result<AnalyticsThresholds> {
        let path = self
            .config
            .clone()
            .unwrap_or_else(AnalyticsThresholds::config_path);
        AnalyticsThresholds::load_from(&path)
    }

    /// Today's date in the configured timezone, the end of a `--last-days`
    /// window.
    pub fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        crate::time_utils::date_in_timezone(now, &self.timezone)
    }

    /// Explicit `--from`/`--to` bounds, rejected when inverted.
    pub fn date_bounds(&self) -> Result<(Option<NaiveDate>, Option<NaiveDate>)> {
        if let (Some(from), Some(to)) = (self.from, self.to) {
            if from > to {
                return Err(PlacementError::Config(format!(
                    "--from ({from}) is after --to ({to})"
                )));
            }
        }
        Ok((self.from, self.to))
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
