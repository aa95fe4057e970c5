//! TTL-cached data manager over one placement source.
//!
//! Normalized items and both dashboards' analytics are cached per source
//! and scope through [`PlacementCache`]. Loading from disk runs on the
//! blocking pool and is retried with back-off (0 ms, 100 ms, 200 ms).

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration;
use placement_core::error::{PlacementError, Result};
use placement_core::models::PlacementMetricItem;
use placement_core::thresholds::AnalyticsThresholds;
use placement_data::analysis::{analyze_dashboard, analyze_manager, DashboardAnalytics, ManagerAnalytics};
use placement_data::reader::load_placements;
use placement_data::scope::ReportScope;
use tokio::task::JoinError;
use tracing::{debug, warn};

use crate::cache::{Clock, PlacementCache, SystemClock};

// ── Defaults ──────────────────────────────────────────────────────────────────

/// Default cache TTL in seconds.
pub const DEFAULT_CACHE_TTL_SECS: i64 = 300;

/// Maximum number of load attempts per cache miss.
const MAX_RETRY_ATTEMPTS: u32 = 3;

// ── DataManager ───────────────────────────────────────────────────────────────

/// Cached access to the analytics of one placement source.
///
/// # Example
/// ```no_run
/// use placement_core::thresholds::AnalyticsThresholds;
/// use placement_data::scope::ReportScope;
/// use placement_runtime::data_manager::DataManager;
///
/// # async fn run() -> placement_core::Result<()> {
/// let mgr = DataManager::new("placements.json", AnalyticsThresholds::default());
/// let dashboard = mgr.dashboard(&ReportScope::all()).await?;
/// println!("states: {}", dashboard.state_totals.len());
/// # Ok(())
/// # }
/// ```
pub struct DataManager {
    source: PathBuf,
    thresholds: AnalyticsThresholds,
    items: PlacementCache<Arc<Vec<PlacementMetricItem>>>,
    dashboards: PlacementCache<Arc<DashboardAnalytics>>,
    managers: PlacementCache<Arc<ManagerAnalytics>>,
}

impl DataManager {
    pub fn new(source: impl Into<PathBuf>, thresholds: AnalyticsThresholds) -> Self {
        Self::with_clock(
            source,
            thresholds,
            Duration::seconds(DEFAULT_CACHE_TTL_SECS),
            Arc::new(SystemClock),
        )
    }

    /// Create a manager with an explicit TTL and clock.
    pub fn with_clock(
        source: impl Into<PathBuf>,
        thresholds: AnalyticsThresholds,
        ttl: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            source: source.into(),
            thresholds,
            items: PlacementCache::with_clock(ttl, clock.clone()),
            dashboards: PlacementCache::with_clock(ttl, clock.clone()),
            managers: PlacementCache::with_clock(ttl, clock),
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn thresholds(&self) -> &AnalyticsThresholds {
        &self.thresholds
    }

    // ── Public API ────────────────────────────────────────────────────────

    /// Normalized items of the source, loaded on a cache miss.
    pub async fn items(&self) -> Result<Arc<Vec<PlacementMetricItem>>> {
        let source = self.source.clone();
        self.items
            .get_or_load(&self.key("items"), move || load_with_retry(source))
            .await
    }

    /// Organization dashboard for `scope`.
    pub async fn dashboard(&self, scope: &ReportScope) -> Result<Arc<DashboardAnalytics>> {
        let items = self.items().await?;
        let key = self.key(&format!("dashboard::{}", scope.cache_key()));
        let (items, thresholds) = (items.as_slice(), &self.thresholds);
        self.dashboards
            .get_or_load(&key, move || async move {
                Ok::<_, PlacementError>(Arc::new(analyze_dashboard(items, scope, thresholds)))
            })
            .await
    }

    /// Regional manager dashboard for `scope`.
    pub async fn manager(&self, scope: &ReportScope) -> Result<Arc<ManagerAnalytics>> {
        let items = self.items().await?;
        let key = self.key(&format!("manager::{}", scope.cache_key()));
        let (items, thresholds) = (items.as_slice(), &self.thresholds);
        self.managers
            .get_or_load(&key, move || async move {
                Ok::<_, PlacementError>(Arc::new(analyze_manager(items, scope, thresholds)))
            })
            .await
    }

    /// Drop everything cached for this source. Returns the number of entries
    /// removed.
    pub fn refresh(&self) -> usize {
        let prefix = self.key("");
        let removed = self.items.invalidate_prefix(&prefix)
            + self.dashboards.invalidate_prefix(&prefix)
            + self.managers.invalidate_prefix(&prefix);
        debug!(source = %self.source.display(), removed, "placement cache refreshed");
        removed
    }

    /// Drop expired entries from every cache.
    pub fn purge_expired(&self) -> usize {
        self.items.purge_expired() + self.dashboards.purge_expired() + self.managers.purge_expired()
    }

    // ── Private helpers ───────────────────────────────────────────────────

    fn key(&self, suffix: &str) -> String {
        format!("{}::{}", self.source.display(), suffix)
    }
}

/// Load the source on the blocking pool, retrying failed attempts.
async fn load_with_retry(source: PathBuf) -> Result<Arc<Vec<PlacementMetricItem>>> {
    let mut last_err = None;

    for attempt in 0..MAX_RETRY_ATTEMPTS {
        if attempt > 0 {
            let sleep_ms = u64::from(attempt) * 100;
            debug!(attempt, sleep_ms, "retrying placement load after back-off");
            tokio::time::sleep(StdDuration::from_millis(sleep_ms)).await;
        }

        let path = source.clone();
        match tokio::task::spawn_blocking(move || load_placements(&path)).await {
            Ok(Ok(items)) => {
                debug!(records = items.len(), source = %source.display(), "placements loaded");
                return Ok(Arc::new(items));
            }
            Ok(Err(e)) => {
                warn!(attempt, error = %e, "placement load attempt failed");
                last_err = Some(e);
            }
            Err(e) => {
                warn!(attempt, error = %e, "placement load task failed");
                last_err = Some(load_task_failure(e));
            }
        }
    }

    Err(last_err.unwrap_or_else(|| PlacementError::PayloadPathNotFound(source)))
}

/// A panicked or cancelled blocking load.
fn load_task_failure(err: JoinError) -> PlacementError {
    PlacementError::Other(anyhow::Error::new(err).context("placement load task failed"))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
