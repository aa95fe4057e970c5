mod bootstrap;

use anyhow::{Context, Result};
use chrono::Utc;
use placement_core::formatting::format_share;
use placement_core::models::DashboardKpis;
use placement_core::settings::Settings;
use placement_data::scope::ReportScope;
use placement_runtime::data_manager::DataManager;
use serde::Serialize;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load();

    bootstrap::ensure_directories()?;
    bootstrap::setup_logging(&settings.log_level, settings.log_file.as_ref())?;

    tracing::info!("Placement report v{} starting", env!("CARGO_PKG_VERSION"));

    let thresholds = settings
        .thresholds()
        .context("failed to load analytics thresholds")?;
    let scope = match settings.last_days {
        Some(days) => ReportScope::last_days(settings.today(Utc::now()), days),
        None => {
            let (from, to) = settings.date_bounds()?;
            ReportScope::new(from, to, None)
        }
    }
    .with_search(settings.search.clone());
    let input = settings.input_path();

    tracing::info!(
        "View: {}, input: {}, timezone: {}, scope: {}",
        settings.view,
        input.display(),
        settings.timezone,
        scope.cache_key()
    );

    let manager = DataManager::new(input, thresholds);
    let output = match settings.view.as_str() {
        "manager" => {
            let analytics = manager.manager(&scope).await?;
            log_summary(&analytics.kpis.summary);
            render(analytics.as_ref(), settings.pretty)?
        }
        _ => {
            let analytics = manager.dashboard(&scope).await?;
            log_summary(&analytics.kpis);
            render(analytics.as_ref(), settings.pretty)?
        }
    };

    println!("{output}");
    Ok(())
}

fn log_summary(kpis: &DashboardKpis) {
    tracing::info!(
        "{} placements across {} states; top state: {} ({}); data health: {:?}",
        kpis.total_placements,
        kpis.active_states,
        kpis.top_state.as_deref().unwrap_or("none"),
        format_share(kpis.top_state_share),
        kpis.data_health
    );
}

fn render<T: Serialize>(value: &T, pretty: bool) -> serde_json::Result<String> {
    if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
}
