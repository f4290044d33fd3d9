use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::models::forecast::{ForecastSnapshot, WeatherSample};
use crate::models::site::{Location, SiteModel};
use crate::services::forecast_builder::{ForecastError, ForecastSeriesBuilder};
use crate::services::weather_service::WeatherSource;
use crate::shared_state::ForecastStore;

/// Everything the refresh loop needs; built once from the configuration.
#[derive(Debug, Clone)]
pub struct RefreshPlan {
    pub sites: Arc<Vec<SiteModel>>,
    pub location: Location,
    pub inverter_power_kw: Option<f64>,
    pub source: WeatherSource,
    pub interval: Duration,
}

/// Builds a forecast from one weather snapshot and publishes it.
///
/// A failed build publishes nothing; readers keep the previous snapshot.
pub fn refresh_once(
    store: &ForecastStore,
    sites: &[SiteModel],
    inverter_power_kw: Option<f64>,
    samples: &[WeatherSample],
) -> Result<Arc<ForecastSnapshot>, ForecastError> {
    let forecast = ForecastSeriesBuilder::new(sites)
        .with_inverter_limit_kw(inverter_power_kw)
        .build(samples)?;
    let snapshot = store.publish(forecast);
    info!(
        version = snapshot.version,
        n_points = snapshot.forecast.series.points.len(),
        "Forecast published"
    );
    Ok(snapshot)
}

/// Fetches and rebuilds on a fixed interval. At most one refresh runs at a
/// time; a slow one delays the next tick instead of overlapping it.
pub async fn run(store: ForecastStore, plan: RefreshPlan) {
    let mut ticker = tokio::time::interval(plan.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(
        interval_s = plan.interval.as_secs(),
        offline = plan.source.is_offline(),
        n_arrays = plan.sites.len(),
        "Forecast refresh loop started"
    );

    loop {
        ticker.tick().await;
        let now = Local::now().fixed_offset();
        let samples = match plan.source.fetch(plan.location, now).await {
            Ok(samples) => samples,
            Err(e) => {
                error!(error = %e, "Weather fetch failed, keeping the current forecast");
                continue;
            }
        };
        if let Err(e) = refresh_once(&store, &plan.sites, plan.inverter_power_kw, &samples) {
            warn!(error = %e, "Forecast build failed, keeping the current forecast");
        }
    }
}
