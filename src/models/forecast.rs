use chrono::{DateTime, FixedOffset, NaiveDate, TimeDelta, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// ─── Weather input ───────────────────────────────────────────────────────────

/// One forecast timestep as delivered by the weather provider.
///
/// Values the provider left out are `NaN`; the sample still occupies its slot
/// in the sequence and yields zero power.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct WeatherSample {
    pub timestamp: DateTime<FixedOffset>,
    /// Global horizontal irradiance (W/m²)
    pub irradiance_w_m2: f64,
    /// Ambient 2 m temperature (°C)
    pub temperature_c: f64,
    /// Total cloud cover (%)
    pub cloud_cover_total: f64,
}

// ─── Derived series ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct PowerPoint {
    pub timestamp: DateTime<FixedOffset>,
    /// Estimated power summed over all sub-arrays (W), never negative
    pub power_w: f64,
}

/// Strictly increasing sequence of [`PowerPoint`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct ForecastSeries {
    pub points: Vec<PowerPoint>,
}

impl ForecastSeries {
    /// Cadence of the series: the most common positive spacing between
    /// neighbouring points, the shorter one on a tie.
    pub fn step(&self) -> Option<TimeDelta> {
        self.points
            .iter()
            .tuple_windows()
            .map(|(a, b)| b.timestamp - a.timestamp)
            .filter(|delta| *delta > TimeDelta::zero())
            .counts()
            .into_iter()
            .max_by(|(a, a_count), (b, b_count)| a_count.cmp(b_count).then(b.cmp(a)))
            .map(|(delta, _)| delta)
    }

    /// UTC offset the provider reported the series in.
    pub fn offset(&self) -> Option<FixedOffset> {
        self.points.first().map(|point| *point.timestamp.offset())
    }
}

/// Average power over one fully covered clock hour.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct EnergyBucket {
    pub hour_start: DateTime<FixedOffset>,
    pub average_power_w: f64,
    pub energy_wh: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct DayTotal {
    pub date: NaiveDate,
    pub energy_wh: f64,
    /// Same day before the cloud-cover correction
    pub uncorrected_energy_wh: f64,
    pub average_cloud_cover: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, ToSchema)]
pub struct AdjustmentStats {
    /// Mean cloud cover over the first 24 hours of the horizon (%)
    pub average_cloud_cover: f64,
    pub total_energy_before_wh: f64,
    pub total_energy_after_wh: f64,
    /// Relative change caused by the correction (%), negative for a reduction
    pub adjustment_percent: f64,
}

/// Everything one refresh derives from one weather snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct Forecast {
    pub series: ForecastSeries,
    pub buckets: Vec<EnergyBucket>,
    pub days: Vec<DayTotal>,
    pub stats: AdjustmentStats,
}

/// Immutable, versioned unit that readers observe.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ForecastSnapshot {
    pub version: u64,
    pub built_at: DateTime<Utc>,
    pub forecast: Forecast,
}

// ─── Reporting views ─────────────────────────────────────────────────────────

/// Sensor-style view resolved against a snapshot at one instant.
/// `None` always means "no data", never zero production.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ForecastSummary {
    pub at: DateTime<FixedOffset>,
    pub version: u64,
    pub power_now_w: Option<f64>,
    pub power_next_15min_w: Option<f64>,
    pub power_next_30min_w: Option<f64>,
    pub power_next_hour_w: Option<f64>,
    pub power_next_12hours_w: Option<f64>,
    pub power_next_24hours_w: Option<f64>,
    pub energy_current_hour_wh: Option<f64>,
    pub energy_next_hour_wh: Option<f64>,
    pub energy_today_wh: Option<f64>,
    pub energy_today_remaining_wh: Option<f64>,
    pub energy_tomorrow_wh: Option<f64>,
    /// Day totals for today + 2 … today + 7
    pub energy_upcoming_days_wh: Vec<Option<f64>>,
    pub peak_time_today: Option<DateTime<FixedOffset>>,
    pub peak_time_tomorrow: Option<DateTime<FixedOffset>>,
    pub stats: AdjustmentStats,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct PowerResponse {
    pub at: DateTime<FixedOffset>,
    /// `null` before the first forecast point
    pub power_w: Option<f64>,
    pub version: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub offline: bool,
    /// `null` until the first refresh succeeds
    pub snapshot_version: Option<u64>,
    pub snapshot_built_at: Option<DateTime<Utc>>,
}
