/// ============================================================
///  Forecast series builder
///
///  One pass over the weather horizon:
///   1. validate ordering of the samples
///   2. per timestep, per sub-array: estimate → correct, then sum
///   3. clamp to the inverter limit
///   4. hourly energy buckets over fully covered hours
///   5. day totals + correction statistics (diagnostics)
/// ============================================================

use chrono::{DateTime, FixedOffset, NaiveDate, TimeDelta, Timelike};
use itertools::Itertools;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::models::forecast::{
    AdjustmentStats, DayTotal, EnergyBucket, Forecast, ForecastSeries, PowerPoint, WeatherSample,
};
use crate::models::site::SiteModel;
use crate::services::cloud_correction::CloudCorrectionAdjuster;
use crate::services::power_estimator::{PowerEstimator, non_negative};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ForecastError {
    #[error("no weather samples to build a forecast from")]
    EmptyWeather,

    #[error("no arrays to build a forecast for")]
    NoArrays,

    #[error("weather timestamps are not strictly increasing at #{index}: {previous} → {current}")]
    NotIncreasing {
        index: usize,
        previous: DateTime<FixedOffset>,
        current: DateTime<FixedOffset>,
    },
}

pub struct ForecastSeriesBuilder<'a> {
    sites: &'a [SiteModel],
    inverter_limit_w: Option<f64>,
}

impl<'a> ForecastSeriesBuilder<'a> {
    pub fn new(sites: &'a [SiteModel]) -> Self {
        Self { sites, inverter_limit_w: None }
    }

    /// AC limit of the shared inverter; the summed power never exceeds it.
    pub fn with_inverter_limit_kw(mut self, limit_kw: Option<f64>) -> Self {
        self.inverter_limit_w = limit_kw.map(|kw| kw * 1000.0);
        self
    }

    /// Builds the forecast for one weather snapshot.
    ///
    /// On error nothing is built; callers keep whatever forecast they already
    /// serve (or [`Forecast::default`], which is empty).
    pub fn build(&self, samples: &[WeatherSample]) -> Result<Forecast, ForecastError> {
        if self.sites.is_empty() {
            return Err(ForecastError::NoArrays);
        }
        if samples.is_empty() {
            return Err(ForecastError::EmptyWeather);
        }
        if let Some((index, (previous, current))) = samples
            .iter()
            .tuple_windows()
            .enumerate()
            .find(|(_, (previous, current))| current.timestamp <= previous.timestamp)
        {
            return Err(ForecastError::NotIncreasing {
                index: index + 1,
                previous: previous.timestamp,
                current: current.timestamp,
            });
        }

        let pairs = self.sites.iter().map(|site| (site, site.adjuster())).collect_vec();
        let (corrected, uncorrected): (Vec<_>, Vec<_>) = samples
            .iter()
            .map(|sample| {
                let (raw_w, corrected_w) = sum_corrected(&pairs, sample);
                debug!(
                    timestamp = %sample.timestamp,
                    cloud_cover = sample.cloud_cover_total,
                    raw_w,
                    corrected_w,
                    "Timestep estimated"
                );
                (
                    PowerPoint { timestamp: sample.timestamp, power_w: self.limit(corrected_w) },
                    PowerPoint { timestamp: sample.timestamp, power_w: self.limit(raw_w) },
                )
            })
            .unzip();

        let series = ForecastSeries { points: corrected };
        let step = series.step().unwrap_or(TimeDelta::hours(1));
        for (previous, current) in series.points.iter().tuple_windows() {
            if current.timestamp - previous.timestamp != step {
                warn!(after = %previous.timestamp, before = %current.timestamp, "Gap in weather samples");
            }
        }

        let buckets = energy_buckets(&series.points, step);
        let uncorrected_buckets = energy_buckets(&uncorrected, step);
        let days = day_totals(&buckets, &uncorrected_buckets, samples);
        let stats = adjustment_stats(&days, samples);

        for day in &days {
            info!(
                date = %day.date,
                avg_cloud_cover = day.average_cloud_cover,
                original_wh = day.uncorrected_energy_wh,
                adjusted_wh = day.energy_wh,
                "Day adjustment - {}: avg cloud cover: {:.1}%, original: {:.1}, adjusted: {:.1}",
                day.date,
                day.average_cloud_cover,
                day.uncorrected_energy_wh,
                day.energy_wh,
            );
        }
        info!(
            before_kwh = stats.total_energy_before_wh / 1000.0,
            after_kwh = stats.total_energy_after_wh / 1000.0,
            adjustment_percent = stats.adjustment_percent,
            n_points = series.points.len(),
            n_buckets = buckets.len(),
            "Cloud correction applied"
        );

        Ok(Forecast { series, buckets, days, stats })
    }

    fn limit(&self, power_w: f64) -> f64 {
        let power_w = non_negative(power_w);
        self.inverter_limit_w.map_or(power_w, |limit| power_w.min(limit))
    }
}

/// Sums raw and corrected power over every sub-array for one sample.
pub fn sum_corrected<E: PowerEstimator>(
    pairs: &[(E, CloudCorrectionAdjuster)],
    sample: &WeatherSample,
) -> (f64, f64) {
    pairs.iter().fold((0.0, 0.0), |(raw_total, corrected_total), (estimator, adjuster)| {
        let raw = estimator.estimate(sample);
        (raw_total + raw, corrected_total + adjuster.correct(raw, sample.cloud_cover_total))
    })
}

/// Start of the clock hour containing `timestamp`, in its own offset.
pub fn hour_start(timestamp: DateTime<FixedOffset>) -> Option<DateTime<FixedOffset>> {
    timestamp.with_minute(0)?.with_second(0)?.with_nanosecond(0)
}

/// One bucket per clock hour that the points cover completely: the first
/// point sits on the hour, the points inside are one `step` apart, and the
/// last one reaches the end of the hour.
pub fn energy_buckets(points: &[PowerPoint], step: TimeDelta) -> Vec<EnergyBucket> {
    let hour = TimeDelta::hours(1);
    let chunks = points.iter().chunk_by(|point| hour_start(point.timestamp));
    let mut buckets = Vec::new();
    for (start, chunk) in &chunks {
        let Some(start) = start else { continue };
        let chunk = chunk.collect_vec();
        let (Some(first), Some(last)) = (chunk.first(), chunk.last()) else { continue };
        let complete = first.timestamp == start
            && last.timestamp + step >= start + hour
            && chunk.iter().tuple_windows().all(|(a, b)| b.timestamp - a.timestamp == step);
        if !complete {
            continue;
        }
        let average_power_w = chunk.iter().map(|point| point.power_w).sum::<f64>() / chunk.len() as f64;
        buckets.push(EnergyBucket {
            hour_start: start,
            average_power_w,
            // Average power over one hour, W → Wh.
            energy_wh: average_power_w,
        });
    }
    buckets
}

fn day_totals(
    buckets: &[EnergyBucket],
    uncorrected: &[EnergyBucket],
    samples: &[WeatherSample],
) -> Vec<DayTotal> {
    let cloud_by_day = samples
        .iter()
        .filter(|sample| sample.cloud_cover_total.is_finite())
        .into_group_map_by(|sample| sample.timestamp.date_naive());
    let uncorrected_by_day = sum_by_day(uncorrected);

    sum_by_day(buckets)
        .into_iter()
        .map(|(date, energy_wh)| {
            let average_cloud_cover = cloud_by_day.get(&date).map_or(0.0, |day| {
                day.iter().map(|sample| sample.cloud_cover_total).sum::<f64>() / day.len() as f64
            });
            let uncorrected_energy_wh = uncorrected_by_day
                .iter()
                .find(|(other, _)| *other == date)
                .map_or(0.0, |(_, energy)| *energy);
            DayTotal { date, energy_wh, uncorrected_energy_wh, average_cloud_cover }
        })
        .collect()
}

fn sum_by_day(buckets: &[EnergyBucket]) -> Vec<(NaiveDate, f64)> {
    buckets
        .iter()
        .chunk_by(|bucket| bucket.hour_start.date_naive())
        .into_iter()
        .map(|(date, day)| (date, day.map(|bucket| bucket.energy_wh).sum()))
        .collect()
}

fn adjustment_stats(days: &[DayTotal], samples: &[WeatherSample]) -> AdjustmentStats {
    let total_energy_before_wh = days.iter().map(|day| day.uncorrected_energy_wh).sum::<f64>();
    let total_energy_after_wh = days.iter().map(|day| day.energy_wh).sum::<f64>();
    let adjustment_percent = if total_energy_before_wh > 0.0 {
        (total_energy_after_wh - total_energy_before_wh) / total_energy_before_wh * 100.0
    } else {
        0.0
    };

    let first_day = samples.first().map(|first| first.timestamp + TimeDelta::hours(24));
    let covers = samples
        .iter()
        .take_while(|sample| first_day.is_some_and(|end| sample.timestamp < end))
        .map(|sample| sample.cloud_cover_total)
        .filter(|cover| cover.is_finite())
        .collect_vec();
    let average_cloud_cover =
        if covers.is_empty() { 0.0 } else { covers.iter().sum::<f64>() / covers.len() as f64 };

    AdjustmentStats {
        average_cloud_cover,
        total_energy_before_wh,
        total_energy_after_wh,
        adjustment_percent,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::models::site::tests::lyon_array;
    use crate::services::cloud_correction::CloudDiscount;

    pub(crate) fn at(timestamp: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(timestamp).unwrap()
    }

    /// Quarter-hourly samples from `start` with a bell-shaped irradiance.
    pub(crate) fn summer_day(start: &str, n: usize, cloud_cover: f64) -> Vec<WeatherSample> {
        let start = at(start);
        (0..n)
            .map(|i| {
                let timestamp = start + TimeDelta::minutes(15 * i as i64);
                let hour = f64::from(timestamp.hour()) + f64::from(timestamp.minute()) / 60.0;
                let irradiance = (900.0 * (1.0 - ((hour - 13.5) / 7.0).powi(2))).max(0.0);
                WeatherSample {
                    timestamp,
                    irradiance_w_m2: irradiance,
                    temperature_c: 22.0,
                    cloud_cover_total: cloud_cover,
                }
            })
            .collect()
    }

    fn point(timestamp: &str, power_w: f64) -> PowerPoint {
        PowerPoint { timestamp: at(timestamp), power_w }
    }

    /// Constant-output stand-in for a sub-array.
    struct Fixed(f64);

    impl PowerEstimator for Fixed {
        fn estimate(&self, _sample: &WeatherSample) -> f64 {
            self.0
        }
    }

    #[test]
    fn test_sum_corrected_reduces_over_arrays() {
        let pairs = [
            (Fixed(1000.0), CloudCorrectionAdjuster::new(0.0, CloudDiscount::default())),
            (Fixed(500.0), CloudCorrectionAdjuster::new(1.0, CloudDiscount::default())),
        ];
        let sample = summer_day("2025-06-21T12:00:00+02:00", 1, 40.0)[0];
        let (raw, corrected) = sum_corrected(&pairs, &sample);
        assert_eq!(raw, 1500.0);
        assert_relative_eq!(corrected, 1000.0 + 500.0 * 0.6);
    }

    #[test]
    fn test_empty_weather_fails() {
        let sites = [lyon_array()];
        assert_eq!(ForecastSeriesBuilder::new(&sites).build(&[]), Err(ForecastError::EmptyWeather));
    }

    #[test]
    fn test_no_arrays_fails() {
        let samples = summer_day("2025-06-21T12:00:00+02:00", 4, 0.0);
        assert_eq!(ForecastSeriesBuilder::new(&[]).build(&samples), Err(ForecastError::NoArrays));
    }

    #[test]
    fn test_non_monotonic_weather_fails() {
        let sites = [lyon_array()];
        let mut samples = summer_day("2025-06-21T12:00:00+02:00", 4, 0.0);
        samples.swap(1, 2);
        let result = ForecastSeriesBuilder::new(&sites).build(&samples);
        assert!(matches!(result, Err(ForecastError::NotIncreasing { index: 2, .. })));

        let mut samples = summer_day("2025-06-21T12:00:00+02:00", 4, 0.0);
        samples[3].timestamp = samples[2].timestamp;
        assert!(ForecastSeriesBuilder::new(&sites).build(&samples).is_err());
    }

    #[test]
    fn test_arrays_are_summed() {
        let east = SiteModel { id: "east".into(), azimuth: 90.0, ..lyon_array() };
        let west = SiteModel { id: "west".into(), azimuth: 270.0, ..lyon_array() };
        let samples = summer_day("2025-06-21T06:00:00+02:00", 56, 30.0);

        let both = ForecastSeriesBuilder::new(&[east.clone(), west.clone()]).build(&samples).unwrap();
        let east_only = ForecastSeriesBuilder::new(&[east]).build(&samples).unwrap();
        let west_only = ForecastSeriesBuilder::new(&[west]).build(&samples).unwrap();
        for ((sum, e), w) in both.series.points.iter().zip(&east_only.series.points).zip(&west_only.series.points) {
            assert_relative_eq!(sum.power_w, e.power_w + w.power_w, max_relative = 1e-12);
        }
    }

    #[test]
    fn test_points_are_finite_and_non_negative() {
        let sites = [lyon_array()];
        let mut samples = summer_day("2025-06-21T00:00:00+02:00", 96, 50.0);
        samples[50].irradiance_w_m2 = f64::NAN;
        samples[51].temperature_c = f64::NAN;
        samples[52].irradiance_w_m2 = -400.0;
        samples[53].cloud_cover_total = f64::NAN;
        let forecast = ForecastSeriesBuilder::new(&sites).build(&samples).unwrap();
        assert_eq!(forecast.series.points.len(), 96);
        assert!(forecast.series.points.iter().all(|p| p.power_w.is_finite() && p.power_w >= 0.0));
        assert_eq!(forecast.series.points[50].power_w, 0.0);
        assert_eq!(forecast.series.points[51].power_w, 0.0);
        assert_eq!(forecast.series.points[52].power_w, 0.0);
        assert!(forecast.series.points[53].power_w > 0.0);
    }

    #[test]
    fn test_inverter_limit_clamps() {
        let sites = [lyon_array()];
        let samples = summer_day("2025-06-21T10:00:00+02:00", 16, 0.0);
        let forecast = ForecastSeriesBuilder::new(&sites)
            .with_inverter_limit_kw(Some(1.5))
            .build(&samples)
            .unwrap();
        assert!(forecast.series.points.iter().all(|p| p.power_w <= 1500.0));
        assert!(forecast.series.points.iter().any(|p| p.power_w == 1500.0));
    }

    #[test]
    fn test_buckets_skip_partial_hours() {
        let points = [
            point("2025-06-21T11:30:00+02:00", 50.0),
            point("2025-06-21T11:45:00+02:00", 50.0),
            point("2025-06-21T12:00:00+02:00", 100.0),
            point("2025-06-21T12:15:00+02:00", 200.0),
            point("2025-06-21T12:30:00+02:00", 300.0),
            point("2025-06-21T12:45:00+02:00", 400.0),
            point("2025-06-21T13:00:00+02:00", 400.0),
            point("2025-06-21T13:15:00+02:00", 400.0),
            point("2025-06-21T13:30:00+02:00", 400.0),
        ];
        let buckets = energy_buckets(&points, TimeDelta::minutes(15));
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].hour_start, at("2025-06-21T12:00:00+02:00"));
        assert_relative_eq!(buckets[0].energy_wh, 250.0);
    }

    #[test]
    fn test_buckets_skip_hours_with_gaps() {
        let points = [
            point("2025-06-21T12:00:00+02:00", 100.0),
            point("2025-06-21T12:15:00+02:00", 100.0),
            point("2025-06-21T12:45:00+02:00", 100.0),
            point("2025-06-21T13:00:00+02:00", 100.0),
            point("2025-06-21T13:15:00+02:00", 100.0),
            point("2025-06-21T13:30:00+02:00", 100.0),
            point("2025-06-21T13:45:00+02:00", 100.0),
        ];
        let buckets = energy_buckets(&points, TimeDelta::minutes(15));
        assert_eq!(buckets.iter().map(|b| b.hour_start).collect_vec(), [at("2025-06-21T13:00:00+02:00")]);
    }

    #[test]
    fn test_step_ignores_irregular_first_pair() {
        let start = at("2025-06-21T00:30:00+02:00");
        let points = std::iter::once(point("2025-06-21T00:00:00+02:00", 100.0))
            .chain((0..40).map(|i| PowerPoint { timestamp: start + TimeDelta::minutes(15 * i), power_w: 100.0 }))
            .collect_vec();
        let step = ForecastSeries { points: points.clone() }.step();
        assert_eq!(step, Some(TimeDelta::minutes(15)));

        let buckets = energy_buckets(&points, TimeDelta::minutes(15));
        assert_eq!(buckets.len(), 9);
        assert_eq!(buckets[0].hour_start, at("2025-06-21T01:00:00+02:00"));
        assert_eq!(buckets[8].hour_start, at("2025-06-21T09:00:00+02:00"));
    }

    #[test]
    fn test_step_of_short_series() {
        assert_eq!(ForecastSeries::default().step(), None);
        let single = ForecastSeries { points: vec![point("2025-06-21T12:00:00Z", 1.0)] };
        assert_eq!(single.step(), None);
    }

    #[test]
    fn test_hourly_cadence_buckets() {
        let points = [point("2025-06-21T12:00:00Z", 100.0), point("2025-06-21T13:00:00Z", 300.0)];
        let buckets = energy_buckets(&points, TimeDelta::hours(1));
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[1].energy_wh, 300.0);
    }

    #[test]
    fn test_day_totals_and_stats() {
        let sites = [lyon_array()];
        let samples = summer_day("2025-06-21T00:00:00+02:00", 96 * 2, 60.0);
        let forecast = ForecastSeriesBuilder::new(&sites).build(&samples).unwrap();

        assert_eq!(forecast.buckets.len(), 48);
        assert_eq!(forecast.days.len(), 2);
        let today = forecast.days[0];
        assert_eq!(today.date, NaiveDate::from_ymd_opt(2025, 6, 21).unwrap());
        assert_relative_eq!(today.average_cloud_cover, 60.0);
        // Default curve, factor 0.7, 60 % cover → 42 % less energy.
        assert_relative_eq!(today.energy_wh, today.uncorrected_energy_wh * 0.58, max_relative = 1e-9);
        assert_relative_eq!(forecast.stats.adjustment_percent, -42.0, max_relative = 1e-9);
        assert_relative_eq!(forecast.stats.average_cloud_cover, 60.0);
    }
}
