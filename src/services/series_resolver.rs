//! Point-in-time queries against an immutable forecast.
//!
//! Every function is stateless; `None` means "no data", never zero production.

use chrono::{DateTime, Days, FixedOffset, NaiveDate, TimeDelta};

use crate::models::forecast::{
    EnergyBucket, Forecast, ForecastSeries, ForecastSummary, PowerPoint,
};
use crate::services::forecast_builder::hour_start;

/// Stepped lookup: power of the last point at or before `at`.
///
/// Never interpolates. Past the last point the last value holds.
pub fn power_now(series: &ForecastSeries, at: DateTime<FixedOffset>) -> Option<f64> {
    let idx = series.points.partition_point(|point| point.timestamp <= at);
    idx.checked_sub(1).map(|i| series.points[i].power_w)
}

pub fn power_at(series: &ForecastSeries, now: DateTime<FixedOffset>, offset: TimeDelta) -> Option<f64> {
    power_now(series, now + offset)
}

/// Bucket whose window starts exactly at `start`; hours the series does not
/// fully cover have none.
pub fn energy_for_hour(forecast: &Forecast, start: DateTime<FixedOffset>) -> Option<EnergyBucket> {
    forecast.buckets.iter().find(|bucket| bucket.hour_start == start).copied()
}

pub fn energy_current_hour(forecast: &Forecast, now: DateTime<FixedOffset>) -> Option<EnergyBucket> {
    energy_for_hour(forecast, hour_start(now)?)
}

pub fn energy_next_hour(forecast: &Forecast, now: DateTime<FixedOffset>) -> Option<EnergyBucket> {
    energy_for_hour(forecast, hour_start(now)? + TimeDelta::hours(1))
}

pub fn energy_for_day(forecast: &Forecast, date: NaiveDate) -> Option<f64> {
    forecast.days.iter().find(|day| day.date == date).map(|day| day.energy_wh)
}

/// Energy still to come today: the unexpired share of the current hour plus
/// every later bucket of the same date.
pub fn energy_remaining_today(forecast: &Forecast, now: DateTime<FixedOffset>) -> Option<f64> {
    let now = local(forecast, now);
    let current = hour_start(now)?;
    let today = now.date_naive();

    let mut any = false;
    let mut remaining = 0.0;
    for bucket in forecast.buckets.iter().filter(|b| b.hour_start.date_naive() == today) {
        if bucket.hour_start > current {
            remaining += bucket.energy_wh;
            any = true;
        } else if bucket.hour_start == current {
            let left = TimeDelta::hours(1) - (now - current);
            remaining += bucket.energy_wh * left.num_seconds() as f64 / 3600.0;
            any = true;
        }
    }
    // Past the last bucket of a covered day nothing is left to produce.
    if !any && forecast.days.iter().any(|day| day.date == today) {
        return Some(0.0);
    }
    any.then_some(remaining)
}

/// Timestamp of the highest point on `date`; `None` when the day never
/// produces anything.
pub fn peak_time(series: &ForecastSeries, date: NaiveDate) -> Option<DateTime<FixedOffset>> {
    series
        .points
        .iter()
        .filter(|point| point.timestamp.date_naive() == date)
        .fold(None, |best: Option<&PowerPoint>, point| {
            if best.is_none_or(|b| point.power_w > b.power_w) { Some(point) } else { best }
        })
        .filter(|point| point.power_w > 0.0)
        .map(|point| point.timestamp)
}

/// Resolves every sensor-style view at `now`.
pub fn summarize(forecast: &Forecast, version: u64, now: DateTime<FixedOffset>) -> ForecastSummary {
    let now = local(forecast, now);
    let today = now.date_naive();
    let day = |n: u64| today.checked_add_days(Days::new(n));
    let series = &forecast.series;

    ForecastSummary {
        at: now,
        version,
        power_now_w: power_now(series, now),
        power_next_15min_w: power_at(series, now, TimeDelta::minutes(15)),
        power_next_30min_w: power_at(series, now, TimeDelta::minutes(30)),
        power_next_hour_w: power_at(series, now, TimeDelta::hours(1)),
        power_next_12hours_w: power_at(series, now, TimeDelta::hours(12)),
        power_next_24hours_w: power_at(series, now, TimeDelta::hours(24)),
        energy_current_hour_wh: energy_current_hour(forecast, now).map(|b| b.energy_wh),
        energy_next_hour_wh: energy_next_hour(forecast, now).map(|b| b.energy_wh),
        energy_today_wh: energy_for_day(forecast, today),
        energy_today_remaining_wh: energy_remaining_today(forecast, now),
        energy_tomorrow_wh: day(1).and_then(|date| energy_for_day(forecast, date)),
        energy_upcoming_days_wh: (2..=7)
            .map(|n| day(n).and_then(|date| energy_for_day(forecast, date)))
            .collect(),
        peak_time_today: peak_time(series, today),
        peak_time_tomorrow: day(1).and_then(|date| peak_time(series, date)),
        stats: forecast.stats,
    }
}

/// `now` expressed in the series' own offset, so day and hour boundaries
/// match the buckets.
fn local(forecast: &Forecast, now: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    forecast.series.offset().map_or(now, |offset| now.with_timezone(&offset))
}
