use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeDelta};
use serde::Deserialize;

use crate::models::forecast::WeatherSample;
use crate::services::weather_service::WeatherError;

// ─── Open-Meteo wire types ────────────────────────────────────────────────────

const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M";
const MINUTELY_STEP_MINUTES: i64 = 15;

#[derive(Debug, Deserialize)]
pub struct ForecastResponse {
    pub utc_offset_seconds: i32,
    pub minutely_15: Minutely15,
    pub hourly: Option<Hourly>,
}

#[derive(Debug, Deserialize)]
pub struct Minutely15 {
    pub time: Vec<String>,
    pub shortwave_radiation: Vec<Option<f64>>,
    pub temperature_2m: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
pub struct Hourly {
    pub time: Vec<String>,
    pub cloud_cover: Vec<Option<f64>>,
}

impl ForecastResponse {
    /// Zips the 15-minute columns into samples and attaches the closest hourly
    /// cloud cover (at most two hours away, otherwise the cover is unknown).
    ///
    /// Open-Meteo labels a 15-minute radiation value with the end of the
    /// interval it averages; samples are stamped with the interval start.
    pub fn into_samples(self) -> Result<Vec<WeatherSample>, WeatherError> {
        let offset = FixedOffset::east_opt(self.utc_offset_seconds)
            .ok_or(WeatherError::Malformed("UTC offset out of range"))?;
        let m = self.minutely_15;
        if m.shortwave_radiation.len() != m.time.len() || m.temperature_2m.len() != m.time.len() {
            return Err(WeatherError::Malformed("minutely_15 columns differ in length"));
        }

        let clouds = match self.hourly {
            Some(hourly) => {
                if hourly.cloud_cover.len() != hourly.time.len() {
                    return Err(WeatherError::Malformed("hourly columns differ in length"));
                }
                hourly
                    .time
                    .iter()
                    .zip(hourly.cloud_cover)
                    .map(|(time, cover)| Ok((parse_time(time, offset)?, cover)))
                    .collect::<Result<Vec<_>, WeatherError>>()?
            }
            None => Vec::new(),
        };

        m.time
            .iter()
            .zip(m.shortwave_radiation)
            .zip(m.temperature_2m)
            .map(|((time, ghi), temperature)| {
                let timestamp = parse_time(time, offset)? - TimeDelta::minutes(MINUTELY_STEP_MINUTES);
                Ok(WeatherSample {
                    timestamp,
                    irradiance_w_m2: ghi.unwrap_or(f64::NAN),
                    temperature_c: temperature.unwrap_or(f64::NAN),
                    cloud_cover_total: closest_cloud_cover(&clouds, timestamp).unwrap_or(f64::NAN),
                })
            })
            .collect()
    }
}

fn parse_time(time: &str, offset: FixedOffset) -> Result<DateTime<FixedOffset>, WeatherError> {
    NaiveDateTime::parse_from_str(time, TIME_FORMAT)
        .ok()
        .and_then(|naive| naive.and_local_timezone(offset).single())
        .ok_or(WeatherError::Malformed("unparseable timestamp"))
}

fn closest_cloud_cover(
    clouds: &[(DateTime<FixedOffset>, Option<f64>)],
    at: DateTime<FixedOffset>,
) -> Option<f64> {
    let index = clouds.partition_point(|(time, _)| *time <= at);
    let before = index.checked_sub(1).and_then(|i| clouds.get(i));
    let after = clouds.get(index);
    let closest = match (before, after) {
        (Some(b), Some(a)) => {
            if at - b.0 <= a.0 - at {
                b
            } else {
                a
            }
        }
        (Some(only), None) | (None, Some(only)) => only,
        (None, None) => return None,
    };
    let distance = (closest.0 - at).abs();
    if distance <= TimeDelta::hours(2) { closest.1 } else { None }
}
