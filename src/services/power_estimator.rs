use crate::models::forecast::WeatherSample;
use crate::models::site::SiteModel;
use crate::services::solar_geometry::{SunPosition, plane_of_array, sun_position};

// ─── Module constants ────────────────────────────────────────
const G_STC: f64 = 1000.0; // W/m² at standard test conditions
const TEMP_STC_CELL: f64 = 25.0;
const ALPHA_TEMP: f64 = -0.004; // 1/°C for typical c-Si
const NOCT: f64 = 45.0;
const TAU_ALPHA: f64 = 0.9;

/// Capability shared by every sub-array: raw instantaneous power (W) for one
/// weather sample, before any cloud-cover correction.
pub trait PowerEstimator {
    fn estimate(&self, sample: &WeatherSample) -> f64;
}

impl<T: PowerEstimator + ?Sized> PowerEstimator for &T {
    fn estimate(&self, sample: &WeatherSample) -> f64 {
        (**self).estimate(sample)
    }
}

impl PowerEstimator for SiteModel {
    fn estimate(&self, sample: &WeatherSample) -> f64 {
        let sun = sun_position(&sample.timestamp, self.location);
        if !sun.is_up() {
            return 0.0;
        }
        let poa = plane_of_array(sample.irradiance_w_m2, &sun, self.tilt, self.azimuth);
        let cell_temp = cell_temperature(sample.temperature_c, poa, self.cell_efficiency);
        let efficiency = temperature_derating(cell_temp)
            * self.dc_efficiency
            * damping_coefficient(&sun, self.damping_morning, self.damping_evening);
        non_negative(self.peak_power_w() * (poa / G_STC) * efficiency)
    }
}

/// NOCT cell temperature: the share of absorbed light the cell turns into
/// electricity does not heat it.
pub fn cell_temperature(ambient_temp_c: f64, poa_w_m2: f64, cell_efficiency: f64) -> f64 {
    ambient_temp_c + poa_w_m2 * (NOCT - 20.0) / 800.0 * (1.0 - cell_efficiency / TAU_ALPHA)
}

pub fn temperature_derating(cell_temp_c: f64) -> f64 {
    (1.0 + ALPHA_TEMP * (cell_temp_c - TEMP_STC_CELL)).max(0.0)
}

/// Linear damping towards sunrise and sunset.
///
/// Rises from `1 − morning` at sunrise to 1 at solar noon, then falls back to
/// `1 − evening` at sunset. Both dampings at 0 yield exactly 1.
pub fn damping_coefficient(sun: &SunPosition, morning: f64, evening: f64) -> f64 {
    let half_day = sun.sunset_hour_angle_deg;
    if half_day <= 0.0 || sun.hour_angle_deg.abs() > half_day {
        return 1.0;
    }
    let (damping, progress) = if sun.hour_angle_deg <= 0.0 {
        (morning, (sun.hour_angle_deg + half_day) / half_day)
    } else {
        (evening, (half_day - sun.hour_angle_deg) / half_day)
    };
    (1.0 - damping) + progress * damping
}

/// Clamps negative and NaN power to zero.
pub fn non_negative(power_w: f64) -> f64 {
    if power_w > 0.0 { power_w } else { 0.0 }
}
