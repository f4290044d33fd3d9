/// ============================================================
///  Offline weather generator
///
///  Produces a synthetic weather horizon without any network call:
///   1. Clear-sky GHI   – Bird & Hulstrom simplified, Kasten & Young
///                        air mass
///   2. Cloud cover     – climatological clearness by latitude band
///                        and season, deterministic daily scatter,
///                        afternoon build-up
///   3. Ambient temp    – latitude × season × diurnal cycle
///
///  The irradiance handed out already includes the cloud attenuation,
///  like a real weather model would.
/// ============================================================

use chrono::{DateTime, Datelike, Days, FixedOffset, Offset, TimeDelta, Utc};
use std::f64::consts::PI;

use crate::models::forecast::WeatherSample;
use crate::models::site::Location;
use crate::services::solar_geometry::{SunPosition, sun_position};

/// Lowest clearness the climatology hands out; maps to full cloud cover.
const MIN_CLEARNESS: f64 = 0.15;

/// Clear-sky global horizontal irradiance (W/m²).
pub fn clear_sky_ghi(sun: &SunPosition) -> f64 {
    let alpha_deg = sun.elevation_deg;
    if alpha_deg <= 0.1 {
        return 0.0;
    }
    let sin_alpha = (alpha_deg * PI / 180.0).sin();
    let e0 = sun.extraterrestrial_w_m2;

    // Air mass – Kasten & Young (1989)
    let am = (1.0 / (sin_alpha + 0.50572 * (alpha_deg + 6.07995_f64).powf(-1.6364))).max(1.0);

    // Rayleigh
    let tr = (-0.0903 * am.powf(0.84) * (1.0 + am - am.powf(1.01))).exp();
    // Ozone (standard column 0.3 atm-cm)
    let to = 1.0 - 0.0013 * am;
    // Aerosol (Linke turbidity 3.0, typical continental)
    let tk = 3.0_f64;
    let ta = (-0.09 * tk.powf(0.978) * am.powf(0.9455)).exp();
    // Water vapour (precipitable water 1.5 cm)
    let tw = 1.0 - 0.0075 * am.powf(0.65);

    let total_t = tr * to * ta * tw;
    let dni = 0.9762 * e0 * total_t;
    let dhi = 0.79 * e0 * sin_alpha * (1.0 - total_t) * (0.5 * (1.0 - tr) + back_scatter(ta))
        / (1.0 - am + am.powf(1.02));
    (dni * sin_alpha + dhi).max(0.0)
}

#[inline]
fn back_scatter(ta: f64) -> f64 {
    // Approximated from Bird (1981) Table 2
    0.5 * (0.92 - ta.ln().abs() / 10.0).clamp(0.2, 0.5)
}

/// Fraction of clear-sky GHI that reaches the ground on an average day at
/// this place and season, in [MIN_CLEARNESS, 1].
fn clearness(location: Location, doy: f64, solar_time_h: f64) -> f64 {
    let Location { latitude, longitude } = location;
    let season_phase = if latitude >= 0.0 {
        (2.0 * PI * (doy - 180.0) / 365.0).cos()
    } else {
        (2.0 * PI * (doy - 365.0) / 365.0).cos()
    };

    let abs_lat = latitude.abs();
    let baseline = if abs_lat < 15.0 {
        0.55 + 0.05 * season_phase
    } else if abs_lat < 35.0 {
        0.70 + 0.10 * season_phase
    } else if abs_lat < 55.0 {
        0.62 + 0.12 * season_phase
    } else if abs_lat < 65.0 {
        0.52 + 0.10 * season_phase
    } else {
        0.45 + 0.10 * season_phase
    };

    // Same site and day always get the same scatter.
    let seed = ((latitude * 100.0) as i64).wrapping_mul(397)
        ^ ((longitude * 100.0) as i64).wrapping_mul(631)
        ^ (doy as i64).wrapping_mul(1013);
    let daily = ((seed % 1000) as f64 / 1000.0 - 0.5) * 2.0 * 0.12;

    let afternoon = if (6.0..=20.0).contains(&solar_time_h) {
        -0.05 * (solar_time_h - 13.0) / 7.0
    } else {
        0.0
    };

    (baseline + daily + afternoon).clamp(MIN_CLEARNESS, 1.0)
}

/// Total cloud cover (%) implied by a clearness value.
fn cloud_cover(clearness: f64) -> f64 {
    ((1.0 - clearness) / (1.0 - MIN_CLEARNESS) * 100.0).clamp(0.0, 100.0)
}

/// 2 m air temperature (°C): seasonal mean by latitude band plus a diurnal
/// swing peaking two hours after solar noon.
fn ambient_temperature(latitude: f64, doy: f64, solar_time_h: f64) -> f64 {
    let abs_lat = latitude.abs();
    let (annual_mean, amplitude) = match abs_lat {
        a if a < 10.0 => (27.0, 2.0),
        a if a < 25.0 => (22.0, 7.0),
        a if a < 40.0 => (15.0, 12.0),
        a if a < 55.0 => (8.0, 14.0),
        a if a < 66.5 => (1.0, 12.0),
        _ => (-10.0, 12.0),
    };
    let season_angle = if latitude >= 0.0 {
        2.0 * PI * (doy - 200.0) / 365.0
    } else {
        2.0 * PI * (doy - 20.0) / 365.0
    };
    let diurnal = 5.0 * (2.0 * PI * (solar_time_h - 14.0) / 24.0).cos();
    annual_mean + amplitude * season_angle.cos() + diurnal
}

/// One synthetic sample.
pub fn sample_at(location: Location, timestamp: DateTime<FixedOffset>) -> WeatherSample {
    let sun = sun_position(&timestamp, location);
    let doy = f64::from(timestamp.naive_utc().ordinal());
    let solar_time_h = sun.solar_time_h();
    let clearness = clearness(location, doy, solar_time_h);
    WeatherSample {
        timestamp,
        irradiance_w_m2: clear_sky_ghi(&sun) * clearness,
        temperature_c: ambient_temperature(location.latitude, doy, solar_time_h),
        cloud_cover_total: cloud_cover(clearness),
    }
}

/// Approximate civil offset from longitude, whole hours.
pub fn longitude_offset(longitude: f64) -> FixedOffset {
    let hours = (longitude / 15.0).round() as i32;
    FixedOffset::east_opt(hours * 3600).unwrap_or(Utc.fix())
}

/// Horizon of `days` whole local days starting at the midnight of `now`,
/// one sample every `step`.
pub fn generate(
    location: Location,
    now: DateTime<FixedOffset>,
    days: u32,
    step: TimeDelta,
) -> Vec<WeatherSample> {
    let offset = longitude_offset(location.longitude);
    let local = now.with_timezone(&offset).date_naive();
    let Some(start) = local
        .and_hms_opt(0, 0, 0)
        .and_then(|midnight| midnight.and_local_timezone(offset).single())
    else {
        return Vec::new();
    };
    let Some(end) = start.checked_add_days(Days::new(u64::from(days))) else {
        return Vec::new();
    };
    if step <= TimeDelta::zero() {
        return Vec::new();
    }

    std::iter::successors(Some(start), |t| Some(*t + step))
        .take_while(|t| *t < end)
        .map(|t| sample_at(location, t))
        .collect()
}
