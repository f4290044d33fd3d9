/// ============================================================
///  Solar geometry & plane-of-array transposition
///
///  Pipeline:
///   1. Sun position     – declination, equation of time, hour angle,
///                         elevation, azimuth (Spencer 1971)
///   2. Extraterrestrial – eccentricity-corrected solar constant
///   3. Decomposition    – Erbs: GHI → beam + diffuse
///   4. Transposition    – beam · cos θ + isotropic sky + ground reflection
/// ============================================================

use chrono::{DateTime, Datelike, TimeZone, Timelike, Utc};
use std::f64::consts::PI;

use crate::models::site::Location;

// ─── Physical constants ──────────────────────────────────────
const SC: f64 = 1361.0; // Solar constant W/m²
const DEG: f64 = PI / 180.0;
/// Standard refraction + solar disc radius at the horizon.
const HORIZON_DEG: f64 = -0.833;
pub const ALBEDO: f64 = 0.20;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SunPosition {
    pub elevation_deg: f64,
    /// Degrees from north, clockwise
    pub azimuth_deg: f64,
    /// Negative before solar noon, in (−180, 180]
    pub hour_angle_deg: f64,
    /// Hour angle of sunset for this day; 0 in polar night, 180 in midnight sun
    pub sunset_hour_angle_deg: f64,
    pub extraterrestrial_w_m2: f64,
}

impl SunPosition {
    pub fn is_up(&self) -> bool {
        self.elevation_deg > 0.0
    }

    /// Local solar time in hours, 12 at solar noon.
    pub fn solar_time_h(&self) -> f64 {
        12.0 + self.hour_angle_deg / 15.0
    }
}

pub fn sun_position<Tz: TimeZone>(at: &DateTime<Tz>, location: Location) -> SunPosition {
    let utc = at.with_timezone(&Utc);

    // ── 1. Time decomposition ──────────────────────────────────
    let doy = f64::from(utc.ordinal());
    let ut_h = f64::from(utc.hour())
        + f64::from(utc.minute()) / 60.0
        + f64::from(utc.second()) / 3600.0;

    // ── 2. Declination & equation of time (Spencer 1971) ──────
    let b = 2.0 * PI * (doy - 1.0) / 365.0;
    let decl = 0.006918 - 0.399912 * b.cos() + 0.070257 * b.sin()
        - 0.006758 * (2.0 * b).cos()
        + 0.000907 * (2.0 * b).sin()
        - 0.002697 * (3.0 * b).cos()
        + 0.00148 * (3.0 * b).sin();
    let eot_min = 229.18
        * (0.000075 + 0.001868 * b.cos()
            - 0.032077 * b.sin()
            - 0.014615 * (2.0 * b).cos()
            - 0.04089 * (2.0 * b).sin());

    // ── 3. Hour angle from true solar time ────────────────────
    let solar_time_h = ut_h + location.longitude / 15.0 + eot_min / 60.0;
    let omega_deg = (15.0 * (solar_time_h - 12.0) + 180.0).rem_euclid(360.0) - 180.0;
    let omega = omega_deg * DEG;

    // ── 4. Elevation & azimuth ────────────────────────────────
    let lat = location.latitude * DEG;
    let sin_alpha = lat.sin() * decl.sin() + lat.cos() * decl.cos() * omega.cos();
    let alpha = sin_alpha.clamp(-1.0, 1.0).asin();
    let cos_az = if (alpha.cos() * lat.cos()).abs() > 1e-9 {
        (decl.sin() - sin_alpha * lat.sin()) / (alpha.cos() * lat.cos())
    } else {
        0.0
    };
    let az_abs = cos_az.clamp(-1.0, 1.0).acos() / DEG;
    let azimuth_deg = if omega_deg > 0.0 { 360.0 - az_abs } else { az_abs };

    // ── 5. Day length ─────────────────────────────────────────
    let cos_omega0 = ((HORIZON_DEG * DEG).sin() - lat.sin() * decl.sin())
        / (lat.cos() * decl.cos());
    let sunset_hour_angle_deg = cos_omega0.clamp(-1.0, 1.0).acos() / DEG;

    // ── 6. Extraterrestrial irradiance ────────────────────────
    let e0 = SC
        * (1.00011 + 0.034221 * b.cos() + 0.00128 * b.sin()
            + 0.000719 * (2.0 * b).cos()
            + 0.000077 * (2.0 * b).sin());

    SunPosition {
        elevation_deg: alpha / DEG,
        azimuth_deg,
        hour_angle_deg: omega_deg,
        sunset_hour_angle_deg,
        extraterrestrial_w_m2: e0,
    }
}

/// Cosine of the angle between the sun and the panel normal, 0 when the sun
/// is behind the panel.
pub fn cos_incidence(sun: &SunPosition, tilt_deg: f64, panel_azimuth_deg: f64) -> f64 {
    let alpha = sun.elevation_deg * DEG;
    let tilt = tilt_deg * DEG;
    let az_diff = (sun.azimuth_deg - panel_azimuth_deg) * DEG;
    (alpha.sin() * tilt.cos() + alpha.cos() * tilt.sin() * az_diff.cos()).max(0.0)
}

/// Erbs et al. (1982) diffuse fraction from the clearness index.
fn diffuse_fraction(kt: f64) -> f64 {
    if kt <= 0.22 {
        1.0 - 0.09 * kt
    } else if kt <= 0.80 {
        0.9511 - 0.1604 * kt + 4.388 * kt.powi(2) - 16.638 * kt.powi(3) + 12.336 * kt.powi(4)
    } else {
        0.165
    }
}

/// Irradiance on the tilted panel plane (W/m²) from global horizontal
/// irradiance. Zero at night and for non-positive or missing GHI.
pub fn plane_of_array(ghi: f64, sun: &SunPosition, tilt_deg: f64, panel_azimuth_deg: f64) -> f64 {
    if !sun.is_up() || !(ghi > 0.0) {
        return 0.0;
    }
    let sin_alpha = (sun.elevation_deg * DEG).sin();
    let kt = (ghi / (sun.extraterrestrial_w_m2 * sin_alpha)).clamp(0.0, 1.0);
    let dhi = ghi * diffuse_fraction(kt);
    let dni = ((ghi - dhi) / sin_alpha).min(sun.extraterrestrial_w_m2);

    let tilt = tilt_deg * DEG;
    let beam = dni * cos_incidence(sun, tilt_deg, panel_azimuth_deg);
    let sky = dhi * (1.0 + tilt.cos()) / 2.0;
    let ground = ghi * ALBEDO * (1.0 - tilt.cos()) / 2.0;
    (beam + sky + ground).max(0.0)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use chrono::TimeZone;

    use super::*;

    const TURIN: Location = Location { latitude: 45.07, longitude: 7.68 };

    #[test]
    fn test_summer_noon_turin() {
        let t = Utc.with_ymd_and_hms(2025, 6, 21, 11, 30, 0).unwrap();
        let sun = sun_position(&t, TURIN);
        assert!(sun.elevation_deg > 65.0, "elevation {:.1}", sun.elevation_deg);
        assert!((150.0..210.0).contains(&sun.azimuth_deg), "azimuth {:.1}", sun.azimuth_deg);
        assert!(sun.hour_angle_deg.abs() < 5.0);
    }

    #[test]
    fn test_midnight_below_horizon() {
        let t = Utc.with_ymd_and_hms(2025, 6, 21, 23, 0, 0).unwrap();
        assert!(!sun_position(&t, TURIN).is_up());
    }

    #[test]
    fn test_winter_solstice_elevation() {
        let t = Utc.with_ymd_and_hms(2025, 12, 21, 11, 45, 0).unwrap();
        let sun = sun_position(&t, TURIN);
        assert!((15.0..25.0).contains(&sun.elevation_deg), "elevation {:.1}", sun.elevation_deg);
    }

    #[test]
    fn test_morning_sun_in_the_east() {
        let t = Utc.with_ymd_and_hms(2025, 6, 21, 5, 0, 0).unwrap();
        let sun = sun_position(&t, TURIN);
        assert!(sun.hour_angle_deg < 0.0);
        assert!(sun.azimuth_deg < 120.0, "azimuth {:.1}", sun.azimuth_deg);
    }

    #[test]
    fn test_day_length_at_equinox() {
        let t = Utc.with_ymd_and_hms(2025, 3, 20, 12, 0, 0).unwrap();
        let sun = sun_position(&t, TURIN);
        // ~12 h of daylight → sunset hour angle ≈ 90°.
        assert!((88.0..94.0).contains(&sun.sunset_hour_angle_deg));
    }

    #[test]
    fn test_polar_night_has_no_day() {
        let t = Utc.with_ymd_and_hms(2025, 12, 21, 12, 0, 0).unwrap();
        let svalbard = Location { latitude: 78.2, longitude: 15.6 };
        let sun = sun_position(&t, svalbard);
        assert!(!sun.is_up());
        assert_eq!(sun.sunset_hour_angle_deg, 0.0);
    }

    #[test]
    fn test_flat_panel_receives_ghi() {
        let t = Utc.with_ymd_and_hms(2025, 6, 21, 11, 30, 0).unwrap();
        let sun = sun_position(&t, TURIN);
        assert_relative_eq!(plane_of_array(750.0, &sun, 0.0, 180.0), 750.0, epsilon = 1e-6);
    }

    #[test]
    fn test_south_panel_beats_north_panel_in_winter() {
        let t = Utc.with_ymd_and_hms(2025, 12, 21, 11, 45, 0).unwrap();
        let sun = sun_position(&t, TURIN);
        let south = plane_of_array(300.0, &sun, 35.0, 180.0);
        let north = plane_of_array(300.0, &sun, 35.0, 0.0);
        assert!(south > 300.0 && south > north, "south {south:.0} north {north:.0}");
    }

    #[test]
    fn test_night_or_negative_ghi_is_zero() {
        let night = Utc.with_ymd_and_hms(2025, 6, 21, 23, 0, 0).unwrap();
        assert_eq!(plane_of_array(500.0, &sun_position(&night, TURIN), 30.0, 180.0), 0.0);
        let noon = Utc.with_ymd_and_hms(2025, 6, 21, 11, 30, 0).unwrap();
        assert_eq!(plane_of_array(-20.0, &sun_position(&noon, TURIN), 30.0, 180.0), 0.0);
    }
}
