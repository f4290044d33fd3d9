use serde::Serialize;
use utoipa::ToSchema;

use crate::config::{ArrayConfig, ConfigError, SiteConfig};
use crate::services::cloud_correction::{CloudCorrectionAdjuster, CloudDiscount};

/// Typical DC wiring efficiency of a residential string.
pub const DEFAULT_DC_EFFICIENCY: f64 = 0.93;
/// Nameplate cell efficiency of crystalline silicon.
pub const DEFAULT_CELL_EFFICIENCY: f64 = 0.12;
pub const DEFAULT_CLOUD_CORRECTION_FACTOR: f64 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct Location {
    /// Geographic latitude (−90 … +90)
    pub latitude: f64,
    /// Geographic longitude (−180 … +180)
    pub longitude: f64,
}

/// Geometry and electrical parameters of one sub-array.
///
/// Built once per refresh from the configuration and never mutated; the
/// forecast run that created it owns it.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct SiteModel {
    pub id: String,
    pub location: Location,
    /// Compass azimuth of the panel normal in degrees (0 = north, 180 = south)
    pub azimuth: f64,
    /// Panel slope from horizontal in degrees
    pub tilt: f64,
    /// Array inclination in degrees, defaults to `tilt`; validated and listed
    /// with the array, while the estimator transposes with `tilt`
    pub declination: f64,
    pub peak_power_kw: f64,
    pub dc_efficiency: f64,
    pub cell_efficiency: f64,
    pub cloud_correction_factor: f64,
    pub cloud_discount: CloudDiscount,
    pub damping_morning: f64,
    pub damping_evening: f64,
}

impl SiteModel {
    /// Validates one configured array against the site defaults.
    pub fn try_new(
        array: &ArrayConfig,
        site: &SiteConfig,
        cloud_correction_factor: f64,
        cloud_discount: CloudDiscount,
    ) -> Result<Self, ConfigError> {
        let model = Self {
            id: array.id.clone(),
            location: Location {
                latitude: array.latitude.unwrap_or(site.latitude),
                longitude: array.longitude.unwrap_or(site.longitude),
            },
            azimuth: array.azimuth,
            tilt: array.tilt,
            declination: array.declination.unwrap_or(array.tilt),
            peak_power_kw: array.peak_power_kw,
            dc_efficiency: array.dc_efficiency,
            cell_efficiency: array.cell_efficiency,
            cloud_correction_factor: array
                .cloud_correction_factor
                .unwrap_or(cloud_correction_factor),
            cloud_discount,
            damping_morning: array.damping_morning,
            damping_evening: array.damping_evening,
        };
        model.validate()?;
        Ok(model)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let check = |field: &'static str, value: f64, ok: bool, range: &'static str| {
            if ok {
                Ok(())
            } else {
                Err(ConfigError::OutOfRange { id: self.id.clone(), field, value, range })
            }
        };
        let Location { latitude, longitude } = self.location;
        check("latitude", latitude, (-90.0..=90.0).contains(&latitude), "[-90, 90]")?;
        check("longitude", longitude, (-180.0..=180.0).contains(&longitude), "[-180, 180]")?;
        check("azimuth", self.azimuth, (0.0..360.0).contains(&self.azimuth), "[0, 360)")?;
        check("tilt", self.tilt, (0.0..=90.0).contains(&self.tilt), "[0, 90]")?;
        check(
            "declination",
            self.declination,
            (0.0..=90.0).contains(&self.declination),
            "[0, 90]",
        )?;
        check("peak_power_kw", self.peak_power_kw, self.peak_power_kw > 0.0, "> 0")?;
        check(
            "dc_efficiency",
            self.dc_efficiency,
            self.dc_efficiency > 0.0 && self.dc_efficiency <= 1.0,
            "(0, 1]",
        )?;
        check(
            "cell_efficiency",
            self.cell_efficiency,
            self.cell_efficiency > 0.0 && self.cell_efficiency < 1.0,
            "(0, 1)",
        )?;
        check(
            "cloud_correction_factor",
            self.cloud_correction_factor,
            (0.0..=1.0).contains(&self.cloud_correction_factor),
            "[0, 1]",
        )?;
        check(
            "damping_morning",
            self.damping_morning,
            (0.0..=1.0).contains(&self.damping_morning),
            "[0, 1]",
        )?;
        check(
            "damping_evening",
            self.damping_evening,
            (0.0..=1.0).contains(&self.damping_evening),
            "[0, 1]",
        )?;
        self.cloud_discount.validate().map_err(|(field, value, range)| {
            ConfigError::OutOfRange { id: self.id.clone(), field, value, range }
        })
    }

    pub fn peak_power_w(&self) -> f64 {
        self.peak_power_kw * 1000.0
    }

    pub fn adjuster(&self) -> CloudCorrectionAdjuster {
        CloudCorrectionAdjuster::new(self.cloud_correction_factor, self.cloud_discount)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// South-facing 4 kWp array near Lyon.
    pub(crate) fn lyon_array() -> SiteModel {
        SiteModel {
            id: "roof".to_string(),
            location: Location { latitude: 45.75, longitude: 4.85 },
            azimuth: 180.0,
            tilt: 30.0,
            declination: 30.0,
            peak_power_kw: 4.0,
            dc_efficiency: DEFAULT_DC_EFFICIENCY,
            cell_efficiency: DEFAULT_CELL_EFFICIENCY,
            cloud_correction_factor: DEFAULT_CLOUD_CORRECTION_FACTOR,
            cloud_discount: CloudDiscount::default(),
            damping_morning: 0.0,
            damping_evening: 0.0,
        }
    }

    #[test]
    fn test_valid_array_passes() {
        assert_eq!(lyon_array().validate(), Ok(()));
    }

    #[test]
    fn test_azimuth_360_rejected() {
        let site = SiteModel { azimuth: 360.0, ..lyon_array() };
        assert!(matches!(
            site.validate(),
            Err(ConfigError::OutOfRange { field: "azimuth", .. })
        ));
    }

    #[test]
    fn test_nan_peak_power_rejected() {
        let site = SiteModel { peak_power_kw: f64::NAN, ..lyon_array() };
        assert!(matches!(
            site.validate(),
            Err(ConfigError::OutOfRange { field: "peak_power_kw", .. })
        ));
    }

    #[test]
    fn test_correction_factor_above_one_rejected() {
        let site = SiteModel { cloud_correction_factor: 1.2, ..lyon_array() };
        assert!(site.validate().is_err());
    }
}
