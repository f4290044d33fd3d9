use std::collections::HashSet;
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use thiserror::Error;

use crate::models::site::{
    DEFAULT_CELL_EFFICIENCY, DEFAULT_CLOUD_CORRECTION_FACTOR, DEFAULT_DC_EFFICIENCY, SiteModel,
};
use crate::services::cloud_correction::CloudDiscount;

fn default_offline_mode() -> bool { false }
fn default_port() -> u16 { 8080 }
fn default_base_url() -> String { "https://api.open-meteo.com".to_string() }
fn default_forecast_days() -> u32 { 7 }
fn default_refresh_interval_minutes() -> u64 { 30 }
fn default_cloud_correction_factor() -> f64 { DEFAULT_CLOUD_CORRECTION_FACTOR }
fn default_dc_efficiency() -> f64 { DEFAULT_DC_EFFICIENCY }
fn default_cell_efficiency() -> f64 { DEFAULT_CELL_EFFICIENCY }

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("no arrays configured")]
    NoArrays,

    #[error("array id {0:?} is configured more than once")]
    DuplicateId(String),

    #[error("array {id:?}: {field} = {value} is outside {range}")]
    OutOfRange {
        id: String,
        field: &'static str,
        value: f64,
        range: &'static str,
    },

    #[error("forecast_days = {0} is outside [1, 16]")]
    ForecastDays(u32),

    #[error("refresh_interval_minutes must be positive")]
    RefreshInterval,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default = "default_offline_mode")]
    pub offline_mode: bool,
    pub site: SiteConfig,
    #[serde(default)]
    pub weather: WeatherConfig,
    #[serde(default)]
    pub correction: CorrectionConfig,
    pub arrays: Vec<ArrayConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: default_port() }
    }
}

/// Location shared by every array unless an array overrides it.
#[derive(Debug, Deserialize, Clone)]
pub struct SiteConfig {
    pub latitude: f64,
    pub longitude: f64,
    /// AC limit of the inverter; summed power is clamped to it
    #[serde(default)]
    pub inverter_power_kw: Option<f64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WeatherConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// A single Open-Meteo model name, provider default when absent
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_forecast_days")]
    pub forecast_days: u32,
    #[serde(default = "default_refresh_interval_minutes")]
    pub refresh_interval_minutes: u64,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: None,
            forecast_days: default_forecast_days(),
            refresh_interval_minutes: default_refresh_interval_minutes(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorrectionConfig {
    #[serde(default = "default_cloud_correction_factor")]
    pub cloud_correction_factor: f64,
    #[serde(default)]
    pub discount: CloudDiscount,
}

impl Default for CorrectionConfig {
    fn default() -> Self {
        Self {
            cloud_correction_factor: default_cloud_correction_factor(),
            discount: CloudDiscount::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ArrayConfig {
    pub id: String,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    /// Compass degrees, 180 = south
    pub azimuth: f64,
    pub tilt: f64,
    /// Defaults to `tilt`
    #[serde(default)]
    pub declination: Option<f64>,
    pub peak_power_kw: f64,
    #[serde(default = "default_dc_efficiency")]
    pub dc_efficiency: f64,
    #[serde(default = "default_cell_efficiency")]
    pub cell_efficiency: f64,
    /// Overrides the global factor for this array
    #[serde(default)]
    pub cloud_correction_factor: Option<f64>,
    #[serde(default)]
    pub damping_morning: f64,
    #[serde(default)]
    pub damping_evening: f64,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config = serde_json::from_str(&content)
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(config)
    }

    /// Validates the whole file and turns every array into a [`SiteModel`].
    pub fn site_models(&self) -> Result<Vec<SiteModel>, ConfigError> {
        if self.arrays.is_empty() {
            return Err(ConfigError::NoArrays);
        }
        if !(1..=16).contains(&self.weather.forecast_days) {
            return Err(ConfigError::ForecastDays(self.weather.forecast_days));
        }
        if self.weather.refresh_interval_minutes == 0 {
            return Err(ConfigError::RefreshInterval);
        }
        if let Some(limit) = self.site.inverter_power_kw.filter(|kw| !(*kw > 0.0)) {
            return Err(ConfigError::OutOfRange {
                id: "site".to_string(),
                field: "inverter_power_kw",
                value: limit,
                range: "> 0",
            });
        }

        let mut seen = HashSet::new();
        self.arrays
            .iter()
            .map(|array| {
                if !seen.insert(array.id.as_str()) {
                    return Err(ConfigError::DuplicateId(array.id.clone()));
                }
                SiteModel::try_new(
                    array,
                    &self.site,
                    self.correction.cloud_correction_factor,
                    self.correction.discount,
                )
            })
            .collect()
    }
}
