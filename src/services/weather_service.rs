use chrono::{DateTime, FixedOffset, TimeDelta};
use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::WeatherConfig;
use crate::models::forecast::WeatherSample;
use crate::models::open_meteo::ForecastResponse;
use crate::models::site::Location;
use crate::services::clear_sky;

const MINUTELY_VARIABLES: &str = "shortwave_radiation,temperature_2m";
const HOURLY_VARIABLES: &str = "cloud_cover";

#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("the weather API is unreachable")]
    Unreachable,

    #[error("bad request")]
    BadRequest,

    #[error("the weather API refused the credentials")]
    Authentication,

    #[error("the weather API rejected the request parameters")]
    InvalidConfiguration,

    #[error("rate limit exceeded")]
    RateLimited,

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("unexpected content type {0:?}")]
    ContentType(String),

    #[error("multiple weather models are not supported: {0}")]
    MultipleModels(String),

    #[error("malformed weather payload: {0}")]
    Malformed(&'static str),
}

/// Maps provider status codes onto typed failures.
pub fn check_status(status: StatusCode) -> Result<(), WeatherError> {
    match status.as_u16() {
        _ if status.is_success() => Ok(()),
        502 | 503 => Err(WeatherError::Unreachable),
        400 => Err(WeatherError::BadRequest),
        401 | 403 => Err(WeatherError::Authentication),
        422 => Err(WeatherError::InvalidConfiguration),
        429 => Err(WeatherError::RateLimited),
        code => Err(WeatherError::Status(code)),
    }
}

#[derive(Debug, Clone)]
pub struct OpenMeteoClient {
    http: reqwest::Client,
    base_url: String,
    model: Option<String>,
    forecast_days: u32,
}

impl OpenMeteoClient {
    pub fn new(config: &WeatherConfig) -> Result<Self, WeatherError> {
        if let Some(model) = config.model.as_deref().filter(|m| m.contains(',')) {
            return Err(WeatherError::MultipleModels(model.to_string()));
        }
        Ok(Self {
            http: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone().filter(|m| !m.is_empty()),
            forecast_days: config.forecast_days,
        })
    }

    pub fn forecast_url(&self, location: Location) -> String {
        let mut url = format!(
            "{}/v1/forecast?latitude={}&longitude={}&minutely_15={}&hourly={}&timezone=auto&forecast_days={}",
            self.base_url,
            location.latitude,
            location.longitude,
            MINUTELY_VARIABLES,
            HOURLY_VARIABLES,
            self.forecast_days,
        );
        if let Some(model) = &self.model {
            url.push_str("&models=");
            url.push_str(model);
        }
        url
    }

    pub async fn fetch(&self, location: Location) -> Result<Vec<WeatherSample>, WeatherError> {
        let url = self.forecast_url(location);
        debug!(%url, "Requesting weather forecast");

        let response = self.http.get(&url).send().await?;
        check_status(response.status())?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if !content_type.contains("application/json") {
            return Err(WeatherError::ContentType(content_type));
        }

        let samples = response.json::<ForecastResponse>().await?.into_samples()?;
        info!(n_samples = samples.len(), "Weather forecast received");
        Ok(samples)
    }
}

/// Where a refresh gets its weather horizon from.
#[derive(Debug, Clone)]
pub enum WeatherSource {
    OpenMeteo(OpenMeteoClient),
    /// Synthetic clear-sky weather, no network.
    Offline { days: u32 },
}

impl WeatherSource {
    pub fn from_config(config: &WeatherConfig, offline: bool) -> Result<Self, WeatherError> {
        if offline {
            Ok(Self::Offline { days: config.forecast_days })
        } else {
            OpenMeteoClient::new(config).map(Self::OpenMeteo)
        }
    }

    pub fn is_offline(&self) -> bool {
        matches!(self, Self::Offline { .. })
    }

    pub async fn fetch(
        &self,
        location: Location,
        now: DateTime<FixedOffset>,
    ) -> Result<Vec<WeatherSample>, WeatherError> {
        match self {
            Self::OpenMeteo(client) => client.fetch(location).await,
            Self::Offline { days } => {
                Ok(clear_sky::generate(location, now, *days, TimeDelta::minutes(15)))
            }
        }
    }
}
