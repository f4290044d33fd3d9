use utoipa::OpenApi;

use crate::controllers::forecast_controller;
use crate::models::{forecast, site};
use crate::services::cloud_correction;

#[derive(OpenApi)]
#[openapi(
    paths(
        forecast_controller::get_power,
        forecast_controller::get_hour_energy,
        forecast_controller::get_summary,
        forecast_controller::get_series,
        forecast_controller::list_arrays,
        forecast_controller::health
    ),
    components(
        schemas(
            forecast::PowerPoint,
            forecast::EnergyBucket,
            forecast::DayTotal,
            forecast::AdjustmentStats,
            forecast::ForecastSnapshot,
            forecast::ForecastSummary,
            forecast::PowerResponse,
            forecast::HealthResponse,
            site::SiteModel,
            site::Location,
            cloud_correction::CloudDiscount
        )
    ),
    tags(
        (name = "sunforecast", description = "PV power and energy forecast API")
    )
)]
pub struct ApiDoc;
