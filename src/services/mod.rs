pub mod clear_sky;
pub mod cloud_correction;
pub mod forecast_builder;
pub mod power_estimator;
pub mod refresh;
pub mod series_resolver;
pub mod solar_geometry;
pub mod weather_service;
