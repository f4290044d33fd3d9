mod routes;
mod controllers;
mod services;
mod models;
mod api_docs;
mod shared_state;
mod config;
mod cli;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{Router, response::Html, routing::get};
use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_scalar::Scalar;

use crate::api_docs::ApiDoc;
use crate::cli::Args;
use crate::config::Config;
use crate::models::site::Location;
use crate::routes::forecast_routes::api_routes;
use crate::services::refresh::{self, RefreshPlan};
use crate::services::weather_service::WeatherSource;
use crate::shared_state::{AppState, ForecastStore, SharedState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .compact()
        .init();
    info!(version = env!("CARGO_PKG_VERSION"), "starting…");

    let args = Args::parse();

    // 1. Load and validate configuration
    let config = Config::load(&args.config)?;
    let sites = Arc::new(config.site_models().context("invalid configuration")?);
    let offline = args.offline || config.offline_mode;
    info!(n_arrays = sites.len(), offline, "Configuration loaded");

    // 2. Shared state
    let store = ForecastStore::new();
    let shared = SharedState {
        app: AppState { store: store.clone(), offline },
        sites: Arc::clone(&sites),
    };

    // 3. Forecast refresh loop
    let source = WeatherSource::from_config(&config.weather, offline)
        .context("invalid weather configuration")?;
    let plan = RefreshPlan {
        sites,
        location: Location { latitude: config.site.latitude, longitude: config.site.longitude },
        inverter_power_kw: config.site.inverter_power_kw,
        source,
        interval: Duration::from_secs(config.weather.refresh_interval_minutes * 60),
    };
    tokio::spawn(refresh::run(store, plan));

    // 4. HTTP server
    let app = Router::new()
        .nest("/api", api_routes(shared))
        .route("/scalar", get(|| async { Html(Scalar::new(ApiDoc::openapi()).to_html()) }))
        .layer(TraceLayer::new_for_http());

    let port = args.port.unwrap_or(config.server.port);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "API server listening");
    info!("Scalar UI: http://{}/scalar", addr);

    axum_server::bind(addr)
        .serve(app.into_make_service())
        .await
        .context("HTTP server failed")?;
    Ok(())
}
