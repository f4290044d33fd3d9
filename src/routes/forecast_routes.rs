use axum::{Router, routing::get};

use crate::controllers::forecast_controller::{
    // Forecast views
    get_hour_energy, get_power, get_series, get_summary,
    // Configuration & status
    health, list_arrays,
};
use crate::shared_state::SharedState;

/// Build the `/api/*` sub-router.
/// Handlers extract `State<AppState>` or the site list via
/// `FromRef<SharedState>`; a single `.with_state(shared)` covers both.
pub fn api_routes(shared: SharedState) -> Router {
    Router::new()
        .route("/forecast/power",        get(get_power))
        .route("/forecast/energy/hour",  get(get_hour_energy))
        .route("/forecast/summary",      get(get_summary))
        .route("/forecast/series",       get(get_series))
        .route("/arrays",                get(list_arrays))
        .route("/health",                get(health))
        .with_state(shared)
}
