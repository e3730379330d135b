pub mod curtailments;
pub mod error;
pub mod forecasts;
pub mod health;
pub mod response;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::{ForecastConfig, ServerConfig};
use crate::store::SiteDataStore;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn SiteDataStore>,
    pub forecast: ForecastConfig,
}

impl AppState {
    pub fn new(store: Arc<dyn SiteDataStore>, forecast: ForecastConfig) -> Self {
        Self { store, forecast }
    }
}

pub fn router(state: AppState, cfg: &ServerConfig) -> Router {
    let v1 = Router::new()
        .route("/forecasts/latest", get(forecasts::latest_forecast_values))
        .route("/curtailments", post(curtailments::create_curtailment))
        .route(
            "/curtailments/:curtailment_uuid",
            get(curtailments::get_curtailment)
                .put(curtailments::update_curtailment)
                .delete(curtailments::delete_curtailment),
        )
        .route("/sites/:site_uuid/curtailments", get(curtailments::list_site_curtailments));

    Router::new()
        .route("/health", get(health::health_check))
        .nest("/api/v1", v1)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(axum::extract::DefaultBodyLimit::max(1024 * 1024))
                .layer(TimeoutLayer::new(Duration::from_secs(cfg.request_timeout_secs))),
        )
        .layer(TraceLayer::new_for_http())
}
