//! Route configuration for the dashboard API.

use std::sync::Arc;

use axum::routing::{Router, get};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers::{get_metrics, health_check, root};
use crate::state::DashboardState;

/// Create the dashboard API router.
pub fn create_router(state: Arc<DashboardState>) -> Router {
    let cors = build_cors_layer(state.config());

    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(get_metrics));

    Router::new()
        .route("/", get(root))
        .nest("/api", api_routes)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Build the CORS layer based on configuration.
fn build_cors_layer(config: &crate::config::DashboardConfig) -> CorsLayer {
    if config.cors_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
