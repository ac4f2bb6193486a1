//! Read-only JSON query surface over the persisted state, for dashboards,
//! reports and other external collaborators.

pub mod devices;
pub mod health;
pub mod stats;

use axum::{Router, routing::get};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::common::AppState;

pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/stats", get(stats::aggregate_counts))
        .route("/stats/fleet", get(stats::fleet_stats))
        .route("/reports/daily", get(stats::daily_report))
        .route("/devices/latest", get(devices::latest_readings))
        .route("/devices/health", get(devices::list_health))
        .route("/devices/{device_id}/health", get(devices::get_health))
        .route("/devices/{device_id}/readings", get(devices::device_readings));

    // Health check routes
    let health_routes = Router::new().route("/healthz", get(health::healthz));

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
