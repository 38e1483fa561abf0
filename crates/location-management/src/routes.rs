//! API route definitions

use crate::config::ApiConfig;
use crate::handlers;
use crate::state::AppState;

use axum::{
    Router,
    http::HeaderValue,
    middleware,
    routing::{get, post},
};
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

/// CORS policy from configuration
fn cors_layer(config: &ApiConfig) -> CorsLayer {
    if config.cors_permissive {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
            .max_age(Duration::from_secs(3600));
    }

    let origins: Vec<HeaderValue> = match config.cors_origin.as_deref() {
        Some(origin) => match HeaderValue::from_str(origin) {
            Ok(value) => vec![value],
            Err(e) => {
                warn!("Ignoring invalid CORS origin {:?}: {}", origin, e);
                Vec::new()
            }
        },
        None => Vec::new(),
    };

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);

    Router::new()
        // Health & Status
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        // Metrics (Prometheus format)
        .route("/metrics", get(handlers::metrics))
        // Location API
        .route("/api/v1/location/update", post(handlers::update_location))
        .route("/api/v1/location/search", get(handlers::search_users))
        .route("/api/v1/location/distance", get(handlers::get_distance))
        .route("/api/v1/location/{username}", get(handlers::get_user))
        // Apply middleware
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            handlers::track_metrics,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .with_state(state)
}

// ============================================================================
// TESTS
// ============================================================================
