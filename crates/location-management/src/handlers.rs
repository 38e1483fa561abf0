//! API request handlers

use crate::error::ApiError;
use crate::service::SearchQuery;
use crate::state::AppState;

use axum::{
    Json,
    extract::{
        MatchedPath, Path, Query, Request, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use geotrack_core::{CurrentPosition, GeoPoint};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

// ============================================================================
// REQUEST / RESPONSE TYPES
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct UpdateLocationRequest {
    pub username: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub latitude: f64,
    pub longitude: f64,
    /// Kilometers
    pub radius: f64,
    pub page: u32,
    pub size: u32,
}

#[derive(Debug, Deserialize)]
pub struct DistanceParams {
    pub username: String,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
}

#[derive(Serialize)]
pub struct DistanceResponse {
    pub distance: f64,
}

// ============================================================================
// HEALTH & STATUS HANDLERS
// ============================================================================

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// Readiness check (for Kubernetes)
pub async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.service.health_check().await {
        Ok(()) => (StatusCode::OK, Json(serde_json::json!({"ready": true}))),
        Err(e) => {
            debug!("Readiness check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({"ready": false})),
            )
        }
    }
}

/// Prometheus metrics endpoint
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.export(),
    )
}

// ============================================================================
// LOCATION HANDLERS
// ============================================================================

/// Record a position in history and as the user's current one
pub async fn update_location(
    State(state): State<AppState>,
    body: Result<Json<UpdateLocationRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;

    state
        .service
        .update_location(&req.username, GeoPoint::new(req.latitude, req.longitude))
        .await?;

    Ok(Json(StatusResponse {
        status: "location updated",
    }))
}

/// Users within a radius, one page at a time
pub async fn search_users(
    State(state): State<AppState>,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(params) = params.map_err(|e| ApiError::bad_request(e.body_text()))?;

    let page = state
        .service
        .search_users(&SearchQuery {
            center: GeoPoint::new(params.latitude, params.longitude),
            radius_km: params.radius,
            page: params.page,
            page_size: params.size,
        })
        .await?;

    Ok(Json(page))
}

/// Distance travelled between `start_time` and `end_time` (default now)
pub async fn get_distance(
    State(state): State<AppState>,
    params: Result<Query<DistanceParams>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(params) = params.map_err(|e| ApiError::bad_request(e.body_text()))?;

    let distance = state
        .service
        .get_distance(&params.username, params.start_time, params.end_time)
        .await?;

    Ok(Json(DistanceResponse { distance }))
}

/// Current position of one user
pub async fn get_user(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<CurrentPosition>, ApiError> {
    let user = state.service.get_user(&username).await?;
    Ok(Json(user))
}

// ============================================================================
// MIDDLEWARE
// ============================================================================

/// Count and time every routed request
pub async fn track_metrics(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let started = Instant::now();
    let method = req.method().to_string();
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());

    let response = next.run(req).await;

    state.metrics.record_api_request(
        &method,
        &path,
        response.status().as_u16(),
        started.elapsed().as_secs_f64(),
    );
    response
}
