//! REST API endpoints for tracklog-service.
//!
//! The API is the host-control surface of the tracker: it starts and stops
//! background tracking, relays permission outcomes and location fixes from
//! the host, and serves the recorded samples as JSON, a text log or a GeoJSON
//! route.
//!
//! ## Error Handling
//!
//! All endpoints return structured JSON errors via [`AppError`]. Storage
//! errors return HTTP 500. Client errors (bad request, conflict) return the
//! matching 4xx status code.
//!
//! # Example
//!
//! ```ignore
//! use axum::Router;
//! use tracklog_service::api;
//!
//! let app = api::router().with_state(state);
//! ```

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{StatusCode, header},
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use tracing::info;

use tracklog_core::{Location, LocationResult, RunnerStatus, SampleQuery, SamplerState, StartMode};
use tracklog_store::StoredSample;

use crate::render::{RouteOverlay, text_log};
use crate::state::AppState;

/// Create the API router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        // Health and status
        .route("/api/health", get(health))
        .route("/api/status", get(get_status))
        // Tracking control
        .route("/api/tracking/start", post(tracking_start))
        .route("/api/tracking/stop", post(tracking_stop))
        // Host inputs
        .route("/api/permission", post(set_permission))
        .route("/api/location", post(post_location))
        // Data endpoints
        .route("/api/samples", get(get_samples))
        .route("/api/log", get(get_log))
        .route("/api/route", get(get_route))
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

/// Health check endpoint.
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: OffsetDateTime::now_utc(),
    })
}

/// Service status response.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub version: &'static str,
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    /// Location source name.
    pub provider: String,
    /// Whether location permission is granted.
    pub permission_granted: bool,
    /// Background runner state.
    pub runner: RunnerStatus,
    /// Total stored samples.
    pub sample_count: u64,
    /// Most recent sample by timestamp.
    pub latest: Option<StoredSample>,
    /// Samples shown by the log, route and live feed.
    pub recent_limit: u32,
}

/// Get service status.
async fn get_status(State(state): State<Arc<AppState>>) -> Result<Json<StatusResponse>, AppError> {
    let runner = state.runner.status().await;
    let sample_count = state.store.count().await?;
    let latest = state.store.latest().await?;

    Ok(Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION"),
        started_at: state.started_at,
        provider: state.provider.name().to_string(),
        permission_granted: state.provider.has_permission(),
        runner,
        sample_count,
        latest,
        recent_limit: state.query.limit(),
    }))
}

/// Acknowledgement for tracking control actions.
#[derive(Debug, Serialize)]
pub struct TrackingActionResponse {
    pub success: bool,
    pub message: String,
    /// Whether the runner is active after the action.
    pub active: bool,
    /// Restart policy requested by the runner, when starting.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_mode: Option<StartMode>,
}

/// Start background tracking.
async fn tracking_start(State(state): State<Arc<AppState>>) -> Json<TrackingActionResponse> {
    if state.runner.is_active().await {
        return Json(TrackingActionResponse {
            success: false,
            message: "Tracking is already running".to_string(),
            active: true,
            start_mode: None,
        });
    }

    let mode = state.runner.activate().await;
    let message = match state.runner.status().await.sampler {
        SamplerState::Running => "Tracking started",
        SamplerState::Stopped => "Tracking started, waiting for location permission",
    };
    info!("{}", message);

    Json(TrackingActionResponse {
        success: true,
        message: message.to_string(),
        active: true,
        start_mode: Some(mode),
    })
}

/// Stop background tracking.
async fn tracking_stop(State(state): State<Arc<AppState>>) -> Json<TrackingActionResponse> {
    if !state.runner.is_active().await {
        return Json(TrackingActionResponse {
            success: false,
            message: "Tracking is not running".to_string(),
            active: false,
            start_mode: None,
        });
    }

    state.runner.deactivate().await;

    Json(TrackingActionResponse {
        success: true,
        message: "Tracking stopped".to_string(),
        active: false,
        start_mode: None,
    })
}

/// Permission outcome reported by the host.
#[derive(Debug, Deserialize)]
pub struct PermissionRequest {
    pub granted: bool,
}

/// Permission acknowledgement.
#[derive(Debug, Serialize)]
pub struct PermissionResponse {
    pub granted: bool,
    pub message: &'static str,
}

/// Record a permission grant or denial.
async fn set_permission(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PermissionRequest>,
) -> Json<PermissionResponse> {
    state.provider.set_permission(request.granted);

    Json(PermissionResponse {
        granted: request.granted,
        message: if request.granted {
            "Permissions granted"
        } else {
            "Permissions required"
        },
    })
}

/// A location delivery posted by the host.
#[derive(Debug, Deserialize)]
pub struct LocationRequestBody {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    #[serde(default)]
    pub speed: f32,
    /// `false` for deliveries without a fix.
    #[serde(default = "default_true")]
    pub has_last_location: bool,
}

fn default_true() -> bool {
    true
}

impl LocationRequestBody {
    fn to_result(&self) -> Result<LocationResult, AppError> {
        if !self.has_last_location {
            return Ok(LocationResult::empty());
        }
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Ok(LocationResult::with_location(
                Location::new(latitude, longitude, self.speed),
            )),
            _ => Err(AppError::BadRequest(
                "latitude and longitude are required when has_last_location is true".to_string(),
            )),
        }
    }
}

/// Result of forwarding a location delivery.
#[derive(Debug, Serialize)]
pub struct LocationAccepted {
    /// Number of live subscriptions that received the delivery.
    pub delivered: usize,
}

/// Forward a location delivery to the host-fed provider.
///
/// # Errors
///
/// - Returns [`AppError::BadRequest`] if coordinates are missing
/// - Returns [`AppError::Conflict`] if the service runs with the simulator
async fn post_location(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LocationRequestBody>,
) -> Result<Json<LocationAccepted>, AppError> {
    let result = body.to_result()?;
    let provider = state.provider.push().ok_or_else(|| {
        AppError::Conflict("Service is running with a simulated location provider".to_string())
    })?;

    Ok(Json(LocationAccepted {
        delivered: provider.push(result),
    }))
}

/// Query parameters for samples.
#[derive(Debug, Deserialize, Default)]
pub struct SamplesQuery {
    /// Epoch milliseconds, inclusive.
    pub since: Option<i64>,
    /// Epoch milliseconds, inclusive.
    pub until: Option<i64>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl SamplesQuery {
    /// Validate the query parameters.
    /// Returns an error if `since > until`.
    pub fn validate(&self) -> Result<(), AppError> {
        if let (Some(since), Some(until)) = (self.since, self.until)
            && since > until
        {
            return Err(AppError::BadRequest(format!(
                "Invalid time range: 'since' ({}) must be less than or equal to 'until' ({})",
                since, until
            )));
        }
        Ok(())
    }
}

/// Paginated response wrapper with metadata.
#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T> {
    /// The data items.
    pub data: Vec<T>,
    /// Pagination metadata.
    pub pagination: PaginationMeta,
}

/// Pagination metadata.
#[derive(Debug, Serialize)]
pub struct PaginationMeta {
    /// Number of items returned.
    pub count: usize,
    /// Offset from the beginning.
    pub offset: u32,
    /// Maximum items requested (if specified).
    pub limit: Option<u32>,
    /// Whether there are more items available.
    pub has_more: bool,
}

/// Query stored samples, newest first.
///
/// # Errors
///
/// - Returns [`AppError::BadRequest`] if `since > until`
/// - Returns [`AppError::Storage`] if the database query fails
async fn get_samples(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SamplesQuery>,
) -> Result<Json<PaginatedResponse<StoredSample>>, AppError> {
    params.validate()?;

    let mut query = SampleQuery::new();
    if let Some(since) = params.since {
        query = query.since(since);
    }
    if let Some(until) = params.until {
        query = query.until(until);
    }

    // Request one extra item to determine if there are more
    if let Some(limit) = params.limit {
        query = query.limit(limit.saturating_add(1));
    }
    if let Some(offset) = params.offset {
        query = query.offset(offset);
    }

    let mut samples = state.store.query(&query).await?;

    let has_more = params.limit.is_some_and(|l| samples.len() > l as usize);
    if has_more {
        samples.pop();
    }

    Ok(Json(PaginatedResponse {
        pagination: PaginationMeta {
            count: samples.len(),
            offset: params.offset.unwrap_or(0),
            limit: params.limit,
            has_more,
        },
        data: samples,
    }))
}

/// Recent samples as a plain-text log, newest first.
async fn get_log(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, AppError> {
    let snapshot = state.query.snapshot().await?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        text_log(&snapshot),
    ))
}

/// Recent samples as a GeoJSON route overlay.
async fn get_route(State(state): State<Arc<AppState>>) -> Result<Json<Value>, AppError> {
    let snapshot = state.query.snapshot().await?;
    Ok(Json(RouteOverlay::from_samples(&snapshot).to_geojson()))
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    Conflict(String),
    Storage(tracklog_core::Error),
}

impl From<tracklog_core::Error> for AppError {
    fn from(e: tracklog_core::Error) -> Self {
        AppError::Storage(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Storage(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        };

        let body = serde_json::json!({
            "error": message,
        });

        (status, Json(body)).into_response()
    }
}
