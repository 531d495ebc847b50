//! HTTP API handlers for the disaster feed.
//!
//! - **GET /disasters**: current merged list with loading and error flags
//! - **POST /disasters/refresh**: manual refresh
//! - **GET /disasters/summary**: counts by type and severity
//! - **GET /disasters/nearby**: proximity feed around a point
//! - **GET /location**, **POST /location**, **POST /location/refresh**:
//!   the location reference used by the proximity feed
//!
//! Feed errors and location errors are reported separately and never
//! turn into a 5xx: stale or partial data is always served.

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use tracing::{info, instrument, warn};

use crate::feed::DisasterFeed;
use crate::geolocation::{AccuracyStatus, LocationFix, LocationState, LocationTracker};
use crate::model::{
    Coordinates, FeedResponse, FeedSummary, LocationReport, LocationResponse, NearbyQuery,
    NearbyResponse,
};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub feed: DisasterFeed,
    pub tracker: LocationTracker,
}

/// Build the API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/disasters", get(get_disasters))
        .route("/disasters/refresh", post(refresh_disasters))
        .route("/disasters/summary", get(get_summary))
        .route("/disasters/nearby", get(get_nearby))
        .route("/location", get(get_location).post(post_location))
        .route("/location/refresh", post(refresh_location))
        .with_state(state)
}

/// GET /health - Simple health check endpoint.
pub async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}

/// GET /disasters - Current merged disaster list.
///
/// # Response
///
/// ```json
/// {
///     "disasters": [ { "id": "usgs:us7000abcd", "type": "earthquake", "severity": "high", ... } ],
///     "loading": false,
///     "error": null,
///     "last_updated": "2024-06-01T18:30:00Z"
/// }
/// ```
#[instrument(skip(state))]
pub async fn get_disasters(State(state): State<AppState>) -> Json<FeedResponse> {
    let snapshot = state.feed.snapshot().await;
    info!(
        event_count = snapshot.events.len(),
        has_error = snapshot.error.is_some(),
        "Disasters queried"
    );
    Json(snapshot.into())
}

/// POST /disasters/refresh - Re-fetch every feed now and return the result.
#[instrument(skip(state))]
pub async fn refresh_disasters(State(state): State<AppState>) -> Json<FeedResponse> {
    let snapshot = state.feed.refresh().await;
    info!(
        event_count = snapshot.events.len(),
        has_error = snapshot.error.is_some(),
        "Disasters refreshed on request"
    );
    Json(snapshot.into())
}

/// GET /disasters/summary - Counts of the current list by type and severity.
#[instrument(skip(state))]
pub async fn get_summary(State(state): State<AppState>) -> Json<FeedSummary> {
    let snapshot = state.feed.snapshot().await;
    Json(FeedSummary::from_events(&snapshot.events))
}

/// GET /disasters/nearby - Disasters within a radius, nearest first.
///
/// # Query Parameters
///
/// - `lat`, `lng` (optional): Reference point. Both or neither; when
///   omitted the latest tracked location is used.
/// - `radius_km` (optional): Search radius (default: 500)
///
/// # Errors
///
/// - `400` for invalid coordinates or radius
/// - `409` when no reference point is available
#[instrument(skip(state))]
pub async fn get_nearby(
    State(state): State<AppState>,
    Query(query): Query<NearbyQuery>,
) -> Result<Json<NearbyResponse>, StatusCode> {
    if !query.radius_km.is_finite() || query.radius_km < 0.0 {
        warn!(radius_km = query.radius_km, "Invalid radius");
        return Err(StatusCode::BAD_REQUEST);
    }

    let origin = match (query.lat, query.lng) {
        (Some(lat), Some(lng)) => Coordinates::new(lat, lng).ok_or_else(|| {
            warn!(lat, lng, "Invalid reference point");
            StatusCode::BAD_REQUEST
        })?,
        (None, None) => match state.tracker.latest_fix().await {
            Some(fix) => fix.coordinates,
            None => {
                warn!("Nearby queried without a location fix");
                return Err(StatusCode::CONFLICT);
            }
        },
        _ => {
            warn!("Nearby queried with only one of lat/lng");
            return Err(StatusCode::BAD_REQUEST);
        }
    };

    let disasters = state.feed.nearby(origin, query.radius_km).await;
    info!(
        radius_km = query.radius_km,
        nearby_count = disasters.len(),
        "Nearby disasters queried"
    );

    Ok(Json(NearbyResponse {
        origin,
        radius_km: query.radius_km,
        disasters,
    }))
}

/// GET /location - Latest location fix and any location error.
#[instrument(skip(state))]
pub async fn get_location(State(state): State<AppState>) -> Json<LocationResponse> {
    Json(location_response(state.tracker.state().await))
}

/// POST /location - Report the client's current position.
///
/// # Request Body
///
/// ```json
/// { "lat": 44.9778, "lng": -93.2650, "accuracy": 12.0 }
/// ```
#[instrument(skip(state, report))]
pub async fn post_location(
    State(state): State<AppState>,
    Json(report): Json<LocationReport>,
) -> Result<Json<LocationResponse>, StatusCode> {
    let coordinates = Coordinates::new(report.lat, report.lng).ok_or_else(|| {
        warn!("Rejected out-of-range location report");
        StatusCode::BAD_REQUEST
    })?;

    state
        .tracker
        .report(LocationFix::new(coordinates, report.accuracy))
        .await;

    Ok(Json(location_response(state.tracker.state().await)))
}

/// POST /location/refresh - Ask the location provider for a fresh fix.
///
/// A failure is reported in the `error` field, not as an HTTP error.
#[instrument(skip(state))]
pub async fn refresh_location(State(state): State<AppState>) -> Json<LocationResponse> {
    if let Err(e) = state.tracker.refresh().await {
        info!(error = %e, "Location refresh on request failed");
    }
    Json(location_response(state.tracker.state().await))
}

fn location_response(state: LocationState) -> LocationResponse {
    LocationResponse {
        location: state.fix.map(|f| f.coordinates),
        accuracy_m: state.fix.and_then(|f| f.accuracy_m),
        accuracy_status: AccuracyStatus::from_accuracy(state.fix.and_then(|f| f.accuracy_m)),
        address: state.fix.map(|f| f.address()),
        acquired_at: state.fix.map(|f| f.acquired_at),
        loading: state.loading,
        error: state.error.map(|e| e.to_string()),
    }
}
