///! HTTP surface of the backend: flights, airports and flight details as JSON
use std::path::PathBuf;
use std::sync::Arc;

use avinor_common::{AirportRecord, FlightDetail, FlightSnapshot};
use axum::{
    Json, Router,
    body::Body,
    extract::{Path, Query, State, rejection::QueryRejection},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::{BackendConfig, FeedConfig};
use crate::module::airports::AirportDirectory;
use crate::module::detail::{DetailClient, FlightIdentifiers};
use crate::module::flights::PollConfiguration;
use crate::registry::{ApplySummary, FeedRegistry, FeedSummary};

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<FeedRegistry>,
    pub airports: Arc<AirportDirectory>,
    pub detail: DetailClient,
    pub detail_api_key: Option<String>,
    /// Re-read on `POST /reload`
    pub config_path: PathBuf,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/feeds", get(list_feeds))
        .route("/feeds/{id}/flights", get(feed_flights))
        .route("/flights", get(flights))
        .route("/airports", get(airports))
        .route("/flight-detail", get(flight_detail))
        .route("/reload", post(reload))
        .with_state(state)
        // Path only: the query string may carry an api_key
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
            tracing::debug_span!(
                "request",
                method = %request.method(),
                path = %request.uri().path(),
            )
        }))
}

/// Ids of feeds whose airport is missing from the directory, each logged as a warning
pub async fn unknown_feed_airports(directory: &AirportDirectory, feeds: &[FeedConfig]) -> Vec<String> {
    let mut unknown = Vec::new();
    for feed in feeds {
        if !directory.contains(&feed.poll.airport).await {
            warn!("Feed '{}' polls unknown airport {}", feed.id(), feed.poll.airport);
            unknown.push(feed.id());
        }
    }
    unknown
}

/// Error body: `{"error": "<kind>", "message": "..."}`
pub enum ApiError {
    Core(crate::Error),
    NotFound(String),
    Internal(anyhow::Error),
}

impl From<crate::Error> for ApiError {
    fn from(e: crate::Error) -> Self {
        ApiError::Core(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        use crate::Error;

        let (status, kind, message) = match self {
            ApiError::Core(e) => {
                let (status, kind) = match &e {
                    Error::Validation { .. } => (StatusCode::BAD_REQUEST, "validation"),
                    Error::Remote { .. } => (StatusCode::BAD_GATEWAY, "remote"),
                    Error::Timeout { .. } => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
                    Error::HttpStatus { .. } => (StatusCode::BAD_GATEWAY, "http_status"),
                    Error::Connection { .. } => (StatusCode::BAD_GATEWAY, "connection"),
                    Error::Parse { .. } => (StatusCode::BAD_GATEWAY, "parse"),
                };
                (status, kind, e.to_string())
            }
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, "not_found", message),
            ApiError::Internal(e) => (StatusCode::INTERNAL_SERVER_ERROR, "internal", format!("{:#}", e)),
        };

        let body = serde_json::json!({
            "error": kind,
            "message": message,
        });
        (status, Json(body)).into_response()
    }
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn list_feeds(State(state): State<AppState>) -> Json<Vec<FeedSummary>> {
    Json(state.registry.list().await)
}

#[derive(Debug, Deserialize)]
struct FlightTypeQuery {
    flight_type: Option<String>,
}

async fn feed_flights(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<FlightTypeQuery>,
) -> Result<Json<FlightSnapshot>, ApiError> {
    let coordinator = state
        .registry
        .coordinator(&id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("Unknown feed '{}'", id)))?;

    let snapshot = match query.flight_type.as_deref() {
        Some(flight_type) => coordinator.view(Some(flight_type)).await,
        None => (*coordinator.snapshot()).clone(),
    };
    Ok(Json(snapshot))
}

async fn flights(
    State(state): State<AppState>,
    query: Result<Query<PollConfiguration>, QueryRejection>,
) -> Result<Json<FlightSnapshot>, ApiError> {
    let Query(config) = query.map_err(|rejection| crate::Error::validation(rejection.body_text()))?;
    let config = config.validate()?;
    if !state.airports.contains(&config.airport).await {
        return Err(crate::Error::validation(format!("Unknown airport '{}'", config.airport)).into());
    }
    Ok(Json(state.registry.get_flights(&config).await))
}

async fn airports(State(state): State<AppState>) -> Json<Vec<AirportRecord>> {
    Json(state.airports.get_airports().await)
}

#[derive(Debug, Deserialize)]
struct DetailQuery {
    api_key: Option<String>,
    flight_iata: Option<String>,
    flight_icao: Option<String>,
    flight_number: Option<String>,
}

async fn flight_detail(
    State(state): State<AppState>,
    Query(query): Query<DetailQuery>,
) -> Result<Json<FlightDetail>, ApiError> {
    let api_key = query
        .api_key
        .filter(|key| !key.trim().is_empty())
        .or_else(|| state.detail_api_key.clone())
        .unwrap_or_default();
    let identifiers = FlightIdentifiers {
        flight_iata: query.flight_iata,
        flight_icao: query.flight_icao,
        flight_number: query.flight_number,
    };

    let detail = state.detail.fetch_flight_detail(&api_key, &identifiers).await?;
    Ok(Json(detail))
}

#[derive(Debug, Serialize)]
struct ReloadSummary {
    #[serde(flatten)]
    applied: ApplySummary,
    /// Feeds started anyway, their airport is not in the directory
    unknown_airports: Vec<String>,
}

/// Settings-change hook: re-read the feed list and reconstruct what changed.
///
/// Base URLs, credentials and the poll interval only change on restart.
async fn reload(State(state): State<AppState>) -> Result<Json<ReloadSummary>, ApiError> {
    let config = BackendConfig::from_file(&state.config_path).map_err(|e| {
        error!("Reload failed: {:#}", e);
        ApiError::Internal(e)
    })?;

    let unknown_airports = unknown_feed_airports(&state.airports, &config.feeds).await;
    let applied = state.registry.apply(config.feeds).await;
    info!(
        "Reload applied: {} started, {} kept, {} stopped",
        applied.started.len(),
        applied.kept.len(),
        applied.stopped.len()
    );
    Ok(Json(ReloadSummary {
        applied,
        unknown_airports,
    }))
}
