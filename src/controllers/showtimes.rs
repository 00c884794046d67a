use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};
use validator::Validate;

use crate::controllers::{api_error, booking_error, parse_seats, ApiError};
use crate::models::{Seat, Showtime};
use crate::services::{generate_seat_map, pricing};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/showtimes/{id}", get(get_showtime))
        .route("/showtimes/{id}/seats", get(get_seat_map))
        .route("/pricing/quote", post(quote_seats))
}

async fn load_showtime(state: &AppState, showtime_id: &str) -> Result<Showtime, ApiError> {
    state
        .showtimes
        .get(showtime_id)
        .await
        .map_err(booking_error)?
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("showtime {} not found", showtime_id)))
}

// GET /api/showtimes/{id}
async fn get_showtime(
    State(state): State<Arc<AppState>>,
    Path(showtime_id): Path<String>,
) -> Result<Json<Showtime>, ApiError> {
    Ok(Json(load_showtime(&state, &showtime_id).await?))
}

// GET /api/showtimes/{id}/seats
#[derive(Debug, Serialize)]
struct SeatMapResponse {
    showtime_id: String,
    available_seats_count: i64,
    seats: Vec<Seat>,
}

fn seat_map_response(showtime: Showtime, seats: Vec<Seat>, cache_status: &'static str) -> Response {
    let body = SeatMapResponse {
        showtime_id: showtime.id,
        available_seats_count: showtime.available_seats_count,
        seats,
    };
    ([("X-Cache", cache_status)], Json(body)).into_response()
}

async fn get_seat_map(
    State(state): State<Arc<AppState>>,
    Path(showtime_id): Path<String>,
) -> Result<Response, ApiError> {
    let showtime = load_showtime(&state, &showtime_id).await?;

    // Try cache first
    if let Some(cache) = &state.cache {
        match cache.get_seat_map(&showtime_id).await {
            Ok(Some(seats)) => {
                debug!("Seat map cache hit for showtime {}", showtime_id);
                return Ok(seat_map_response(showtime, seats, "HIT"));
            }
            Ok(None) => {}
            Err(e) => warn!("Seat map cache read failed for showtime {}: {}", showtime_id, e),
        }
    }

    // Build from storage
    let booked = state
        .bookings
        .index()
        .booked_seats(&showtime_id)
        .await
        .map_err(|e| booking_error(e.into()))?;
    let seats = generate_seat_map(&showtime_id, &booked);

    // Write failures are logged, not returned
    if let Some(cache) = &state.cache {
        if let Err(e) = cache.save_seat_map(&showtime_id, &seats).await {
            warn!("Seat map cache write failed for showtime {}: {}", showtime_id, e);
        }
    }

    Ok(seat_map_response(showtime, seats, "MISS"))
}

// POST /api/pricing/quote
#[derive(Debug, Deserialize, Validate)]
struct QuoteRequest {
    #[validate(length(min = 1))]
    showtime_id: String,
    #[validate(length(min = 1, message = "select at least one seat"))]
    seats: Vec<String>,
}

#[derive(Debug, Serialize)]
struct QuoteResponse {
    showtime_id: String,
    base_price: i64,
    #[serde(flatten)]
    quote: pricing::Quote,
}

async fn quote_seats(
    State(state): State<Arc<AppState>>,
    Json(req): Json<QuoteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate().map_err(|e| booking_error(e.into()))?;
    let showtime = load_showtime(&state, &req.showtime_id).await?;
    let seats = parse_seats(&showtime.id, &req.seats)?;
    let quote = pricing::quote(showtime.base_price, &seats).map_err(booking_error)?;

    Ok((
        StatusCode::OK,
        Json(QuoteResponse { showtime_id: showtime.id, base_price: showtime.base_price, quote }),
    ))
}
